//! Loyalty tiers and their point multipliers.

use serde::Serialize;

use crate::models::Tier;

/// One row of the tier table.
#[derive(Debug, Clone, Copy)]
pub struct TierInfo {
    pub tier: Tier,
    /// Cumulative earned points needed to reach this tier
    pub threshold: i64,
    pub multiplier: f64,
    pub label: &'static str,
}

/// Tier table, ordered by ascending threshold.
pub const TIERS: [TierInfo; 4] = [
    TierInfo {
        tier: Tier::Bronze,
        threshold: 0,
        multiplier: 1.0,
        label: "Bronze",
    },
    TierInfo {
        tier: Tier::Silver,
        threshold: 500,
        multiplier: 1.25,
        label: "Silver",
    },
    TierInfo {
        tier: Tier::Gold,
        threshold: 2000,
        multiplier: 1.5,
        label: "Gold",
    },
    TierInfo {
        tier: Tier::Platinum,
        threshold: 5000,
        multiplier: 2.0,
        label: "Platinum",
    },
];

fn info(tier: Tier) -> &'static TierInfo {
    // TIERS covers every variant
    TIERS
        .iter()
        .find(|t| t.tier == tier)
        .unwrap_or(&TIERS[0])
}

/// Highest tier whose threshold is at most `total_earned`.
pub fn tier_for(total_earned: i64) -> Tier {
    TIERS
        .iter()
        .rev()
        .find(|t| total_earned >= t.threshold)
        .map(|t| t.tier)
        .unwrap_or(Tier::Bronze)
}

pub fn multiplier_for(tier: Tier) -> f64 {
    info(tier).multiplier
}

/// Apply the tier multiplier to base points.
pub fn apply_multiplier(base_points: i64, multiplier: f64) -> i64 {
    (base_points as f64 * multiplier).round() as i64
}

/// Points for `quantity` units worth `points_value` each, earned at `tier`.
///
/// Rounded once, after the multiplier is applied.
pub fn tier_adjusted_points(points_value: i64, quantity: f64, tier: Tier) -> i64 {
    (points_value as f64 * quantity * multiplier_for(tier)).round() as i64
}

/// Progress towards the next tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierProgress {
    pub current_tier: Tier,
    pub current_tier_label: &'static str,
    pub multiplier: f64,
    pub next_tier: Option<Tier>,
    pub next_tier_label: Option<&'static str>,
    /// 0..=100
    pub progress_percent: u8,
    pub points_needed: i64,
    pub points_in_current_tier: i64,
}

/// Linear progress between the current and next tier thresholds.
pub fn progress(total_earned: i64) -> TierProgress {
    let total_earned = total_earned.max(0);
    let current = info(tier_for(total_earned));
    let points_in_current_tier = total_earned - current.threshold;

    let next = TIERS.iter().find(|t| t.threshold > current.threshold);
    match next {
        None => TierProgress {
            current_tier: current.tier,
            current_tier_label: current.label,
            multiplier: current.multiplier,
            next_tier: None,
            next_tier_label: None,
            progress_percent: 100,
            points_needed: 0,
            points_in_current_tier,
        },
        Some(next) => {
            let range = (next.threshold - current.threshold) as f64;
            let percent = ((points_in_current_tier as f64 / range) * 100.0).round();
            TierProgress {
                current_tier: current.tier,
                current_tier_label: current.label,
                multiplier: current.multiplier,
                next_tier: Some(next.tier),
                next_tier_label: Some(next.label),
                progress_percent: percent.clamp(0.0, 100.0) as u8,
                points_needed: next.threshold - total_earned,
                points_in_current_tier,
            }
        }
    }
}
