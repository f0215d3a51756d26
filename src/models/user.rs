//! Point holder model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Loyalty tier, ordered by ascending threshold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// Stored name, e.g. `"GOLD"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
        }
    }

    /// Parse a stored tier name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BRONZE" => Some(Tier::Bronze),
            "SILVER" => Some(Tier::Silver),
            "GOLD" => Some(Tier::Gold),
            "PLATINUM" => Some(Tier::Platinum),
            _ => None,
        }
    }
}

/// Read a stored tier name, treating unknown or missing names as `Bronze`
/// so that they earn at the base multiplier.
fn lenient_tier<'de, D>(deserializer: D) -> Result<Tier, D::Error>
where
    D: Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    Ok(name.as_deref().and_then(Tier::from_name).unwrap_or_default())
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account role, issued by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User profile and point balances stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    /// Spendable points
    #[serde(default)]
    pub points_balance: i64,
    /// Cumulative earned points; never decreases
    #[serde(default)]
    pub total_points_earned: i64,
    /// Cached tier, recomputed on every earning event
    #[serde(default, deserialize_with = "lenient_tier")]
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// New user with empty balances.
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role: Role::User,
            points_balance: 0,
            total_points_earned: 0,
            tier: Tier::Bronze,
            created_at: Utc::now(),
        }
    }
}
