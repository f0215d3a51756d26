// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Text normalization for fuzzy product comparison.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Quantities, percentages and number+unit tokens ("2.8%", "1kg", "1/1")
    static ref NOISE_TOKEN: Regex =
        Regex::new(r"(?i)^\d+([.,/]\d+)?(%|g|kg|l|ml|kom|din|rsd)?$").unwrap();
}

/// Minimum length (in characters) of a keyword.
const MIN_KEYWORD_LEN: usize = 3;

/// Lowercase and fold Serbian Latin diacritics to ASCII.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'č' | 'ć' => out.push('c'),
            'š' => out.push('s'),
            'ž' => out.push('z'),
            'đ' => out.push_str("dj"),
            _ => out.push(c),
        }
    }
    out
}

/// Extract the substantive keywords of a product or item name.
///
/// An empty result means the name is unmatchable by keywords.
pub fn extract_keywords(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !NOISE_TOKEN.is_match(w))
        .map(str::to_string)
        .collect()
}
