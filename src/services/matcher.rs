// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt item to catalog product matching.
//!
//! Each item is tried against the catalog in two passes:
//! 1. Exact or substring lookup on the item name, its first word and its
//!    first two words (case-insensitive, identifier or name).
//! 2. Keyword overlap: a product qualifies when every one of its keywords
//!    appears among the item's keywords; the largest overlap wins.

use serde::Serialize;

use crate::models::{MatchedItem, Product, ReceiptItem, UnmatchedItem};
use crate::services::normalize::extract_keywords;

/// Outcome of matching a receipt's items.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedItem>,
    pub unmatched: Vec<UnmatchedItem>,
    /// Sum of `matched[].total_points`, before any tier multiplier
    pub total_points: i64,
}

/// Known catalog prepared for matching.
pub struct ProductMatcher<'a> {
    products: Vec<CatalogEntry<'a>>,
}

struct CatalogEntry<'a> {
    product: &'a Product,
    name_lower: String,
    identifier_lower: String,
    keywords: Vec<String>,
}

impl<'a> ProductMatcher<'a> {
    /// Build a matcher over `catalog`, ignoring products that are not `Known`.
    pub fn new(catalog: &'a [Product]) -> Self {
        let products = catalog
            .iter()
            .filter(|p| p.is_known())
            .map(|product| CatalogEntry {
                product,
                name_lower: product.name.to_lowercase(),
                identifier_lower: product.identifier.to_lowercase(),
                keywords: extract_keywords(&product.name),
            })
            .collect();
        Self { products }
    }

    /// Match every item, preserving item order within each list.
    pub fn match_items(&self, items: Vec<ReceiptItem>) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for item in items {
            match self.find_product(&item.name) {
                Some(product) => {
                    let matched = MatchedItem::from_item(item, product);
                    outcome.total_points += matched.total_points;
                    outcome.matched.push(matched);
                }
                None => outcome.unmatched.push(UnmatchedItem::from_item(item)),
            }
        }

        outcome
    }

    /// Find the catalog product for one item name.
    pub fn find_product(&self, item_name: &str) -> Option<&'a Product> {
        self.lookup(item_name)
            .or_else(|| self.best_keyword_match(item_name))
    }

    fn lookup(&self, item_name: &str) -> Option<&'a Product> {
        for term in search_terms(item_name) {
            let term = term.to_lowercase();
            if term.is_empty() {
                continue;
            }
            let hit = self.products.iter().find(|e| {
                field_matches(&e.identifier_lower, &term) || field_matches(&e.name_lower, &term)
            });
            if let Some(entry) = hit {
                return Some(entry.product);
            }
        }
        None
    }

    fn best_keyword_match(&self, item_name: &str) -> Option<&'a Product> {
        let item_keywords = extract_keywords(item_name);
        if item_keywords.is_empty() {
            return None;
        }

        let mut best: Option<&'a Product> = None;
        let mut best_score = 0;

        for entry in &self.products {
            if entry.keywords.is_empty() {
                continue;
            }
            let all_present = entry
                .keywords
                .iter()
                .all(|pk| item_keywords.iter().any(|ik| ik == pk));
            // Strictly greater keeps the first product seen on ties
            if all_present && entry.keywords.len() > best_score {
                best_score = entry.keywords.len();
                best = Some(entry.product);
            }
        }

        best
    }
}

/// Full name, then first word and first two words for multi-word names.
fn search_terms(item_name: &str) -> Vec<String> {
    let words: Vec<&str> = item_name.split_whitespace().collect();
    let mut terms = vec![item_name.trim().to_string()];
    if words.len() > 1 {
        terms.push(words[0].to_string());
        terms.push(words[..2].join(" "));
    }
    terms
}

/// Case-folded equality or containment in either direction.
fn field_matches(field: &str, term: &str) -> bool {
    !field.is_empty() && (field == term || field.contains(term) || term.contains(field))
}

/// Match `items` against `catalog` in one call.
pub fn match_items(items: Vec<ReceiptItem>, catalog: &[Product]) -> MatchOutcome {
    ProductMatcher::new(catalog).match_items(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductStatus;

    fn catalog() -> Vec<Product> {
        vec![
            Product::known("Mleko 1L", "MLEKO-1L", 10),
            Product::known("Jogurt Balans", "JOGURT-BALANS", 8),
            Product::known("Čokolada Milka", "MILKA-100", 12),
        ]
    }

    #[test]
    fn test_keyword_overlap_matches_dairy() {
        let catalog = catalog();
        let matcher = ProductMatcher::new(&catalog);
        let product = matcher
            .find_product("PREMIA MLEKO SVEZE 2.8% 1/1")
            .expect("should match by keyword");
        assert_eq!(product.identifier, "MLEKO-1L");
    }

    #[test]
    fn test_unrelated_item_does_not_match() {
        let catalog = catalog();
        let matcher = ProductMatcher::new(&catalog);
        assert!(matcher.find_product("Hleb Raznovrsni").is_none());
    }

    #[test]
    fn test_exact_identifier_lookup_is_case_insensitive() {
        let catalog = catalog();
        let matcher = ProductMatcher::new(&catalog);
        let product = matcher.find_product("milka-100").unwrap();
        assert_eq!(product.name, "Čokolada Milka");
    }

    #[test]
    fn test_first_word_substring_lookup() {
        let catalog = catalog();
        let matcher = ProductMatcher::new(&catalog);
        // "jogurt" is contained in the catalog name "jogurt balans"
        let product = matcher.find_product("JOGURT 2.8% 180G").unwrap();
        assert_eq!(product.identifier, "JOGURT-BALANS");
    }

    #[test]
    fn test_item_containing_catalog_name_wins_before_keywords() {
        let catalog = vec![
            Product::known("Premia Mleko", "PREMIA-MLEKO", 4),
            Product::known("Mleko 1L", "MLEKO-1L", 10),
        ];
        let matcher = ProductMatcher::new(&catalog);
        // Keyword overlap alone would pick the first product
        assert_eq!(
            matcher.best_keyword_match("MLEKO 1L PREMIA").unwrap().identifier,
            "PREMIA-MLEKO"
        );
        let product = matcher.find_product("MLEKO 1L PREMIA").unwrap();
        assert_eq!(product.identifier, "MLEKO-1L");
    }

    #[test]
    fn test_first_two_words_lookup() {
        let catalog = vec![Product::known("Plazma Keks", "PLAZMA-KEKS", 6)];
        let matcher = ProductMatcher::new(&catalog);
        // Padded receipt text: only the rejoined first two words contain the name
        let item = "BAMBI-PLAZMA  KEKS 300G";
        assert!(matcher.best_keyword_match(item).is_none());
        let product = matcher.find_product(item).unwrap();
        assert_eq!(product.identifier, "PLAZMA-KEKS");
    }

    #[test]
    fn test_search_terms_for_multi_word_names() {
        assert_eq!(
            search_terms("BAMBI-PLAZMA  KEKS 300G"),
            vec!["BAMBI-PLAZMA  KEKS 300G", "BAMBI-PLAZMA", "BAMBI-PLAZMA KEKS"]
        );
        assert_eq!(search_terms(" Hleb "), vec!["Hleb"]);
    }

    #[test]
    fn test_keyword_match_folds_diacritics() {
        let catalog = vec![Product::known("Čokolada Milka", "CHOC-1", 12)];
        let matcher = ProductMatcher::new(&catalog);
        let product = matcher.find_product("COKOLADA LESNIK MILKA 100G").unwrap();
        assert_eq!(product.identifier, "CHOC-1");
    }

    #[test]
    fn test_keyword_match_prefers_largest_overlap() {
        let catalog = vec![
            Product::known("Sir Trapist", "SIR-X", 1),
            Product::known("Gauda Dimljena", "GAUDA-D", 5),
            Product::known("Imlek Gauda Dimljena", "GAUDA-IMLEK", 9),
        ];
        let matcher = ProductMatcher::new(&catalog);
        let product = matcher.find_product("XX DIMLJENA GAUDA IMLEK").unwrap();
        assert_eq!(product.identifier, "GAUDA-IMLEK");
    }

    #[test]
    fn test_keyword_tie_keeps_catalog_order() {
        let catalog = vec![
            Product::known("Kafa Doncafe", "KAFA-A", 5),
            Product::known("Doncafe Moment", "KAFA-B", 6),
        ];
        let matcher = ProductMatcher::new(&catalog);
        let product = matcher.find_product("XX KAFA MOMENT DONCAFE").unwrap();
        assert_eq!(product.identifier, "KAFA-A");
    }

    #[test]
    fn test_noise_only_product_never_matches_by_keyword() {
        let catalog = vec![Product::known("2.8% 1kg", "NOISE", 100)];
        let matcher = ProductMatcher::new(&catalog);
        assert!(matcher.find_product("Mleko sveže 2.8%").is_none());
    }

    #[test]
    fn test_non_known_products_are_ignored() {
        let mut catalog = catalog();
        for p in &mut catalog {
            p.status = ProductStatus::Pending;
        }
        let matcher = ProductMatcher::new(&catalog);
        assert!(matcher.find_product("MLEKO-1L").is_none());
    }

    #[test]
    fn test_match_items_splits_and_totals() {
        let catalog = catalog();
        let items = vec![
            ReceiptItem::new("PREMIA MLEKO SVEZE 2.8% 1/1", 129.99).with_quantity(2.0),
            ReceiptItem::new("Hleb Raznovrsni", 89.0),
            ReceiptItem::new("MILKA-100", 199.0),
        ];

        let outcome = match_items(items, &catalog);
        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.matched[0].total_points, 20);
        assert_eq!(outcome.matched[1].total_points, 12);
        assert_eq!(outcome.total_points, 32);
        assert_eq!(outcome.unmatched[0].name, "Hleb Raznovrsni");
        assert_eq!(outcome.unmatched[0].points_value, 0);
        assert!(outcome.unmatched[0].product_id.is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let catalog = catalog();
        let matcher = ProductMatcher::new(&catalog);
        let first = matcher.find_product("PREMIA MLEKO SVEZE").map(|p| p.id.clone());
        for _ in 0..10 {
            assert_eq!(
                matcher.find_product("PREMIA MLEKO SVEZE").map(|p| p.id.clone()),
                first
            );
        }
    }
}
