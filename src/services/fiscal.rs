// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fiscal authority client for resolving scanned receipts.
//!
//! Handles:
//! - Fetching the receipt viewer page the QR code points at
//! - Extracting invoice number and token, store chain, tax ID and city
//! - Fetching line items from the specifications endpoint (best effort)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ReceiptItem;

lazy_static! {
    static ref INVOICE_NUMBER: Regex = Regex::new(r#"InvoiceNumber\(['"]([^'"]+)['"]\)"#).unwrap();
    static ref TOKEN: Regex = Regex::new(r#"Token\(['"]([^'"]+)['"]\)"#).unwrap();
    static ref FISCAL_ID: Regex = Regex::new(r"(\d{9})").unwrap();
    static ref HEX_ENTITY: Regex = Regex::new(r"&#x([0-9A-Fa-f]+);").unwrap();
}

/// Retail chains recognised on receipt pages, in priority order.
pub const DEFAULT_STORE_CHAINS: &[&str] = &[
    "LIDL",
    "MAXI",
    "IDEA",
    "RODA",
    "UNIVEREXPORT",
    "AMAN",
    "DIS",
    "TEMPO",
    "MERCATOR",
    "GOMEX",
];

/// Latin spellings of Serbian cities, with and without diacritics.
pub const DEFAULT_LATIN_CITIES: &[&str] = &[
    "Beograd", "Novi Sad", "Niš", "Nis", "Kragujevac", "Subotica", "Zrenjanin", "Pančevo",
    "Pancevo", "Čačak", "Cacak", "Novi Pazar", "Kraljevo", "Smederevo", "Leskovac", "Užice",
    "Uzice", "Valjevo", "Kruševac", "Krusevac", "Vranje", "Šabac", "Sabac", "Sombor",
    "Požarevac", "Pozarevac", "Pirot", "Zaječar", "Zajecar", "Kikinda", "Sremska Mitrovica",
    "Jagodina", "Vršac", "Vrsac", "Bor", "Prokuplje", "Loznica", "Kanjiža", "Kanjiza", "Senta",
    "Ada", "Bačka Topola", "Backa Topola",
];

/// Cyrillic city names and their canonical Latin spelling.
pub const DEFAULT_CYRILLIC_CITIES: &[(&str, &str)] = &[
    ("Белград", "Beograd"),
    ("Нови Сад", "Novi Sad"),
    ("Ниш", "Niš"),
    ("Суботица", "Subotica"),
    ("Крагујевац", "Kragujevac"),
    ("Зрењанин", "Zrenjanin"),
    ("Панчево", "Pančevo"),
    ("Чачак", "Čačak"),
    ("Нови Пазар", "Novi Pazar"),
    ("Краљево", "Kraljevo"),
    ("Смедерево", "Smederevo"),
    ("Лесковац", "Leskovac"),
    ("Ужице", "Užice"),
    ("Ваљево", "Valjevo"),
    ("Крушевац", "Kruševac"),
    ("Врање", "Vranje"),
    ("Шабац", "Šabac"),
    ("Сомбор", "Sombor"),
    ("Пожаревац", "Požarevac"),
    ("Пирот", "Pirot"),
    ("Зајечар", "Zaječar"),
    ("Кикинда", "Kikinda"),
    ("Сремска Митровица", "Sremska Mitrovica"),
    ("Јагодина", "Jagodina"),
    ("Вршац", "Vršac"),
    ("Бор", "Bor"),
    ("Прокупље", "Prokuplje"),
    ("Лозница", "Loznica"),
    ("Кањижа", "Kanjiža"),
    ("Сента", "Senta"),
    ("Ада", "Ada"),
    ("Бачка Топола", "Bačka Topola"),
];

/// A city name pattern with its canonical spelling.
///
/// Names match as whole words; punctuation and tag brackets delimit them.
struct CityPattern {
    regex: Regex,
    canonical: String,
}

/// Allow-lists used to recognise stores and cities on receipt pages.
pub struct FiscalDirectory {
    store_chains: Vec<String>,
    /// Longest names first so "Novi Sad" wins over shorter fragments
    cities: Vec<CityPattern>,
}

impl FiscalDirectory {
    /// Build a directory from store chains, Latin city names and
    /// `(cyrillic, latin)` city pairs.
    pub fn new(
        store_chains: Vec<String>,
        latin_cities: Vec<String>,
        cyrillic_cities: Vec<(String, String)>,
    ) -> std::result::Result<Self, regex::Error> {
        let mut names: Vec<(String, String)> = Vec::new();
        let candidates = latin_cities
            .into_iter()
            .map(|c| (c.clone(), c))
            .chain(cyrillic_cities);
        for (name, canonical) in candidates {
            if !names.iter().any(|(n, _)| *n == name) {
                names.push((name, canonical));
            }
        }
        // Stable sort keeps list order among equal lengths
        names.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let cities = names
            .into_iter()
            .map(|(name, canonical)| {
                let pattern = format!(
                    r"(?i)(?:^|[\s,.:;/\-<>]){}(?:$|[\s,.:;/\-<>])",
                    regex::escape(&name)
                );
                Ok(CityPattern {
                    regex: Regex::new(&pattern)?,
                    canonical,
                })
            })
            .collect::<std::result::Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            store_chains: store_chains.into_iter().map(|s| s.to_uppercase()).collect(),
            cities,
        })
    }

    /// First configured chain found anywhere in the page, title-cased; empty
    /// if none. Chains match as plain substrings, not whole words.
    pub fn detect_store_name(&self, html: &str) -> String {
        let upper = html.to_uppercase();
        self.store_chains
            .iter()
            .find(|chain| upper.contains(chain.as_str()))
            .map(|chain| title_case(chain))
            .unwrap_or_default()
    }

    /// Canonical name of the longest city mentioned as a whole word.
    pub fn detect_location(&self, html: &str) -> Option<String> {
        let decoded = decode_hex_entities(html);
        self.cities
            .iter()
            .find(|city| city.regex.is_match(&decoded) || city.regex.is_match(html))
            .map(|city| city.canonical.clone())
    }
}

impl Default for FiscalDirectory {
    fn default() -> Self {
        Self::new(
            DEFAULT_STORE_CHAINS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_LATIN_CITIES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_CYRILLIC_CITIES
                .iter()
                .map(|(c, l)| (c.to_string(), l.to_string()))
                .collect(),
        )
        .expect("built-in city names are valid patterns")
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Replace `&#xHH;` entities with the characters they encode.
pub fn decode_hex_entities(html: &str) -> String {
    HEX_ENTITY
        .replace_all(html, |caps: &regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Identity data scraped from a receipt viewer page.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptPage {
    pub invoice_number: String,
    pub token: String,
    /// Empty when no known chain appears
    pub store_name: String,
    pub store_fiscal_id: Option<String>,
    pub store_location: Option<String>,
}

/// Parse a receipt viewer page.
///
/// Fails only when the invoice number or token is missing.
pub fn parse_receipt_page(html: &str, directory: &FiscalDirectory) -> Result<ReceiptPage> {
    let invoice_number = INVOICE_NUMBER.captures(html).map(|c| c[1].to_string());
    let token = TOKEN.captures(html).map(|c| c[1].to_string());

    let (invoice_number, token) = match (invoice_number, token) {
        (Some(i), Some(t)) => (i, t),
        _ => {
            return Err(AppError::Parse(
                "Could not extract receipt identifiers".to_string(),
            ))
        }
    };

    Ok(ReceiptPage {
        invoice_number,
        token,
        store_name: directory.detect_store_name(html),
        store_fiscal_id: FISCAL_ID.captures(html).map(|c| c[1].to_string()),
        store_location: directory.detect_location(html),
    })
}

/// Everything the fiscal service told us about a receipt.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptData {
    /// Empty when the chain is not recognised
    pub store_name: String,
    /// Tax ID, or an `UNKNOWN-<millis>` placeholder
    pub store_fiscal_id: String,
    pub store_location: Option<String>,
    pub items: Vec<ReceiptItem>,
    pub fetched_at: DateTime<Utc>,
}

/// Specifications endpoint response.
#[derive(Debug, Deserialize)]
struct SpecificationsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    items: Option<Vec<SpecificationItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecificationItem {
    name: Option<String>,
    quantity: Option<f64>,
    unit_price: Option<f64>,
    total: Option<f64>,
    gtin: Option<String>,
    label: Option<String>,
}

impl From<SpecificationItem> for ReceiptItem {
    fn from(item: SpecificationItem) -> Self {
        let name = item
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let quantity = item.quantity.filter(|q| *q != 0.0).unwrap_or(1.0);
        ReceiptItem {
            name,
            quantity,
            unit_price: item.unit_price.unwrap_or(0.0),
            price: item.total.unwrap_or(0.0),
            gtin: item.gtin.unwrap_or_default(),
            label: item.label.unwrap_or_default(),
        }
    }
}

/// Fiscal authority HTTP client.
#[derive(Clone)]
pub struct FiscalClient {
    http: reqwest::Client,
    specifications_url: String,
    directory: Arc<FiscalDirectory>,
}

impl FiscalClient {
    /// Create a client whose requests each time out after `timeout`.
    pub fn new(
        specifications_url: impl Into<String>,
        timeout: Duration,
        directory: Arc<FiscalDirectory>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            specifications_url: specifications_url.into(),
            directory,
        })
    }

    /// Resolve a receipt reference (the QR payload URL).
    pub async fn fetch(&self, reference: &str) -> Result<ReceiptData> {
        let response = self
            .http
            .get(reference)
            .send()
            .await
            .map_err(|e| AppError::Fetch(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Receipt page returned HTTP {}",
                response.status()
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::Fetch(describe_request_error(&e)))?;

        let page = parse_receipt_page(&html, &self.directory)?;
        tracing::debug!(
            invoice_number = %page.invoice_number,
            store = %page.store_name,
            "Receipt page parsed"
        );

        let items = match self.fetch_items(&page.invoice_number, &page.token).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    invoice_number = %page.invoice_number,
                    "Specifications call failed, continuing without items"
                );
                Vec::new()
            }
        };

        let fetched_at = Utc::now();
        let store_fiscal_id = page
            .store_fiscal_id
            .unwrap_or_else(|| format!("UNKNOWN-{}", fetched_at.timestamp_millis()));

        Ok(ReceiptData {
            store_name: page.store_name,
            store_fiscal_id,
            store_location: page.store_location,
            items,
            fetched_at,
        })
    }

    /// Fetch line items for an invoice.
    async fn fetch_items(&self, invoice_number: &str, token: &str) -> Result<Vec<ReceiptItem>> {
        let response = self
            .http
            .post(&self.specifications_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("invoiceNumber", invoice_number), ("token", token)])
            .send()
            .await
            .map_err(|e| AppError::Fetch(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(AppError::Fetch(format!(
                "Specifications returned HTTP {}",
                response.status()
            )));
        }

        let body: SpecificationsResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Specifications JSON parse error: {}", e)))?;

        if !body.success {
            tracing::warn!(invoice_number, "Specifications response reported failure");
            return Ok(Vec::new());
        }

        Ok(body
            .items
            .unwrap_or_default()
            .into_iter()
            .map(ReceiptItem::from)
            .collect())
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Fiscal service timed out".to_string()
    } else {
        format!("Failed to fetch receipt from fiscal service: {}", e)
    }
}
