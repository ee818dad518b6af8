use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::Ean;

const UNKNOWN_PRODUCT: &str = "Unknown product";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub ean: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub resolved: bool,
}

/// Server-side state of one inventory line after an add or remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: i64,
    #[serde(default)]
    pub product: Option<Product>,
    pub quantity: i64,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: i64,
}

impl InventoryEntry {
    pub fn display_name(&self) -> &str {
        self.product
            .as_ref()
            .map(|product| product.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_PRODUCT)
    }

    /// Category without the Open Food Facts locale prefix (`en:pasta` -> `pasta`).
    pub fn display_category(&self) -> Option<&str> {
        let category = self.product.as_ref()?.category.as_deref()?;
        let stripped = strip_locale_prefix(category);
        (!stripped.is_empty()).then_some(stripped)
    }

    pub fn expiry(&self) -> Option<NaiveDate> {
        let raw = self.expiry_date.as_deref()?.trim();
        // The backend emits plain dates, but tolerate full timestamps.
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

fn strip_locale_prefix(category: &str) -> &str {
    let bytes = category.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_lowercase()
        && bytes[1].is_ascii_lowercase()
        && bytes[2] == b':'
    {
        &category[3..]
    } else {
        category
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddUnitRequest {
    pub ean: Ean,
    pub expiry_date: Option<String>,
}

impl AddUnitRequest {
    pub fn new(ean: Ean) -> Self {
        Self {
            ean,
            expiry_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
