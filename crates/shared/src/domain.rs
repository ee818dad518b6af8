use std::fmt;

use serde::{Deserialize, Serialize};

/// Scanned product identifier. The barcode payload is treated as opaque text;
/// the backend is responsible for EAN-8/EAN-13 validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ean(pub String);

impl Ean {
    /// Builds an identifier from raw scanner input. Returns `None` when the
    /// input is blank once surrounding whitespace is stripped.
    pub fn from_scan(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Add,
    #[default]
    Remove,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Add => f.write_str("ADD"),
            Mode::Remove => f.write_str("REMOVE"),
        }
    }
}
