//! Flyer listing response types

use serde::{Deserialize, Serialize};

/// Listing endpoint response: `{"flyers": [...]}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlyerListing {
    #[serde(default)]
    pub flyers: Vec<ListedFlyer>,
}

/// One flyer entry in a listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListedFlyer {
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Numeric in practice, accepted as a string too
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Tile path prefix on the tile host, e.g. `abc/`
    #[serde(default)]
    pub path: Option<String>,
}

impl ListedFlyer {
    /// External id as a string; `None` for missing, null, zero or empty ids
    pub fn external_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) if n.as_u64() == Some(0) => None,
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Tile path, `None` when missing or blank
    pub fn tile_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.trim().is_empty())
    }

    pub fn merchant_matches(&self, merchant: &str) -> bool {
        self.merchant
            .as_deref()
            .map(|m| m.trim().to_lowercase() == merchant.trim().to_lowercase())
            .unwrap_or(false)
    }

    /// Exact (case-sensitive) category membership after trimming
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.trim() == category)
    }
}

/// A located flyer: what the tile discoverer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlyerMatch {
    pub flyer_id: String,
    pub path: String,
}
