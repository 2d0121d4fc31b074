//! Structural zoning of decision text, as returned by the zoning service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MOTIVATION_ZONE: &str = "motivations";
pub const DISPUTE_SUMMARY_ZONE: &str = "expose du litige";

/// Half-open char range `[start, end)` of a zone in the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRange {
    pub start: usize,
    pub end: usize,
}

/// A zone is either a single range or a list of ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZoneValue {
    One(ZoneRange),
    Many(Vec<ZoneRange>),
}

impl ZoneValue {
    pub fn ranges(&self) -> &[ZoneRange] {
        match self {
            Self::One(range) => std::slice::from_ref(range),
            Self::Many(ranges) => ranges,
        }
    }
}

/// Publicity level reported by the zoning service.
pub mod publicity {
    pub const NOT_PUBLIC: u8 = 0;
    pub const PUBLIC: u8 = 1;
    pub const PARTIALLY_PUBLIC: u8 = 2;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Zoning {
    #[serde(default)]
    pub is_public: Option<u8>,
    #[serde(default)]
    pub zones: Option<BTreeMap<String, ZoneValue>>,
    /// Everything else the service returns, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Zoning {
    pub fn zone(&self, name: &str) -> Option<&ZoneValue> {
        self.zones.as_ref()?.get(name)
    }
}

/// Request body for the zoning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoningRequest {
    pub id: String,
    pub source: String,
    pub text: String,
}
