//! Store record types.

use serde::{Deserialize, Serialize};

use quicktalog_core::StructuredCategory;

/// A catalogue ready to be persisted. The slug is assigned on insert.
#[derive(Debug, Clone)]
pub struct NewCatalogue {
    pub name: String,
    pub title: String,
    pub currency: String,
    pub theme: String,
    pub subtitle: String,
    pub services: Vec<StructuredCategory>,
    pub created_by: String,
    pub source: String,
}

/// A persisted catalogue row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueRecord {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub title: String,
    pub currency: String,
    pub theme: String,
    pub subtitle: String,
    pub services: Vec<StructuredCategory>,
    pub created_by: String,
    pub source: String,
    pub created_at: i64,
}

/// The kind of usage event being recorded against a user's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    AiGeneration,
    OcrGeneration,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::AiGeneration => "ai_generation",
            UsageKind::OcrGeneration => "ocr_generation",
        }
    }
}

impl std::fmt::Display for UsageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operational counters for the stats route.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub catalogues: i64,
    pub usage_events: i64,
    pub db_size_mb: f64,
}
