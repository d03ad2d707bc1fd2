//! Catalogue domain types shared across the generation pipeline, the store,
//! and the HTTP surface. Serialized field names match the frontend API.

use serde::{Deserialize, Serialize};

/// Presentation variant for a category.
///
/// `Variant3` is the text-only layout: items under it carry no images and
/// the enrichment step skips them entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    #[serde(rename = "variant_1")]
    Variant1,
    #[serde(rename = "variant_2")]
    Variant2,
    #[serde(rename = "variant_3")]
    Variant3,
    #[serde(rename = "variant_4")]
    Variant4,
}

impl Layout {
    /// Whether items under this layout display images.
    pub fn supports_images(&self) -> bool {
        !matches!(self, Layout::Variant3)
    }

    /// Parse the wire form (`variant_1`..`variant_4`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "variant_1" => Some(Layout::Variant1),
            "variant_2" => Some(Layout::Variant2),
            "variant_3" => Some(Layout::Variant3),
            "variant_4" => Some(Layout::Variant4),
            _ => None,
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layout::Variant1 => write!(f, "variant_1"),
            Layout::Variant2 => write!(f, "variant_2"),
            Layout::Variant3 => write!(f, "variant_3"),
            Layout::Variant4 => write!(f, "variant_4"),
        }
    }
}

/// A single catalogue entry (dish, product, service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    /// Image URL, or empty string when none is available.
    #[serde(default)]
    pub image: String,
}

/// One structured category of the finished catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredCategory {
    pub name: String,
    pub layout: Layout,
    /// Zero-based position, dense and unique within a catalogue.
    /// Assigned by the finalize stage only.
    pub order: u32,
    pub items: Vec<Item>,
}

/// Form metadata passed through to every prompt, immutable for the
/// duration of one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub subtitle: String,
}

/// Which flow seeded the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    /// Free-text business description typed by the user.
    Prompt,
    /// Text already extracted from a scanned document.
    Ocr,
}

impl std::fmt::Display for GenerationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationSource::Prompt => write!(f, "ai"),
            GenerationSource::Ocr => write!(f, "ocr"),
        }
    }
}

/// Input to the catalogue-generation pipeline.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub source_text: String,
    pub form_meta: FormMeta,
    pub generate_images: bool,
    pub source: GenerationSource,
}
