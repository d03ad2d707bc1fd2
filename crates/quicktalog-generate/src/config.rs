//! Generation pipeline configuration.
//!
//! All upstream endpoints and credentials are resolved once at startup and
//! passed in explicitly, so the pipeline can be pointed at fake endpoints
//! in tests.

use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_IMAGE_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";

/// Default permit count for the structuring/enrichment fan-out.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default per-request deadline for upstream calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Configuration for the completion client and image search client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Completion API key. Required for the production client.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_completion_url")]
    pub completion_url: String,
    /// Image search API key (Unsplash access key).
    #[serde(default)]
    pub image_api_key: Option<String>,
    #[serde(default = "default_image_search_url")]
    pub image_search_url: String,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.into()
}
fn default_image_search_url() -> String {
    DEFAULT_IMAGE_SEARCH_URL.into()
}
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.into(),
            completion_url: DEFAULT_COMPLETION_URL.into(),
            image_api_key: None,
            image_search_url: DEFAULT_IMAGE_SEARCH_URL.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl GeneratorConfig {
    /// Resolve configuration from environment variables and defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.api_key = std::env::var("OPENAI_API_KEY").ok();
        config.image_api_key = std::env::var("UNSPLASH_ACCESS_KEY").ok();

        if let Ok(model) = std::env::var("QUICKTALOG_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("QUICKTALOG_COMPLETION_URL") {
            config.completion_url = url;
        }
        if let Ok(url) = std::env::var("QUICKTALOG_IMAGE_SEARCH_URL") {
            config.image_search_url = url;
        }
        if let Some(n) = std::env::var("QUICKTALOG_MAX_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.max_concurrency = n;
        }
        if let Some(secs) = std::env::var("QUICKTALOG_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.request_timeout_secs = secs;
        }

        config
    }
}
