//! Image enrichment — one representative photo per item, fetched from an
//! external image-search API after the catalogue is finalized.

use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use quicktalog_core::{Error, Result, StructuredCategory};

use crate::config::GeneratorConfig;

/// Seam for the image-search service.
pub trait ImageSearchBackend: Send + Sync {
    /// Returns one representative image URL for the query.
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Production image search against the Unsplash search API.
pub struct UnsplashImageSearch {
    client: reqwest::Client,
    url: String,
    access_key: String,
}

impl UnsplashImageSearch {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let access_key = config
            .image_api_key
            .clone()
            .ok_or_else(|| Error::Config("UNSPLASH_ACCESS_KEY is not set".into()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: config.image_search_url.clone(),
            access_key,
        })
    }

    async fn request(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("query", query), ("per_page", "1")])
            .header("Authorization", format!("Client-ID {}", self.access_key))
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => Error::RateLimited(detail),
                401 | 403 => Error::UpstreamAuth(detail),
                _ => Error::UpstreamUnavailable(format!("HTTP {status}: {detail}")),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        payload["results"][0]["urls"]["small"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::UpstreamUnavailable(format!("no image results for {query:?}")))
    }
}

impl ImageSearchBackend for UnsplashImageSearch {
    fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request(query))
    }
}

/// Stub used when no image API key is configured. Every lookup fails, so
/// enrichment leaves images empty instead of blocking generation.
pub struct DisabledImageSearch;

impl ImageSearchBackend for DisabledImageSearch {
    fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async { Err(Error::Config("image search is not configured".into())) })
    }
}

/// Build the image backend from config, falling back to the disabled stub.
pub fn create_backend(config: &GeneratorConfig) -> Arc<dyn ImageSearchBackend> {
    match UnsplashImageSearch::new(config) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            warn!("Image search disabled: {}", e);
            Arc::new(DisabledImageSearch)
        }
    }
}

/// Fetch one image URL per item across all image-bearing categories.
///
/// Fan-out/fan-in under the shared concurrency bound. A failed fetch leaves
/// that item's `image` empty and never aborts the batch. Text-only
/// (`variant_3`) categories are skipped without issuing any call.
pub async fn enrich_categories(
    categories: &mut [StructuredCategory],
    backend: &Arc<dyn ImageSearchBackend>,
    max_concurrency: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut lookups = Vec::new();

    for (cat_idx, category) in categories.iter().enumerate() {
        if !category.layout.supports_images() {
            continue;
        }
        for (item_idx, item) in category.items.iter().enumerate() {
            let backend = Arc::clone(backend);
            let semaphore = Arc::clone(&semaphore);
            let query = item.name.clone();
            lookups.push(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (cat_idx, item_idx, String::new()),
                };
                match backend.search(&query).await {
                    Ok(url) => (cat_idx, item_idx, url),
                    Err(e) => {
                        warn!("Image lookup failed for {:?}: {}", query, e);
                        (cat_idx, item_idx, String::new())
                    }
                }
            });
        }
    }

    if lookups.is_empty() {
        return;
    }
    debug!("Fetching {} item images", lookups.len());

    for (cat_idx, item_idx, url) in join_all(lookups).await {
        categories[cat_idx].items[item_idx].image = url;
    }
}
