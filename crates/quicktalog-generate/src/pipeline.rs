//! Category pipeline orchestrator.
//!
//! Linear stage machine over the completion client:
//! detect → structure (bounded fan-out) → order → finalize → enrich.
//!
//! Failure policy per stage: detection failure is fatal; a failed chunk is
//! logged and dropped without disturbing its siblings; an invalid ordering
//! reply degrades to detection order. Zero surviving categories is the only
//! structural outcome treated as fatal.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use quicktalog_core::{
    Error, GenerationRequest, GenerationSource, Item, Layout, Result, StructuredCategory,
};

use crate::client::CompletionBackend;
use crate::config::DEFAULT_MAX_CONCURRENCY;
use crate::extract::{extract, Shape};
use crate::images::{enrich_categories, ImageSearchBackend};
use crate::prompt;

/// Tuning knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Permit count for the structuring and enrichment fan-outs.
    pub max_concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// The catalogue-generation pipeline.
pub struct CataloguePipeline {
    completion: Arc<dyn CompletionBackend>,
    images: Arc<dyn ImageSearchBackend>,
    options: PipelineOptions,
}

impl CataloguePipeline {
    pub fn new(
        completion: Arc<dyn CompletionBackend>,
        images: Arc<dyn ImageSearchBackend>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            completion,
            images,
            options,
        }
    }

    /// Run the full pipeline for one generation request.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<StructuredCategory>> {
        let chunks = self.detect_chunks(request).await?;
        let categories = self.structure_chunks(&chunks, request).await?;
        let ordered = self.order_categories(categories).await;
        let mut finalized = finalize(ordered);

        if request.generate_images {
            enrich_categories(&mut finalized, &self.images, self.options.max_concurrency).await;
        }

        Ok(finalized)
    }

    /// Stage 1 — split the source text into category chunks.
    ///
    /// Any failure here is fatal: without chunks there is nothing to
    /// structure.
    async fn detect_chunks(&self, request: &GenerationRequest) -> Result<Vec<String>> {
        let prompt = prompt::detect_categories(&request.source_text, &request.form_meta);
        let raw = self.completion.complete(&prompt).await?;
        let value = extract(&raw, Shape::Object)?;

        let chunks: Vec<String> = value
            .get("chunks")
            .and_then(|c| c.as_array())
            .ok_or_else(|| Error::MalformedJson("\"chunks\" missing or not an array".into()))?
            .iter()
            .filter_map(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if chunks.is_empty() {
            return Err(Error::NoValidCategories);
        }

        info!("Detected {} category chunks", chunks.len());
        Ok(chunks)
    }

    /// Stage 2 — structure every chunk concurrently under the permit bound.
    ///
    /// Each chunk resolves independently; a failure drops that chunk only.
    async fn structure_chunks(
        &self,
        chunks: &[String],
        request: &GenerationRequest,
    ) -> Result<Vec<StructuredCategory>> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));

        let tasks = chunks.iter().enumerate().map(|(idx, chunk)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, Err(Error::Internal("semaphore closed".into()))),
                };
                let result = self.structure_one(chunk, request).await;
                (idx, result)
            }
        });

        let mut survivors: Vec<StructuredCategory> = Vec::new();
        let mut seen_names: Vec<String> = Vec::new();

        for (idx, result) in join_all(tasks).await {
            match result {
                Ok(category) => {
                    let key = category.name.to_lowercase();
                    if seen_names.contains(&key) {
                        warn!(
                            "Dropping chunk {}: duplicate category name {:?}",
                            idx, category.name
                        );
                        continue;
                    }
                    seen_names.push(key);
                    survivors.push(category);
                }
                Err(e) => {
                    warn!("Dropping chunk {}: {}", idx, e);
                }
            }
        }

        if survivors.is_empty() {
            return Err(Error::NoValidCategories);
        }

        debug!(
            "Structured {}/{} chunks successfully",
            survivors.len(),
            chunks.len()
        );
        Ok(survivors)
    }

    async fn structure_one(
        &self,
        chunk: &str,
        request: &GenerationRequest,
    ) -> Result<StructuredCategory> {
        let prompt = prompt::structure_category(chunk, &request.form_meta, request.source);
        let raw = self.completion.complete(&prompt).await?;
        let value = extract(&raw, Shape::Object).map_err(|e| {
            warn!("Unparsable structuring response: {:?}", raw);
            e
        })?;
        parse_category(&value, request.source)
    }

    /// Stage 3 — ask the model for a browsing order.
    ///
    /// The reply is accepted only if it is an exact permutation of the
    /// surviving names; anything else falls back to fan-out order.
    /// Best-effort refinement, never a source of data loss.
    async fn order_categories(
        &self,
        categories: Vec<StructuredCategory>,
    ) -> Vec<StructuredCategory> {
        let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        let prompt = prompt::order_categories(&names);

        let raw = match self.completion.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ordering call failed, keeping detection order: {}", e);
                return categories;
            }
        };

        let value = match extract(&raw, Shape::Array) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Ordering reply unparsable, keeping detection order: {} (raw: {:?})",
                    e, raw
                );
                return categories;
            }
        };

        match apply_ordering(categories, &value) {
            Ok(ordered) => {
                info!("Applied model ordering over {} categories", ordered.len());
                ordered
            }
            Err((categories, reason)) => {
                warn!("Ordering reply rejected ({}), keeping detection order", reason);
                categories
            }
        }
    }
}

/// Reorder `categories` by the parsed name array, requiring an exact
/// permutation. Returns the untouched input alongside a reason otherwise.
fn apply_ordering(
    categories: Vec<StructuredCategory>,
    parsed: &serde_json::Value,
) -> std::result::Result<Vec<StructuredCategory>, (Vec<StructuredCategory>, String)> {
    let Some(names) = parsed.as_array() else {
        return Err((categories, "not an array".into()));
    };
    if names.len() != categories.len() {
        let reason = format!("length {} != {}", names.len(), categories.len());
        return Err((categories, reason));
    }

    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    for (idx, category) in categories.iter().enumerate() {
        index_by_name.insert(category.name.as_str(), idx);
    }

    let mut positions: Vec<usize> = Vec::with_capacity(names.len());
    for name in names {
        let Some(name) = name.as_str() else {
            return Err((categories, "non-string entry".into()));
        };
        // remove() so a duplicated name fails instead of silently shrinking
        match index_by_name.remove(name) {
            Some(idx) => positions.push(idx),
            None => return Err((categories, format!("unknown or repeated name {name:?}"))),
        }
    }

    let mut slots: Vec<Option<StructuredCategory>> = categories.into_iter().map(Some).collect();
    Ok(positions
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

/// Stage 4 — assign dense zero-based positions.
fn finalize(mut categories: Vec<StructuredCategory>) -> Vec<StructuredCategory> {
    for (position, category) in categories.iter_mut().enumerate() {
        category.order = position as u32;
    }
    categories
}

/// Validate one structuring reply into a category.
///
/// The model-provided layout is honored on the prompt path and overridden
/// on the OCR path, where every category is text-only. Invalid items are
/// dropped; a category with no valid items is a schema violation.
fn parse_category(
    value: &serde_json::Value,
    source: GenerationSource,
) -> Result<StructuredCategory> {
    let name = value
        .get("name")
        .and_then(|n| n.as_str())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::MalformedJson("category name missing or empty".into()))?;

    let layout = match source {
        GenerationSource::Ocr => Layout::Variant3,
        GenerationSource::Prompt => value
            .get("layout")
            .and_then(|l| l.as_str())
            .and_then(Layout::parse)
            .unwrap_or(Layout::Variant1),
    };

    let raw_items = value
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| Error::MalformedJson("\"items\" missing or not an array".into()))?;

    let items: Vec<Item> = raw_items
        .iter()
        .filter_map(|raw| {
            let item_name = raw.get("name")?.as_str()?.trim().to_string();
            if item_name.is_empty() {
                return None;
            }
            Some(Item {
                name: item_name,
                description: raw
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string(),
                price: raw
                    .get("price")
                    .and_then(|p| p.as_f64())
                    .unwrap_or(0.0)
                    .max(0.0),
                image: raw
                    .get("image")
                    .and_then(|i| i.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect();

    if items.is_empty() {
        return Err(Error::MalformedJson(format!(
            "category {name:?} has no valid items"
        )));
    }

    Ok(StructuredCategory {
        name,
        layout,
        order: 0,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;
    use quicktalog_core::FormMeta;

    struct Scripted<F>(F);

    impl<F> CompletionBackend for Scripted<F>
    where
        F: Fn(&str) -> Result<String> + Send + Sync,
    {
        fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
            let result = (self.0)(prompt);
            Box::pin(async move { result })
        }
    }

    fn scripted<F>(f: F) -> Arc<dyn CompletionBackend>
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Scripted(f))
    }

    struct CountingImages {
        calls: AtomicUsize,
    }

    impl ImageSearchBackend for CountingImages {
        fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, Result<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = format!("https://images.test/{query}");
            Box::pin(async move { Ok(url) })
        }
    }

    fn counting_images() -> Arc<CountingImages> {
        Arc::new(CountingImages {
            calls: AtomicUsize::new(0),
        })
    }

    fn is_detect(prompt: &str) -> bool {
        prompt.contains("\"chunks\"")
    }

    fn is_order(prompt: &str) -> bool {
        prompt.starts_with("Reorder")
    }

    fn detect_reply(chunks: &[&str]) -> String {
        serde_json::json!({ "chunks": chunks }).to_string()
    }

    fn category_reply(name: &str, layout: &str, items: &[(&str, f64)]) -> String {
        let items: Vec<serde_json::Value> = items
            .iter()
            .map(|(n, p)| {
                serde_json::json!({"name": n, "description": "", "price": p, "image": ""})
            })
            .collect();
        serde_json::json!({"name": name, "layout": layout, "items": items}).to_string()
    }

    fn request(source: GenerationSource, generate_images: bool) -> GenerationRequest {
        GenerationRequest {
            source_text: "BREAKFAST\nEggs 5\nToast 3\n\nLUNCH\nSoup 6".into(),
            form_meta: FormMeta {
                name: "Cafe Aurora".into(),
                currency: "EUR".into(),
                ..Default::default()
            },
            generate_images,
            source,
        }
    }

    fn make_pipeline(completion: Arc<dyn CompletionBackend>) -> (CataloguePipeline, Arc<CountingImages>) {
        let images = counting_images();
        let pipeline = CataloguePipeline::new(
            completion,
            images.clone() as Arc<dyn ImageSearchBackend>,
            PipelineOptions::default(),
        );
        (pipeline, images)
    }

    /// Two chunks structure cleanly, the model reorders them, and finalize
    /// assigns dense positions by the new sequence.
    #[tokio::test]
    async fn generates_ordered_catalogue() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["BREAKFAST\nEggs 5\nToast 3", "LUNCH\nSoup 6"]))
            } else if is_order(prompt) {
                Ok("[\"Lunch\", \"Breakfast\"]".into())
            } else if prompt.contains("BREAKFAST") {
                Ok(category_reply(
                    "Breakfast",
                    "variant_1",
                    &[("Eggs", 5.0), ("Toast", 3.0)],
                ))
            } else {
                Ok(category_reply("Lunch", "variant_2", &[("Soup", 6.0)]))
            }
        });
        let (pipeline, _) = make_pipeline(completion);

        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Lunch");
        assert_eq!(result[0].order, 0);
        assert_eq!(result[1].name, "Breakfast");
        assert_eq!(result[1].order, 1);
        assert_eq!(result[1].items.len(), 2);
    }

    /// A single failing chunk is dropped; its siblings survive.
    #[tokio::test]
    async fn failing_chunk_does_not_abort_the_batch() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["ONE", "TWO", "THREE"]))
            } else if is_order(prompt) {
                Ok("[\"One\", \"Three\"]".into())
            } else if prompt.contains("Category text:\nTWO") {
                Err(Error::UpstreamUnavailable("connection reset".into()))
            } else if prompt.contains("Category text:\nONE") {
                Ok(category_reply("One", "variant_1", &[("A", 1.0)]))
            } else {
                Ok(category_reply("Three", "variant_1", &[("C", 3.0)]))
            }
        });
        let (pipeline, _) = make_pipeline(completion);

        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        let names: Vec<&str> = result.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Three"]);
    }

    #[tokio::test]
    async fn all_chunks_failing_is_no_valid_categories() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["ONE", "TWO"]))
            } else {
                Err(Error::UpstreamUnavailable("down".into()))
            }
        });
        let (pipeline, _) = make_pipeline(completion);

        let err = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoValidCategories));
    }

    /// Detection failures propagate untranslated so the HTTP layer can map
    /// the status (429 for rate limits, etc.).
    #[tokio::test]
    async fn detect_failure_is_fatal() {
        let completion = scripted(|_| Err(Error::RateLimited("slow down".into())));
        let (pipeline, _) = make_pipeline(completion);

        let err = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn detect_without_json_is_fatal() {
        let completion = scripted(|_| Ok("I could not find any categories.".into()));
        let (pipeline, _) = make_pipeline(completion);

        let err = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoStructuredData));
    }

    fn two_category_completion(order_reply: &'static str) -> Arc<dyn CompletionBackend> {
        scripted(move |prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["BREAKFAST text", "LUNCH text"]))
            } else if is_order(prompt) {
                Ok(order_reply.into())
            } else if prompt.contains("BREAKFAST") {
                Ok(category_reply("Breakfast", "variant_1", &[("Eggs", 5.0)]))
            } else {
                Ok(category_reply("Lunch", "variant_1", &[("Soup", 6.0)]))
            }
        })
    }

    #[tokio::test]
    async fn ordering_wrong_length_falls_back_to_detection_order() {
        let (pipeline, _) = make_pipeline(two_category_completion("[\"Lunch\"]"));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result[0].name, "Breakfast");
        assert_eq!(result[0].order, 0);
        assert_eq!(result[1].name, "Lunch");
        assert_eq!(result[1].order, 1);
    }

    #[tokio::test]
    async fn ordering_unknown_name_falls_back() {
        let (pipeline, _) = make_pipeline(two_category_completion("[\"Lunch\", \"Dinner\"]"));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result[0].name, "Breakfast");
        assert_eq!(result[1].name, "Lunch");
    }

    /// Correct length but a repeated name is not a permutation; silent
    /// shrinkage must not happen.
    #[tokio::test]
    async fn ordering_duplicate_name_falls_back() {
        let (pipeline, _) = make_pipeline(two_category_completion("[\"Lunch\", \"Lunch\"]"));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Breakfast");
        assert_eq!(result[1].name, "Lunch");
    }

    #[tokio::test]
    async fn ordering_garbage_reply_falls_back() {
        let (pipeline, _) = make_pipeline(two_category_completion("I would order them by price."));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Breakfast");
    }

    #[tokio::test]
    async fn valid_permutation_is_applied_exactly() {
        let (pipeline, _) = make_pipeline(two_category_completion("[\"Lunch\", \"Breakfast\"]"));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result[0].name, "Lunch");
        assert_eq!(result[0].order, 0);
        assert_eq!(result[1].name, "Breakfast");
        assert_eq!(result[1].order, 1);
    }

    /// Two chunks resolving to the same name keep only the first; the
    /// catalogue never carries case-insensitive duplicates.
    #[tokio::test]
    async fn duplicate_category_names_are_dropped() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["ONE", "TWO"]))
            } else if is_order(prompt) {
                Ok("[\"Drinks\"]".into())
            } else if prompt.contains("Category text:\nONE") {
                Ok(category_reply("Drinks", "variant_1", &[("Cola", 2.0)]))
            } else {
                Ok(category_reply("DRINKS", "variant_1", &[("Beer", 4.0)]))
            }
        });
        let (pipeline, _) = make_pipeline(completion);

        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "Drinks");
        assert_eq!(result[0].items[0].name, "Cola");
    }

    #[tokio::test]
    async fn ocr_path_pins_text_only_layout() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["MAINS text"]))
            } else if is_order(prompt) {
                Ok("[\"Mains\"]".into())
            } else {
                // Model disobeys the layout rule; the validator overrides it.
                Ok(category_reply("Mains", "variant_1", &[("Stew", 7.0)]))
            }
        });
        let (pipeline, images) = make_pipeline(completion);

        let result = pipeline
            .generate(&request(GenerationSource::Ocr, false))
            .await
            .unwrap();

        assert_eq!(result[0].layout, Layout::Variant3);
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_items_are_dropped_and_prices_clamped() {
        let completion = scripted(|prompt| {
            if is_detect(prompt) {
                Ok(detect_reply(&["MIXED text"]))
            } else if is_order(prompt) {
                Ok("[\"Mixed\"]".into())
            } else {
                Ok(r#"{"name": "Mixed", "layout": "variant_2", "items": [
                    {"name": "Good", "description": "ok", "price": -3, "image": ""},
                    {"description": "nameless", "price": 2},
                    {"name": "   ", "price": 2}
                ]}"#
                .into())
            }
        });
        let (pipeline, _) = make_pipeline(completion);

        let result = pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();

        assert_eq!(result[0].items.len(), 1);
        assert_eq!(result[0].items[0].name, "Good");
        assert_eq!(result[0].items[0].price, 0.0);
    }

    #[tokio::test]
    async fn image_enrichment_runs_only_when_requested() {
        let (pipeline, images) = make_pipeline(two_category_completion("[\"Lunch\", \"Breakfast\"]"));
        pipeline
            .generate(&request(GenerationSource::Prompt, false))
            .await
            .unwrap();
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);

        let (pipeline, images) = make_pipeline(two_category_completion("[\"Lunch\", \"Breakfast\"]"));
        let result = pipeline
            .generate(&request(GenerationSource::Prompt, true))
            .await
            .unwrap();
        assert_eq!(images.calls.load(Ordering::SeqCst), 2);
        assert!(result[0].items[0].image.starts_with("https://images.test/"));
    }
}
