//! Catalogue generation endpoints.
//!
//! Both endpoints hold the connection for the full pipeline duration and
//! return either a complete catalogue URL or a single error. Stage-local
//! recoveries happen inside the pipeline and never surface here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use quicktalog_core::{Error, FormMeta, GenerationRequest, GenerationSource};
use quicktalog_store::{NewCatalogue, UsageKind};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items/ai", post(generate_from_prompt))
        .route("/items/ocr", post(generate_from_ocr))
}

#[derive(Debug, Deserialize)]
struct AiGenerateBody {
    #[serde(default)]
    prompt: String,
    #[serde(default, rename = "formData")]
    form_data: FormMeta,
    #[serde(default, rename = "shouldGenerateImages")]
    should_generate_images: bool,
}

#[derive(Debug, Deserialize)]
struct OcrGenerateBody {
    #[serde(default)]
    ocr_text: String,
    #[serde(default, rename = "formData")]
    form_data: FormMeta,
}

// ---------------------------------------------------------------
// POST /items/ai — free-text generation
// ---------------------------------------------------------------

async fn generate_from_prompt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AiGenerateBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(user_id) = caller_id(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        );
    };

    if body.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Prompt is required" })),
        );
    }
    if body.form_data.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Name is required" })),
        );
    }

    let request = GenerationRequest {
        source_text: body.prompt,
        form_meta: body.form_data,
        generate_images: body.should_generate_images,
        source: GenerationSource::Prompt,
    };

    let services = match state.pipeline.generate(&request).await {
        Ok(services) => services,
        Err(e) => return pipeline_error(&e),
    };

    let record = match state.store.insert_catalogue(NewCatalogue {
        name: request.form_meta.name.clone(),
        title: request.form_meta.title.clone(),
        currency: request.form_meta.currency.clone(),
        theme: request.form_meta.theme.clone(),
        subtitle: request.form_meta.subtitle.clone(),
        services,
        created_by: user_id.clone(),
        source: request.source.to_string(),
    }) {
        Ok(record) => record,
        Err(e) => {
            error!("Catalogue insert failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    // The catalogue is already written; a usage-log failure is reported
    // without rolling it back.
    if let Err(e) = state.store.record_usage(&user_id, UsageKind::AiGeneration) {
        error!("Usage recording failed for {}: {}", record.slug, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }

    info!(
        "Generated catalogue {} ({} categories) for {}",
        record.slug,
        record.services.len(),
        user_id
    );

    (
        StatusCode::OK,
        Json(json!({
            "catalogueUrl": state.catalogue_url(&record.slug),
            "slug": record.slug,
        })),
    )
}

// ---------------------------------------------------------------
// POST /items/ocr — scanned-document generation
// ---------------------------------------------------------------

async fn generate_from_ocr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<OcrGenerateBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if body.ocr_text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Ocr_text is required" })),
        );
    }
    if body.form_data.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Name is required" })),
        );
    }

    // The scanner flow may run before sign-up completes.
    let user_id = caller_id(&headers).unwrap_or_else(|| "anonymous".into());

    let request = GenerationRequest {
        source_text: body.ocr_text,
        form_meta: body.form_data,
        generate_images: false,
        source: GenerationSource::Ocr,
    };

    let services = match state.pipeline.generate(&request).await {
        Ok(services) => services,
        Err(e) => return pipeline_error(&e),
    };

    let record = match state.store.insert_catalogue(NewCatalogue {
        name: request.form_meta.name.clone(),
        title: request.form_meta.title.clone(),
        currency: request.form_meta.currency.clone(),
        theme: request.form_meta.theme.clone(),
        subtitle: request.form_meta.subtitle.clone(),
        services,
        created_by: user_id.clone(),
        source: request.source.to_string(),
    }) {
        Ok(record) => record,
        Err(e) => {
            error!("Catalogue insert failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };

    if let Err(e) = state.store.record_usage(&user_id, UsageKind::OcrGeneration) {
        error!("Usage recording failed for {}: {}", record.slug, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        );
    }

    info!(
        "Generated catalogue {} from OCR ({} categories)",
        record.slug,
        record.services.len()
    );

    (
        StatusCode::OK,
        Json(json!({ "restaurantUrl": state.catalogue_url(&record.slug) })),
    )
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

/// Identity forwarded by the gateway after third-party authentication.
fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map a fatal pipeline error to a status code and body.
fn pipeline_error(e: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let (status, message) = match e {
        Error::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, e.to_string()),
        Error::QuotaExceeded(_) => (StatusCode::PAYMENT_REQUIRED, e.to_string()),
        Error::UpstreamAuth(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Completion API key is invalid or misconfigured".to_string(),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    error!("Generation failed: {}", e);
    (status, Json(json!({ "error": message })))
}
