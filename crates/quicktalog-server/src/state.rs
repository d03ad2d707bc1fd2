//! Shared application state.

use quicktalog_core::ServerConfig;
use quicktalog_generate::CataloguePipeline;
use quicktalog_store::CatalogueStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub store: CatalogueStore,
    pub pipeline: CataloguePipeline,
}

impl AppState {
    pub fn new(config: ServerConfig, store: CatalogueStore, pipeline: CataloguePipeline) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }

    /// Public URL for a published catalogue.
    pub fn catalogue_url(&self, slug: &str) -> String {
        format!("{}/{}", self.config.catalogue_base_path, slug)
    }
}
