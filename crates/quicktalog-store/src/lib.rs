//! Quicktalog Store — SQLite persistence for published catalogues and
//! usage events.

pub mod schema;
pub mod slug;
pub mod sqlite;
pub mod types;

pub use slug::new_slug;
pub use sqlite::CatalogueStore;
pub use types::{CatalogueRecord, NewCatalogue, StoreStats, UsageKind};
