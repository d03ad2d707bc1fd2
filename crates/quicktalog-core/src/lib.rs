//! Quicktalog Core — error type, server configuration, catalogue domain types.

pub mod catalogue;
pub mod config;
pub mod error;

pub use catalogue::{
    FormMeta, GenerationRequest, GenerationSource, Item, Layout, StructuredCategory,
};
pub use config::{DataPaths, ServerConfig};
pub use error::{Error, Result};
