//! CQL-to-ELM translation client
//!
//! Sends Clinical Quality Language sources to a translation web service and
//! decodes the Expression Logical Model it returns, either as a multipart
//! bundle of libraries or as a single ELM JSON document.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod processors;

// Re-export key types for convenience
pub use crate::core::{
    client::ElmTranslator,
    config::ClientConfig,
    errors::{ElmError, Result},
    models::{CqlInput, ElmOutput, TranslationIssue},
};

pub use processors::library::LibraryLoader;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
