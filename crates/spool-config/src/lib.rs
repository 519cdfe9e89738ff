#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Typed configuration for the Spool ingestion runtime.
//!
//! Layout: `model.rs` (settings structs), `defaults.rs` (documented defaults),
//! `loader.rs` (environment loading), `validate.rs` (field parsers), `error.rs`.

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ENV_ENGINE_URL;
pub use model::{
    BasicCredentials, EngineSettings, IngestConfig, LogSettings, PosterSettings, TimingSettings,
};
