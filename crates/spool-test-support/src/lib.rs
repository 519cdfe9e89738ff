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

//! Shared test helpers used across Spool suites.
//! Layout: fixtures.rs (descriptor and magnet builders), mocks.rs (scriptable engine,
//! poster provider and descriptor fetcher).

pub mod fixtures;
pub mod mocks;

pub use fixtures::{
    DescriptorFixture, SAMPLE_HASH, base32_magnet_uri, magnet_uri, multi_file_descriptor,
    sample_hash, single_file_descriptor,
};
pub use mocks::{EngineCall, ScriptedEngine, ScriptedFetcher, ScriptedPosters};
