#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/reader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the provider fetch pipeline.
//!
//! This crate provides the abstractions shared by the transport, the caches
//! and every source adapter:
//!
//! - [`SourceAdapter`](adapter::SourceAdapter) - Provider request building and decoding
//! - [`ResponseCache`](cache::ResponseCache) - Raw response caching abstraction
//! - [`FetchRequest`](request::FetchRequest) and [`Fingerprint`](request::Fingerprint)
//! - [`Options`](options::Options) - Per-reader configuration
//! - [`ReaderError`](error::ReaderError) - Error taxonomy

/// Source adapter contract.
pub mod adapter;
/// Cache trait for raw responses.
pub mod cache;
/// Error types for fetch operations.
pub mod error;
/// Reader configuration.
pub mod options;
/// Request, response and fingerprint types.
pub mod request;
/// Core value types (date ranges).
pub mod types;

// Re-export commonly used items at crate root
pub use adapter::SourceAdapter;
pub use cache::ResponseCache;
pub use error::{ReaderError, Result};
pub use options::Options;
pub use request::{FetchRequest, FetchResponse, Fingerprint};
pub use types::DateRange;
