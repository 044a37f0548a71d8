#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/reader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Unified entry point for fetching provider time series.
//!
//! This crate re-exports the core types and traits, the cache
//! implementations and the HTTP pipeline, and provides [`Reader`], which
//! wires a [`SourceAdapter`] to them.
//!
//! # Example
//!
//! ```rust,ignore
//! use reader::{DateRange, FetchRequest, Options, Reader, ReaderError, SourceAdapter};
//! use chrono::NaiveDate;
//!
//! #[derive(Debug)]
//! struct FredAdapter {
//!     api_key: String,
//! }
//!
//! impl SourceAdapter for FredAdapter {
//!     type Record = String;
//!
//!     fn name(&self) -> &str {
//!         "FRED"
//!     }
//!
//!     fn build_request(&self, id: &str, range: &DateRange) -> reader::Result<FetchRequest> {
//!         FetchRequest::get(format!(
//!             "https://api.example.com/series/{id}?start={}&end={}",
//!             range.start(),
//!             range.end(),
//!         ))
//!         .secret_header("x-api-key", &self.api_key)
//!     }
//!
//!     fn parse_response(&self, _id: &str, body: &[u8]) -> reader::Result<String> {
//!         String::from_utf8(body.to_vec()).map_err(|e| ReaderError::Parse(e.to_string()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> reader::Result<()> {
//!     let reader = Reader::new(Options::new().with_rate_limit(2.0, 1), FredAdapter {
//!         api_key: std::env::var("FRED_API_KEY").unwrap_or_default(),
//!     })?;
//!
//!     let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!     let series = reader.read(&["GDP", "UNRATE"], start, end).await?;
//!     println!("{}", series.len());
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use reader_core::*;

// Cache implementations
pub use reader_cache::{FileCache, InMemoryCache, NoopCache, cache_for_dir};

// HTTP pipeline
pub use reader_http::{CancellationToken, RateLimiter, RetryPolicy, RetryingTransport, fetch_all};

mod reader;
pub use reader::Reader;
