//! The source adapter contract.
//!
//! Every data provider plugs into the shared fetch pipeline through
//! [`SourceAdapter`]. The adapter knows how to address one series at the
//! provider and how to decode the payload; the pipeline owns retries, rate
//! limiting, caching and concurrency.

use std::fmt::Debug;

use crate::{error::Result, request::FetchRequest, types::DateRange};

/// Provider-specific request construction and payload decoding.
///
/// Implementations must be cheap to share across tasks; the pipeline calls
/// both methods concurrently from many workers.
pub trait SourceAdapter: Send + Sync + Debug + 'static {
    /// Parsed record produced for one identifier.
    type Record: Send + 'static;

    /// Returns the name of this source (e.g., "FRED").
    fn name(&self) -> &str;

    /// Builds the request that fetches `id` over `range`.
    ///
    /// URL layout and credential placement are up to the adapter. Use
    /// [`FetchRequest::secret_header`] for credentials so they stay out of
    /// cache keys.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`](crate::ReaderError::InvalidInput)
    /// if `id` cannot be expressed at this provider.
    fn build_request(&self, id: &str, range: &DateRange) -> Result<FetchRequest>;

    /// Decodes a raw response body into a record.
    ///
    /// # Errors
    /// Decode failures should be returned as
    /// [`ReaderError::Parse`](crate::ReaderError::Parse); they are surfaced
    /// unchanged as the failure for `id`.
    fn parse_response(&self, id: &str, body: &[u8]) -> Result<Self::Record>;
}
