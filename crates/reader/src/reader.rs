//! The reader: one adapter wired to the shared fetch pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use reader_core::{DateRange, Options, ReaderError, Result, SourceAdapter};
use reader_http::{CancellationToken, RetryingTransport, fetch_all};

/// Fetches time series for many identifiers from one source.
///
/// A reader owns the transport built from its [`Options`], so every read
/// shares one rate limiter, one cache and one HTTP connection pool.
///
/// # Example
///
/// ```rust,ignore
/// use reader::{Options, Reader};
/// use chrono::NaiveDate;
/// use std::time::Duration;
///
/// let options = Options::new()
///     .with_rate_limit(5.0, 1)
///     .with_cache("/tmp/reader-cache", Duration::from_secs(3600));
/// let reader = Reader::new(options, FredAdapter::new(api_key))?;
///
/// let series = reader
///     .read(
///         &["GDP", "CPIAUCSL"],
///         NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
///         NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
///     )
///     .await?;
/// ```
#[derive(Debug)]
pub struct Reader<A: SourceAdapter> {
    options: Options,
    adapter: Arc<A>,
    transport: RetryingTransport,
}

impl<A: SourceAdapter> Reader<A> {
    /// Create a reader, building its transport from `options`.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`] for invalid options, or an error
    /// if the HTTP client or the cache directory cannot be set up.
    pub fn new(options: Options, adapter: A) -> Result<Self> {
        options.validate()?;
        let transport = RetryingTransport::from_options(&options)?;
        debug!(source = adapter.name(), "Created reader");
        Ok(Self {
            options,
            adapter: Arc::new(adapter),
            transport,
        })
    }

    /// Create a reader around an existing transport.
    ///
    /// The transport's retry policy, limiter and cache take precedence over
    /// the matching fields of `options`.
    ///
    /// # Errors
    /// Returns [`ReaderError::InvalidInput`] for invalid options.
    pub fn with_transport(
        options: Options,
        adapter: A,
        transport: RetryingTransport,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            adapter: Arc::new(adapter),
            transport,
        })
    }

    /// Returns the reader options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the source adapter.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Returns the transport shared by all reads.
    #[must_use]
    pub const fn transport(&self) -> &RetryingTransport {
        &self.transport
    }

    /// Fetches every identifier over `[start, end]`.
    ///
    /// # Errors
    /// See [`read_with_cancel`](Self::read_with_cancel).
    pub async fn read<S: AsRef<str>>(
        &self,
        ids: &[S],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, A::Record>> {
        self.read_with_cancel(&CancellationToken::new(), ids, start, end)
            .await
    }

    /// Fetches every identifier over `[start, end]`, stopping when `ctx` is
    /// cancelled.
    ///
    /// Duplicate identifiers are fetched once. Either every identifier
    /// succeeds or the first failure is returned.
    ///
    /// # Errors
    /// - [`ReaderError::InvalidInput`] for an empty or blank identifier list,
    ///   or `start > end`; nothing is sent.
    /// - [`ReaderError::Canceled`] if `ctx` is cancelled before any work starts.
    /// - [`ReaderError::Fetch`] naming the first identifier that failed.
    pub async fn read_with_cancel<S: AsRef<str>>(
        &self,
        ctx: &CancellationToken,
        ids: &[S],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, A::Record>> {
        validate_ids(ids)?;
        let range = DateRange::new(start, end)?;

        info!(
            source = self.adapter.name(),
            ids = ids.len(),
            range = %range,
            "Reading series"
        );

        let adapter = Arc::clone(&self.adapter);
        let transport = self.transport.clone();
        fetch_all(ctx, ids, self.options.max_concurrency, move |ctx, id| {
            let adapter = Arc::clone(&adapter);
            let transport = transport.clone();
            async move {
                let request = adapter.build_request(&id, &range)?;
                let response = transport.execute(&ctx, &request).await?;
                adapter.parse_response(&id, &response.body)
            }
        })
        .await
    }

    /// Fetches a single identifier over `[start, end]`.
    ///
    /// # Errors
    /// Same as [`read`](Self::read).
    pub async fn read_one(
        &self,
        id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<A::Record> {
        let mut records = self.read(&[id], start, end).await?;
        records
            .remove(id)
            .ok_or_else(|| ReaderError::TaskFailed(format!("no record returned for {id}")))
    }
}

fn validate_ids<S: AsRef<str>>(ids: &[S]) -> Result<()> {
    if ids.is_empty() {
        return Err(ReaderError::InvalidInput(
            "at least one identifier is required".to_string(),
        ));
    }
    if ids.iter().any(|id| id.as_ref().trim().is_empty()) {
        return Err(ReaderError::InvalidInput(
            "identifiers must not be blank".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use reader_cache::{FileCache, NoopCache};
    use reader_core::FetchRequest;
    use reader_http::{RateLimiter, RetryPolicy};

    /// Serves `/series/{id}` as a JSON array of numbers.
    ///
    /// `BAD` answers with a body that is not JSON, `MISSING` with 404 and
    /// `DOWN` with 503.
    async fn start_server() -> (String, Arc<AtomicUsize>) {
        async fn series(
            State(hits): State<Arc<AtomicUsize>>,
            Path(id): Path<String>,
        ) -> (StatusCode, String) {
            hits.fetch_add(1, Ordering::SeqCst);
            match id.as_str() {
                "BAD" => (StatusCode::OK, "<html>maintenance</html>".to_string()),
                "MISSING" => (StatusCode::NOT_FOUND, "unknown series".to_string()),
                "DOWN" => (StatusCode::SERVICE_UNAVAILABLE, String::new()),
                other => (StatusCode::OK, format!("[{}, 2.5]", other.len())),
            }
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/series/{id}", get(series))
            .with_state(Arc::clone(&hits));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    #[derive(Debug)]
    struct SeriesAdapter {
        base_url: String,
    }

    impl SourceAdapter for SeriesAdapter {
        type Record = Vec<f64>;

        fn name(&self) -> &str {
            "Fixture"
        }

        fn build_request(&self, id: &str, range: &DateRange) -> Result<FetchRequest> {
            FetchRequest::get(format!(
                "{}/series/{id}?start={}&end={}",
                self.base_url,
                range.start(),
                range.end()
            ))
            .secret_header("x-api-key", "hunter2")
        }

        fn parse_response(&self, id: &str, body: &[u8]) -> Result<Self::Record> {
            serde_json::from_slice(body).map_err(|e| ReaderError::Parse(format!("{id}: {e}")))
        }
    }

    fn transport(cache: Arc<dyn reader_core::ResponseCache>) -> RetryingTransport {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        RetryingTransport::new(
            client,
            Arc::new(RateLimiter::unlimited()),
            cache,
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(5),
            },
            Duration::from_secs(3600),
        )
    }

    async fn fixture() -> (Reader<SeriesAdapter>, Arc<AtomicUsize>) {
        let (base_url, hits) = start_server().await;
        let reader = Reader::with_transport(
            Options::new(),
            SeriesAdapter { base_url },
            transport(Arc::new(NoopCache::new())),
        )
        .unwrap();
        (reader, hits)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_reads_every_id() {
        let (reader, hits) = fixture().await;

        let ids = ["GDP", "CPIAUCSL", "UNRATE"];
        let records = reader
            .read(&ids, date(2020, 1, 1), date(2020, 12, 31))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records["GDP"], vec![3.0, 2.5]);
        assert_eq!(records["CPIAUCSL"], vec![8.0, 2.5]);
        assert_eq!(records["UNRATE"], vec![6.0, 2.5]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_one() {
        let (reader, _) = fixture().await;
        let record = reader
            .read_one("GDP", date(2020, 1, 1), date(2020, 1, 1))
            .await
            .unwrap();
        assert_eq!(record, vec![3.0, 2.5]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_fetched_once() {
        let (reader, hits) = fixture().await;
        let records = reader
            .read(&["GDP", "GDP", "M2"], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_sends_nothing() {
        let (reader, hits) = fixture().await;
        let empty: [&str; 0] = [];

        let err = reader
            .read(&empty, date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::InvalidInput(_)));

        let err = reader
            .read(&["GDP", "  "], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::InvalidInput(_)));

        let err = reader
            .read(&["GDP"], date(2021, 1, 1), date(2020, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::InvalidInput(_)));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_names_id() {
        let (reader, _) = fixture().await;
        let err = reader
            .read(&["GDP", "BAD"], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();

        match err {
            ReaderError::Fetch { id, source } => {
                assert_eq!(id, "BAD");
                assert!(matches!(*source, ReaderError::Parse(_)));
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (reader, hits) = fixture().await;
        let err = reader
            .read(&["MISSING"], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();

        assert!(err.is_client_error());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let (reader, hits) = fixture().await;
        let err = reader
            .read(&["DOWN"], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();

        match err {
            ReaderError::Fetch { id, source } => {
                assert_eq!(id, "DOWN");
                assert!(matches!(
                    *source,
                    ReaderError::RetriesExhausted { attempts: 2, .. }
                ));
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let (reader, hits) = fixture().await;
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = reader
            .read_with_cancel(&ctx, &["GDP"], date(2020, 1, 1), date(2020, 2, 1))
            .await
            .unwrap_err();

        assert!(err.is_canceled());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_read_served_from_cache() {
        let (base_url, hits) = start_server().await;
        let dir = tempfile::tempdir().unwrap();
        let reader = Reader::with_transport(
            Options::new(),
            SeriesAdapter { base_url },
            transport(Arc::new(FileCache::new(dir.path()).unwrap())),
        )
        .unwrap();
        let ids = ["GDP", "M2"];

        let (start, end) = (date(2020, 1, 1), date(2020, 2, 1));

        let first = reader.read(&ids, start, end).await.unwrap();
        let second = reader.read(&ids, start, end).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // A different range is a different request.
        reader.read(&ids, start, date(2020, 3, 1)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_new_builds_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("responses");
        let options = Options::new().with_cache(&cache_dir, Duration::from_secs(60));

        let reader = Reader::new(
            options,
            SeriesAdapter {
                base_url: "http://localhost".into(),
            },
        )
        .unwrap();

        assert!(cache_dir.is_dir());
        assert!(reader.transport().cache().is_enabled());
        assert_eq!(reader.adapter().name(), "Fixture");
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let options = Options::new().with_max_concurrency(0);
        let result = Reader::new(
            options,
            SeriesAdapter {
                base_url: "http://localhost".into(),
            },
        );
        assert!(matches!(result, Err(ReaderError::InvalidInput(_))));
    }
}
