//! Local HTTP server used by the transport and orchestrator tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;

/// A running server and the number of requests it has answered.
pub(crate) struct TestServer {
    pub(crate) base_url: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// Starts a server on an ephemeral local port.
    ///
    /// Routes:
    /// - `/ok` answers 200 with body `payload`
    /// - `/status/{code}` answers with `code`
    /// - `/flaky/{failures}` answers 503 for the first `failures` hits, then 200 `recovered`
    /// - `/throttled` answers 429 with `Retry-After: 30`
    /// - `/slow` answers 200 after five seconds
    pub(crate) async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/ok", get(ok))
            .route("/status/{code}", get(status))
            .route("/flaky/{failures}", get(flaky))
            .route("/throttled", get(throttled))
            .route("/slow", get(slow))
            .with_state(Arc::clone(&hits));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Client that ignores proxy environment variables.
pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// An address nothing listens on.
pub(crate) async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/gone")
}

async fn ok(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "payload"
}

async fn status(State(hits): State<Arc<AtomicUsize>>, Path(code): Path<u16>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn flaky(
    State(hits): State<Arc<AtomicUsize>>,
    Path(failures): Path<usize>,
) -> (StatusCode, &'static str) {
    let seen = hits.fetch_add(1, Ordering::SeqCst);
    if seen < failures {
        (StatusCode::SERVICE_UNAVAILABLE, "try again")
    } else {
        (StatusCode::OK, "recovered")
    }
}

async fn throttled(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, "30")],
        "slow down",
    )
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    "finally"
}
