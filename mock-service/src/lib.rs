use axum::{debug_handler, extract::Path, extract::State, http::StatusCode, routing::get, Router};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Handle to a running mock service.
#[derive(Clone)]
pub struct MockService {
    pub addr: SocketAddr,
    hits: Arc<AtomicU64>,
}

impl MockService {
    /// Binds an ephemeral local port and serves in the background.
    pub async fn spawn() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicU64::new(0));

        let app = router(hits.clone());
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                tracing::error!("Mock service stopped: {err}");
            }
        });

        Ok(Self { addr, hits })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests that reached a handler.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

pub fn router(hits: Arc<AtomicU64>) -> Router {
    Router::new()
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route("/hang", get(hang))
        .route("/limited/:max_tps/server/:server_id", get(limited))
        .layer(TraceLayer::new_for_http())
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> std::io::Result<()> {
    axum::serve(listener, router(Arc::new(AtomicU64::new(0)))).await
}

#[debug_handler]
async fn delay(State(hits): State<Arc<AtomicU64>>, Path(delay_ms): Path<u64>) {
    hits.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

#[debug_handler]
async fn status(State(hits): State<Arc<AtomicU64>>, Path(code): Path<u16>) -> StatusCode {
    hits.fetch_add(1, Ordering::Relaxed);
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Accepts the request and never answers.
#[debug_handler]
async fn hang(State(hits): State<Arc<AtomicU64>>) {
    hits.fetch_add(1, Ordering::Relaxed);
    std::future::pending::<()>().await;
}

lazy_static! {
    static ref LIMITED_MAP: RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

/// Answers 200 up to `max_tps` per second per server id and 429 beyond.
#[debug_handler]
async fn limited(
    State(hits): State<Arc<AtomicU64>>,
    Path((max_tps, server_id)): Path<(u32, String)>,
) -> StatusCode {
    hits.fetch_add(1, Ordering::Relaxed);

    let Some(max_tps) = NonZeroU32::new(max_tps) else {
        return StatusCode::BAD_REQUEST;
    };

    let read = LIMITED_MAP
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&server_id)
        .cloned();
    let limiter = match read {
        Some(limiter) => limiter,
        None => LIMITED_MAP
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(server_id)
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(max_tps))))
            .clone(),
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => {
            debug!("Limited server over {max_tps} TPS");
            StatusCode::TOO_MANY_REQUESTS
        }
    }
}
