// src/api.rs
//! Delivery Adapter: HTTP surface over the [`Aggregator`].
//!
//! - `GET /health`
//! - `GET /api/news[?category=...]`: atomic batch, cached for the configured TTL
//! - `GET /api/news-stream`: NDJSON records as sources settle

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::aggregate::Aggregator;
use crate::cancel::CancelToken;
use crate::error::AggregateError;
use crate::model::{AggregatedNews, Category};
use crate::stream::to_line;

pub const NEWS_ERROR_MESSAGE: &str = "Failed to fetch news. Please try again later.";

/// Last atomic aggregation, reused until it is `ttl` old.
#[derive(Debug)]
pub struct NewsCache {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<AggregatedNews>)>>,
}

impl NewsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached batch if fresh, otherwise aggregate and store. Failures are not cached.
    /// Concurrent callers wait on one refresh instead of each hitting every source.
    pub async fn get_or_refresh(
        &self,
        aggregator: &Aggregator,
    ) -> Result<Arc<AggregatedNews>, AggregateError> {
        let mut slot = self.slot.lock().await;
        if let Some((at, news)) = slot.as_ref() {
            if at.elapsed() < self.ttl {
                debug!(target: "feeds", "serving cached news");
                return Ok(news.clone());
            }
        }
        let fresh = Arc::new(aggregator.collect().await?);
        *slot = Some((Instant::now(), fresh.clone()));
        Ok(fresh)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub cache: Arc<NewsCache>,
    /// Parent of every stream's token; cancelling it ends all streams.
    pub shutdown: CancelToken,
}

impl AppState {
    pub fn new(aggregator: Aggregator, cache_ttl: Duration, shutdown: CancelToken) -> Self {
        Self {
            aggregator,
            cache: Arc::new(NewsCache::new(cache_ttl)),
            shutdown,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(get_news))
        .route("/api/news-stream", get(news_stream))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct NewsQuery {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn get_news(State(state): State<AppState>, Query(q): Query<NewsQuery>) -> Response {
    let category = match q.category.as_deref().filter(|c| !c.trim().is_empty()) {
        None => Category::All,
        Some(raw) => match raw.parse::<Category>() {
            Ok(c) => c,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
    };

    let news = match state.cache.get_or_refresh(&state.aggregator).await {
        Ok(news) => news,
        Err(e) => {
            error!(target: "feeds", error = %e, "atomic aggregation failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, NEWS_ERROR_MESSAGE);
        }
    };

    let body = if category == Category::All {
        (*news).clone()
    } else {
        news.filtered(category)
    };
    let cache_control = format!("public, max-age={}", state.cache.ttl().as_secs());
    ([(header::CACHE_CONTROL, cache_control)], Json(body)).into_response()
}

async fn news_stream(State(state): State<AppState>) -> Response {
    let cancel = state.shutdown.child();
    // Lives inside the body stream: a dropped connection cancels the aggregation.
    let guard = cancel.drop_guard();
    let events = state.aggregator.stream(cancel);

    let lines = ReceiverStream::new(events).map(move |event| {
        let _guard = &guard;
        to_line(&event)
    });

    (
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}
