// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod stream;

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::aggregate::{Aggregator, FeedEvent, Strategy};
pub use crate::api::{router, AppState};
pub use crate::cancel::CancelToken;
pub use crate::classify::Classifier;
pub use crate::config::{FeedsConfig, SourceConfig};
pub use crate::error::{AggregateError, FetchError, ParseError};
pub use crate::fetch::{FeedTransport, HttpTransport, SourceFetcher};
pub use crate::model::{AggregatedNews, Category, NewsItem};

const DEFAULT_LOG_FILTER: &str = "fiji_news_aggregator=info,feeds=info,warn";

/// Compact tracing to stdout, filtered by `RUST_LOG`.
/// A no-op when the host (e.g. the Shuttle runtime) already installed a subscriber.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Wire config, rule table and transport into the HTTP state.
///
/// `shutdown` bounds background retries and every open stream.
pub fn build_state(
    cfg: &FeedsConfig,
    classifier: Arc<Classifier>,
    transport: Arc<dyn FeedTransport>,
    shutdown: CancelToken,
) -> AppState {
    let fetcher = SourceFetcher::new(transport, classifier, &cfg.fetch, shutdown.clone());
    let aggregator = Aggregator::new(fetcher, cfg.sources.clone(), cfg.strategy);
    AppState::new(aggregator, cfg.cache_ttl, shutdown)
}

/// Router with the production HTTP transport.
pub fn app(
    cfg: &FeedsConfig,
    classifier: Arc<Classifier>,
    shutdown: CancelToken,
) -> anyhow::Result<axum::Router> {
    let transport = Arc::new(HttpTransport::new(&cfg.fetch.user_agent)?);
    Ok(router(build_state(cfg, classifier, transport, shutdown)))
}
