//! Fiji news aggregator: binary entrypoint.
//! Boots the Axum HTTP server behind the Shuttle runtime.
//!
//! Environment:
//!   FEEDS_CONFIG_PATH     feeds/policy TOML (default config/feeds.toml, else built-in)
//!   FEEDS_STRATEGY        parallel | sequential
//!   CATEGORY_RULES_PATH   classifier rule table (default config/categories.toml, else built-in)
//!   RUST_LOG              tracing filter

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::info;

use fiji_news_aggregator::metrics::Metrics;
use fiji_news_aggregator::{app, init_tracing, CancelToken, Classifier, FeedsConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = FeedsConfig::load().context("loading feeds config")?;
    let classifier = Arc::new(Classifier::load().context("loading category rules")?);
    let metrics = Metrics::init(cfg.sources.len())?;

    info!(
        target: "feeds",
        sources = cfg.sources.len(),
        strategy = ?cfg.strategy,
        rules = classifier.rules().len(),
        "starting news aggregator"
    );

    // Root token for the process lifetime; streams and retries hang off it.
    let shutdown = CancelToken::new();
    let router = app(&cfg, classifier, shutdown)?.merge(metrics.router());

    Ok(router.into())
}
