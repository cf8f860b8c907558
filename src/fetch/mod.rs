// src/fetch/mod.rs
//! Source Fetcher: one feed in, typed and classified items out.
//!
//! `fetch` never fails; every error degrades to an empty list for that source.
//! Failures are recorded in the [`RetryTable`] and repaired by a detached retry
//! that waits out the cooldown, bounded by `max_retries` and by the fetcher's
//! cancellation token.

pub mod retry;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::classify::Classifier;
use crate::config::{FetchSettings, SourceConfig};
use crate::error::FetchError;
use crate::feed::{parse_feed, parse_feed_date, RawItem};
use crate::model::{NewsItem, VolumeLabel};
use crate::normalize::{collapse_whitespace, preview, strip_markup};

pub use retry::{FetchAttemptState, RetryDecision, RetryPolicy, RetryTable};
pub use transport::{FeedTransport, HttpTransport};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feeds_fetch_total", "Fetch attempts per source.");
        describe_counter!(
            "feeds_fetch_errors_total",
            "Failed fetches per source and error kind."
        );
        describe_counter!("feeds_items_total", "Items produced per source.");
        describe_counter!(
            "feeds_retry_scheduled_total",
            "Background retries scheduled after a failure."
        );
        describe_histogram!("feeds_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Cheap to clone; clones share the retry table.
#[derive(Clone)]
pub struct SourceFetcher {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn FeedTransport>,
    classifier: Arc<Classifier>,
    retries: RetryTable,
    default_timeout: Duration,
    /// Bounds background retries to the owner's lifetime.
    cancel: CancelToken,
}

impl SourceFetcher {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        classifier: Arc<Classifier>,
        settings: &FetchSettings,
        cancel: CancelToken,
    ) -> Self {
        ensure_metrics_described();
        let policy = RetryPolicy {
            cooldown: settings.cooldown,
            max_retries: settings.max_retries,
        };
        Self {
            inner: Arc::new(Inner {
                transport,
                classifier,
                retries: RetryTable::new(policy),
                default_timeout: settings.default_timeout,
                cancel,
            }),
        }
    }

    pub fn retries(&self) -> &RetryTable {
        &self.inner.retries
    }

    pub fn classifier(&self) -> &Classifier {
        &self.inner.classifier
    }

    pub fn timeout_for(&self, source: &SourceConfig) -> Duration {
        source.timeout.unwrap_or(self.inner.default_timeout)
    }

    /// Items for `source`, or empty on any failure.
    pub async fn fetch(&self, source: &SourceConfig) -> Vec<NewsItem> {
        self.try_fetch(source).await.unwrap_or_default()
    }

    /// Like [`fetch`](Self::fetch) but reports why a source came back empty.
    /// Failure bookkeeping and retry scheduling happen either way.
    pub async fn try_fetch(&self, source: &SourceConfig) -> Result<Vec<NewsItem>, FetchError> {
        if let Some(remaining) = self.inner.retries.cooldown_remaining(&source.url, Instant::now())
        {
            debug!(target: "feeds", source = %source.host, remaining_s = remaining.as_secs(), "skipping source in cooldown");
            return Err(FetchError::CoolingDown {
                url: source.url.clone(),
                remaining,
            });
        }

        counter!("feeds_fetch_total", "source" => source.host.clone()).increment(1);

        match self.fetch_once(source).await {
            Ok(items) => {
                self.inner.retries.clear(&source.url);
                counter!("feeds_items_total", "source" => source.host.clone())
                    .increment(items.len() as u64);
                debug!(target: "feeds", source = %source.host, items = items.len(), "fetched");
                Ok(items)
            }
            Err(e) => {
                counter!(
                    "feeds_fetch_errors_total",
                    "source" => source.host.clone(),
                    "kind" => e.kind()
                )
                .increment(1);
                warn!(target: "feeds", source = %source.host, error = %e, "fetch failed");
                self.on_failure(source);
                Err(e)
            }
        }
    }

    async fn fetch_once(&self, source: &SourceConfig) -> Result<Vec<NewsItem>, FetchError> {
        let timeout = self.timeout_for(source);

        // The outer timeout also bounds transports that ignore the hint.
        let body = match tokio::time::timeout(
            timeout,
            self.inner.transport.get(&source.url, timeout),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: source.url.clone(),
                    timeout,
                })
            }
        };

        let t0 = std::time::Instant::now();
        let parsed = parse_feed(&body).map_err(|e| FetchError::Parse {
            url: source.url.clone(),
            source: e,
        })?;
        histogram!("feeds_parse_ms").record(t0.elapsed().as_secs_f64() * 1000.0);

        Ok(parsed
            .items
            .into_iter()
            .map(|raw| self.build_item(source, raw))
            .collect())
    }

    fn build_item(&self, source: &SourceConfig, raw: RawItem) -> NewsItem {
        let title = raw
            .title
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();
        let link = raw.link.as_deref().map(str::trim).unwrap_or_default().to_string();
        let published_at = raw
            .pub_date
            .as_deref()
            .and_then(parse_feed_date)
            .unwrap_or_else(Utc::now);
        let content = raw.body().to_string();
        let guid = raw
            .guid
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}", source.url, title));
        let categories =
            self.inner
                .classifier
                .classify(&title, &strip_markup(&content), &raw.categories);

        NewsItem {
            preview: preview(&content),
            title,
            link,
            published_at,
            content,
            source_host: source.host.clone(),
            guid,
            categories,
            volume_label: Some(VolumeLabel::from_date(published_at)),
        }
    }

    fn on_failure(&self, source: &SourceConfig) {
        match self.inner.retries.record_failure(&source.url, Instant::now()) {
            RetryDecision::Retry { attempt } => {
                counter!("feeds_retry_scheduled_total").increment(1);
                debug!(target: "feeds", source = %source.host, attempt, "retry scheduled");
                schedule_retry(self.clone(), source.clone());
            }
            RetryDecision::GiveUp => {
                debug!(target: "feeds", source = %source.host, "retry ceiling reached; state reset");
            }
        }
    }
}

// Detached: the caller already has its empty result. A successful retry only
// clears the failure state for later calls.
fn schedule_retry(fetcher: SourceFetcher, source: SourceConfig) {
    let cooldown = fetcher.inner.retries.policy().cooldown;
    let cancel = fetcher.inner.cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(target: "feeds", source = %source.host, "retry cancelled");
            }
            _ = tokio::time::sleep(cooldown) => {
                let _ = fetcher.try_fetch(&source).await;
            }
        }
    });
}
