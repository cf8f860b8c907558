// src/aggregate.rs
//! Aggregator / Streamer.
//!
//! Drives every configured source through the [`SourceFetcher`] and reports
//! progress as [`FeedEvent`]s: `Start`, one `Chunk` or `Error` per source as it
//! settles, then exactly one `End`. [`Aggregator::collect`] is the atomic variant
//! that merges everything into one newest-first batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Utc;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::{describe_gauge, gauge};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::SourceConfig;
use crate::error::{AggregateError, FetchError};
use crate::fetch::SourceFetcher;
use crate::model::{sort_newest_first, AggregatedNews, NewsItem};

/// Events buffered between the driver and a slow consumer.
const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// All sources at once; events in completion order.
    Parallel,
    /// One source at a time in configured order, `pacing` between sources.
    Sequential { pacing: Duration },
}

impl Strategy {
    /// `"parallel"` or `"sequential"`, case-insensitive.
    pub fn parse(name: &str, pacing: Duration) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Strategy::Parallel),
            "sequential" => Ok(Strategy::Sequential { pacing }),
            other => bail!("unknown stream strategy `{other}` (expected parallel|sequential)"),
        }
    }
}

/// One incremental record. Serialized as `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FeedEvent {
    Start,
    Chunk { source: String, items: Vec<NewsItem> },
    Error { source: String, error: String },
    End,
}

impl FeedEvent {
    fn for_source(source: &SourceConfig, result: Result<Vec<NewsItem>, FetchError>) -> Option<Self> {
        match result {
            Ok(items) if items.is_empty() => None,
            Ok(items) => Some(FeedEvent::Chunk {
                source: source.host.clone(),
                items,
            }),
            Err(e) => Some(FeedEvent::Error {
                source: source.host.clone(),
                error: e.to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    fetcher: SourceFetcher,
    sources: Arc<Vec<SourceConfig>>,
    strategy: Strategy,
}

impl Aggregator {
    pub fn new(fetcher: SourceFetcher, sources: Vec<SourceConfig>, strategy: Strategy) -> Self {
        describe_gauge!(
            "feeds_last_aggregation_ts",
            "Unix ts of the last atomic aggregation."
        );
        Self {
            fetcher,
            sources: Arc::new(sources),
            strategy,
        }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }

    /// Start an incremental aggregation on a background task.
    ///
    /// Dropping the receiver or cancelling `cancel` aborts in-flight fetches and
    /// pacing sleeps.
    pub fn stream(&self, cancel: CancelToken) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let this = self.clone();
        tokio::spawn(async move { this.run(tx, cancel).await });
        rx
    }

    /// Drive all sources, writing events to `tx`. `End` is sent exactly once
    /// unless the receiver is gone.
    pub async fn run(&self, tx: mpsc::Sender<FeedEvent>, cancel: CancelToken) {
        if tx.send(FeedEvent::Start).await.is_err() {
            return;
        }

        let finished = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tx.closed() => false,
            _ = self.drive(&tx) => true,
        };
        if !finished {
            debug!(target: "feeds", "stream aggregation cancelled");
        }

        let _ = tx.send(FeedEvent::End).await;
    }

    async fn drive(&self, tx: &mpsc::Sender<FeedEvent>) {
        match self.strategy {
            Strategy::Parallel => {
                let mut pending: FuturesUnordered<_> = self
                    .sources
                    .iter()
                    .map(|source| async move { (source, self.fetcher.try_fetch(source).await) })
                    .collect();

                while let Some((source, result)) = pending.next().await {
                    if let Some(event) = FeedEvent::for_source(source, result) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Strategy::Sequential { pacing } => {
                for (i, source) in self.sources.iter().enumerate() {
                    if i > 0 && !pacing.is_zero() {
                        tokio::time::sleep(pacing).await;
                    }
                    let result = self.fetcher.try_fetch(source).await;
                    if let Some(event) = FeedEvent::for_source(source, result) {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Fetch every source concurrently, merge and sort newest first.
    ///
    /// Fails with [`AggregateError::NoData`] only when no source produced an item.
    pub async fn collect(&self) -> Result<AggregatedNews, AggregateError> {
        let per_source = join_all(self.sources.iter().map(|s| self.fetcher.fetch(s))).await;
        let mut items: Vec<NewsItem> = per_source.into_iter().flatten().collect();
        sort_newest_first(&mut items);

        gauge!("feeds_last_aggregation_ts").set(Utc::now().timestamp() as f64);

        let sources = self.sources.len();
        if items.is_empty() {
            warn!(target: "feeds", sources, "no items from any source");
            return Err(AggregateError::NoData { sources });
        }
        info!(target: "feeds", sources, items = items.len(), "aggregated");
        Ok(AggregatedNews::new(items, sources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strategy_names() {
        let p = Duration::from_millis(5);
        assert_eq!(Strategy::parse("Parallel", p).unwrap(), Strategy::Parallel);
        assert_eq!(
            Strategy::parse(" sequential ", p).unwrap(),
            Strategy::Sequential { pacing: p }
        );
        assert!(Strategy::parse("round-robin", p).is_err());
    }

    #[test]
    fn event_wire_shape() {
        assert_eq!(
            serde_json::to_value(FeedEvent::Start).unwrap(),
            json!({"type": "start"})
        );
        assert_eq!(
            serde_json::to_value(FeedEvent::Error {
                source: "fijisun.com.fj".into(),
                error: "boom".into()
            })
            .unwrap(),
            json!({"type": "error", "source": "fijisun.com.fj", "error": "boom"})
        );
    }

    #[test]
    fn empty_success_emits_nothing() {
        let src = SourceConfig::new("https://fijisun.com.fj/feed/").unwrap();
        assert_eq!(FeedEvent::for_source(&src, Ok(vec![])), None);
    }
}
