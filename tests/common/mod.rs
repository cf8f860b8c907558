// tests/common/mod.rs
//
// Shared helpers: a scripted in-memory transport and feed builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use fiji_news_aggregator::config::FetchSettings;
use fiji_news_aggregator::{Classifier, FeedTransport, FetchError};

pub const FBC_RSS: &str = include_str!("../fixtures/fbcnews_rss.xml");
pub const ISLANDS_ATOM: &str = include_str!("../fixtures/islandsbusiness_atom.xml");
pub const MALFORMED: &str = include_str!("../fixtures/malformed.xml");

#[derive(Debug, Clone)]
pub enum Canned {
    Body(String),
    Status(u16),
    /// Never answers; the fetcher's timeout has to cut it off.
    Hang,
}

/// Answers per URL. A script with several entries is consumed front to back and
/// its last entry repeats. Unknown URLs fail as network errors.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: Mutex<HashMap<String, Vec<Canned>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, answer: Canned) -> Self {
        self.script(url, vec![answer])
    }

    pub fn script(self, url: &str, answers: Vec<Canned>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), answers);
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn next_answer(&self, url: &str) -> Option<Canned> {
        let mut routes = self.routes.lock().unwrap();
        let script = routes.get_mut(url)?;
        if script.len() > 1 {
            Some(script.remove(0))
        } else {
            script.first().cloned()
        }
    }
}

#[async_trait]
impl FeedTransport for StaticTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        match self.next_answer(url) {
            Some(Canned::Body(b)) => Ok(b),
            Some(Canned::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            Some(Canned::Hang) => std::future::pending().await,
            None => Err(FetchError::Network {
                url: url.to_string(),
                message: "connection refused".into(),
            }),
        }
    }
}

pub fn classifier() -> Arc<Classifier> {
    Arc::new(Classifier::builtin().expect("builtin rules"))
}

pub fn settings() -> FetchSettings {
    FetchSettings {
        user_agent: "fiji-news-aggregator-tests".into(),
        default_timeout: Duration::from_secs(10),
        cooldown: Duration::from_secs(30),
        max_retries: 3,
    }
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

/// Minimal RSS 2.0 document with one `<item>` per `(title, published)`.
pub fn rss_feed(items: &[(String, DateTime<Utc>)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>"#);
    for (i, (title, published)) in items.iter().enumerate() {
        xml.push_str(&format!(
            "<item><title>{title}</title><link>https://example.fj/{i}</link>\
             <pubDate>{}</pubDate><description>Story {i} from Suva.</description></item>",
            published.to_rfc2822()
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}
