// src/stream.rs
//! NDJSON wire format for [`FeedEvent`] plus the consumer side of it.
//!
//! Consumers must tolerate garbage: a line that is not JSON, or a record missing
//! required fields, is skipped and the stream carries on.

use std::collections::BTreeSet;

use tracing::debug;

use crate::aggregate::FeedEvent;
use crate::model::{sort_newest_first, NewsItem};

/// One record plus the trailing newline.
pub fn to_line(event: &FeedEvent) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// `None` for blank, malformed or incomplete records.
pub fn decode_line(line: &str) -> Option<FeedEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(ev) => Some(ev),
        Err(e) => {
            debug!(target: "feeds", error = %e, "skipping unreadable stream line");
            None
        }
    }
}

/// Reassembles lines split across transport chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every complete, readable record it finished.
    pub fn push(&mut self, chunk: &str) -> Vec<FeedEvent> {
        self.buf.push_str(chunk);
        let Some(last_nl) = self.buf.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buf.split_off(last_nl + 1);
        let complete = std::mem::replace(&mut self.buf, rest);
        complete.lines().filter_map(decode_line).collect()
    }

    /// Whatever is left once the transport closes.
    pub fn finish(&mut self) -> Option<FeedEvent> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }
}

/// Progressive view of one stream: items kept newest first as chunks arrive.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NewsCollector {
    pub items: Vec<NewsItem>,
    pub loaded_sources: BTreeSet<String>,
    pub errors: Vec<(String, String)>,
    pub started: bool,
    pub finished: bool,
}

impl NewsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Start => {
                *self = Self {
                    started: true,
                    ..Self::default()
                };
            }
            FeedEvent::Chunk { source, items } => {
                self.items.extend(items);
                sort_newest_first(&mut self.items);
                self.loaded_sources.insert(source);
            }
            FeedEvent::Error { source, error } => self.errors.push((source, error)),
            FeedEvent::End => self.finished = true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, hour: u32) -> NewsItem {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap();
        NewsItem {
            title: title.into(),
            link: String::new(),
            published_at: ts,
            content: String::new(),
            preview: String::new(),
            source_host: "fijisun.com.fj".into(),
            guid: title.into(),
            categories: vec![],
            volume_label: None,
        }
    }

    #[test]
    fn decoder_reassembles_split_lines_and_skips_junk() {
        let mut d = LineDecoder::new();
        assert!(d.push(r#"{"type":"sta"#).is_empty());
        let got = d.push("rt\"}\nnot json\n{\"type\":\"chunk\"}\n{\"type\":\"end\"}");
        assert_eq!(got, vec![FeedEvent::Start]);
        assert_eq!(d.finish(), Some(FeedEvent::End));
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn collector_merges_newest_first() {
        let mut c = NewsCollector::new();
        c.apply(FeedEvent::Start);
        c.apply(FeedEvent::Chunk {
            source: "a".into(),
            items: vec![item("old", 1), item("mid", 5)],
        });
        c.apply(FeedEvent::Error {
            source: "b".into(),
            error: "timeout".into(),
        });
        c.apply(FeedEvent::Chunk {
            source: "c".into(),
            items: vec![item("new", 9)],
        });
        c.apply(FeedEvent::End);

        let titles: Vec<_> = c.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
        assert_eq!(c.loaded_sources.len(), 2);
        assert_eq!(c.errors.len(), 1);
        assert!(c.started && c.finished);
    }

    #[test]
    fn line_roundtrip_ends_with_newline() {
        let line = to_line(&FeedEvent::End).unwrap();
        assert_eq!(line, "{\"type\":\"end\"}\n");
    }
}
