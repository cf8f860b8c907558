// src/config.rs
//! Feed sources and fetch/stream/cache policy, loaded from TOML.
//!
//! Resolution order:
//! 1) $FEEDS_CONFIG_PATH
//! 2) config/feeds.toml
//! 3) the copy of config/feeds.toml embedded at build time
//!
//! `FEEDS_STRATEGY=parallel|sequential` overrides the configured strategy.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::aggregate::Strategy;

pub const DEFAULT_FEEDS_CONFIG_PATH: &str = "config/feeds.toml";
pub const ENV_FEEDS_CONFIG_PATH: &str = "FEEDS_CONFIG_PATH";
pub const ENV_FEEDS_STRATEGY: &str = "FEEDS_STRATEGY";

const BUILTIN_FEEDS: &str = include_str!("../config/feeds.toml");

/// One configured feed. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
    /// Hostname without scheme or leading `www.`; never empty.
    pub host: String,
    /// Per-source override of the default request timeout.
    pub timeout: Option<Duration>,
}

impl SourceConfig {
    pub fn new(url: &str) -> Result<Self> {
        let url = url.trim();
        let host = normalize_host(url).ok_or_else(|| anyhow!("source `{url}` has no host"))?;
        Ok(Self {
            url: url.to_string(),
            host,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// `https://www.fijitimes.com.fj/feed/` → `fijitimes.com.fj`.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("http://{raw}")).ok()?
    };
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub user_agent: String,
    pub default_timeout: Duration,
    /// Minimum wait after a failure before the source is fetched again.
    pub cooldown: Duration,
    /// Failures tolerated (each followed by a background retry) before giving up.
    pub max_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        let s = FetchSection::default();
        Self {
            user_agent: s.user_agent,
            default_timeout: Duration::from_secs(s.default_timeout_secs),
            cooldown: Duration::from_secs(s.cooldown_secs),
            max_retries: s.max_retries,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedsConfig {
    pub fetch: FetchSettings,
    pub strategy: Strategy,
    pub cache_ttl: Duration,
    pub sources: Vec<SourceConfig>,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Deserialize)]
struct FeedsRoot {
    #[serde(default)]
    fetch: FetchSection,
    #[serde(default)]
    stream: StreamSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FetchSection {
    user_agent: String,
    default_timeout_secs: u64,
    cooldown_secs: u64,
    max_retries: u32,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            user_agent: concat!("fiji-news-aggregator/", env!("CARGO_PKG_VERSION")).to_string(),
            default_timeout_secs: 10,
            cooldown_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StreamSection {
    strategy: String,
    pacing_ms: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            strategy: "parallel".to_string(),
            pacing_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CacheSection {
    ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    url: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl FeedsConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_FEEDS_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_FEEDS_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            Self::from_path(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_FEEDS_CONFIG_PATH);
            if default.exists() {
                Self::from_path(&default)?
            } else {
                Self::builtin()?
            }
        };

        if let Some(strategy) = parse_strategy_env(std::env::var(ENV_FEEDS_STRATEGY).ok(), &cfg) {
            cfg.strategy = strategy;
        }
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feeds config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_FEEDS)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let root: FeedsRoot = toml::from_str(s).context("parsing feeds config toml")?;

        if root.sources.is_empty() {
            bail!("feeds config lists no sources");
        }
        let mut sources: Vec<SourceConfig> = Vec::with_capacity(root.sources.len());
        for entry in root.sources {
            let mut src = SourceConfig::new(&entry.url)?;
            if let Some(secs) = entry.timeout_secs {
                src = src.with_timeout(Duration::from_secs(secs));
            }
            if sources.iter().any(|s| s.url == src.url) {
                bail!("source `{}` is listed twice", src.url);
            }
            sources.push(src);
        }

        let pacing = Duration::from_millis(root.stream.pacing_ms);
        let strategy = Strategy::parse(&root.stream.strategy, pacing)?;

        Ok(Self {
            fetch: FetchSettings {
                user_agent: root.fetch.user_agent,
                default_timeout: Duration::from_secs(root.fetch.default_timeout_secs),
                cooldown: Duration::from_secs(root.fetch.cooldown_secs),
                max_retries: root.fetch.max_retries,
            },
            strategy,
            cache_ttl: Duration::from_secs(root.cache.ttl_secs),
            sources,
        })
    }
}

// Unknown values are ignored; the configured pacing is kept for "sequential".
fn parse_strategy_env(raw: Option<String>, cfg: &FeedsConfig) -> Option<Strategy> {
    let pacing = match cfg.strategy {
        Strategy::Sequential { pacing } => pacing,
        Strategy::Parallel => Duration::from_millis(StreamSection::default().pacing_ms),
    };
    raw.and_then(|s| Strategy::parse(s.trim(), pacing).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lists_six_sources_with_one_slow_override() {
        let cfg = FeedsConfig::builtin().unwrap();
        assert_eq!(cfg.sources.len(), 6);
        assert_eq!(cfg.strategy, Strategy::Parallel);
        assert_eq!(cfg.fetch.default_timeout, Duration::from_secs(10));
        assert_eq!(cfg.fetch.cooldown, Duration::from_secs(30));
        assert_eq!(cfg.fetch.max_retries, 3);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(300));

        let slow: Vec<_> = cfg.sources.iter().filter(|s| s.timeout.is_some()).collect();
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].host, "fijitimes.com.fj");
        assert_eq!(slow[0].timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn host_normalization() {
        assert_eq!(
            normalize_host("https://www.fbcnews.com.fj/feed/").as_deref(),
            Some("fbcnews.com.fj")
        );
        assert_eq!(
            normalize_host("http://FijiSun.com.fj").as_deref(),
            Some("fijisun.com.fj")
        );
        assert_eq!(
            normalize_host("www.fijilive.com/feed").as_deref(),
            Some("fijilive.com")
        );
        assert_eq!(normalize_host(""), None);
        assert_eq!(normalize_host("https://"), None);
    }

    #[test]
    fn duplicate_sources_are_rejected() {
        let toml = r#"
[[sources]]
url = "https://fijisun.com.fj/feed/"
[[sources]]
url = "https://fijisun.com.fj/feed/"
"#;
        assert!(FeedsConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn strategy_env_override_keeps_pacing() {
        let toml = r#"
[stream]
strategy = "sequential"
pacing_ms = 40
[[sources]]
url = "https://fijisun.com.fj/feed/"
"#;
        let cfg = FeedsConfig::from_toml_str(toml).unwrap();
        assert_eq!(
            cfg.strategy,
            Strategy::Sequential {
                pacing: Duration::from_millis(40)
            }
        );
        assert_eq!(
            parse_strategy_env(Some("PARALLEL".into()), &cfg),
            Some(Strategy::Parallel)
        );
        assert_eq!(parse_strategy_env(Some("bogus".into()), &cfg), None);
        assert_eq!(parse_strategy_env(None, &cfg), None);
    }
}
