// src/fetch/transport.rs
//! Outbound HTTP seam. Production uses reqwest; tests swap in canned bodies.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::FetchError;

#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// GET `url` and return the body. Any content type is accepted.
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, timeout, e))
    }
}
