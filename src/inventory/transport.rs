use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use reqwest::{Client, Method};
use tracing::{debug, error, warn};

use crate::config::{InventoryConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS};

/// Raw "fetch text from URL" capability supplied by the HTTP/session layer.
#[async_trait]
pub trait WebFetch: Send + Sync {
    async fn fetch(&self, url: &str, method: Method) -> Result<String>;

    /// Session identifier of the logged-in web session, if any.
    fn session_id(&self) -> Option<String> {
        None
    }
}

/// `reqwest`-backed community site client.
pub struct CommunityClient {
    http: Client,
    session_id: Option<String>,
}

impl CommunityClient {
    pub fn new(cfg: &InventoryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/html;q=0.9, */*;q=0.8"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&cfg.user_agent).context("invalid STEAM_USER_AGENT")?,
        );
        if let Some(cookie) = session_cookie(cfg.cookie.as_deref(), cfg.session_id.as_deref()) {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&cookie).context("invalid STEAM_COOKIE")?,
            );
        }
        let http = Client::builder()
            .default_headers(headers)
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            session_id: cfg.session_id.clone(),
        })
    }
}

/// Merge the configured cookie string with the `sessionid` cookie the trade pages expect.
fn session_cookie(cookie: Option<&str>, session_id: Option<&str>) -> Option<String> {
    let cookie = cookie.map(str::trim).filter(|c| !c.is_empty());
    match (cookie, session_id) {
        (Some(c), Some(sid)) if !c.contains("sessionid=") => Some(format!("{c}; sessionid={sid}")),
        (Some(c), _) => Some(c.to_string()),
        (None, Some(sid)) => Some(format!("sessionid={sid}")),
        (None, None) => None,
    }
}

#[async_trait]
impl WebFetch for CommunityClient {
    async fn fetch(&self, url: &str, method: Method) -> Result<String> {
        let resp = self
            .http
            .request(method, url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("http {} from {url}", status.as_u16()));
        }
        resp.text()
            .await
            .with_context(|| format!("failed to read body from {url}"))
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &InventoryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            delay: cfg.retry_delay,
        }
    }
}

/// Wraps a [`WebFetch`] with a fixed attempt budget and a fixed pause between attempts.
///
/// Never fails: once the budget is spent the caller gets an empty body and is
/// expected to treat it as "not available".
#[derive(Clone)]
pub struct RetryingTransport {
    inner: Arc<dyn WebFetch>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn WebFetch>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.session_id()
    }

    pub async fn fetch(&self, url: &str) -> String {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.inner.fetch(url, Method::GET).await {
                Ok(body) => {
                    debug!(url, attempt, body_len = body.len(), "fetched");
                    return body;
                }
                Err(e) => warn!(url, attempt, max_attempts, error = ?e, "web request failed"),
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
        error!(url, max_attempts, "web request retries exhausted; returning empty body");
        String::new()
    }
}
