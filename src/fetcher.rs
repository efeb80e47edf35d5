//! Page fetching strategies.
//!
//! Plain HTTP via reqwest, a WebDriver-driven headless browser via fantoccini, and
//! a fallback combinator that retries blocked fetches with a second strategy.

use crate::config::FetchConfig;
use async_trait::async_trait;
use fantoccini::ClientBuilder;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to reach {url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("{url} responded with HTTP {code}")]
    HttpStatus { url: String, code: u16 },
    #[error("browser fetch of {url} failed: {reason}")]
    Browser { url: String, reason: String },
}

impl FetchError {
    /// HTTP status of the upstream response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Retrieves the raw HTML of a page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Strategy name, for logs
    fn name(&self) -> &str;
}

/// Turn a website as submitted by a client into an absolute http(s) URL.
///
/// Bare hosts such as `example.com` are fetched over https.
pub fn website_url(website: &str) -> Result<Url, url::ParseError> {
    let website = website.trim();
    let url = match Url::parse(website) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{website}"))?,
        Err(e) => return Err(e),
    };

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(url::ParseError::EmptyHost),
    }
}

/// Plain HTTP GET with a browser-like User-Agent.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Fetches through a WebDriver session so script-rendered or bot-guarded pages load.
pub struct BrowserFetcher {
    webdriver_url: String,
}

impl BrowserFetcher {
    pub fn new(webdriver_url: impl Into<String>) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
        }
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let browser_err = |reason: String| FetchError::Browser {
            url: url.to_string(),
            reason,
        };

        let client = ClientBuilder::native()
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| browser_err(format!("webdriver at {}: {}", self.webdriver_url, e)))?;

        let source = match client.goto(url).await {
            Ok(()) => client.source().await.map_err(|e| browser_err(e.to_string())),
            Err(e) => Err(browser_err(e.to_string())),
        };

        if let Err(e) = client.close().await {
            tracing::debug!("Failed to close WebDriver session: {}", e);
        }

        source
    }

    fn name(&self) -> &str {
        "browser"
    }
}

/// Decides when a primary fetch result should be retried with the fallback strategy.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    /// Upstream statuses that indicate blocking
    pub statuses: Vec<u16>,
    /// Treat a blank body as blocked
    pub on_empty_body: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            statuses: vec![StatusCode::FORBIDDEN.as_u16()],
            on_empty_body: true,
        }
    }
}

impl FallbackPolicy {
    fn should_fall_back(&self, result: &Result<String, FetchError>) -> bool {
        match result {
            Ok(body) => self.on_empty_body && body.trim().is_empty(),
            Err(e) => e.status().is_some_and(|code| self.statuses.contains(&code)),
        }
    }
}

/// Tries `primary` and, when the policy says the page was blocked, `secondary`.
pub struct FallbackFetcher {
    primary: Box<dyn Fetcher>,
    secondary: Box<dyn Fetcher>,
    policy: FallbackPolicy,
}

impl FallbackFetcher {
    pub fn new(primary: Box<dyn Fetcher>, secondary: Box<dyn Fetcher>) -> Self {
        Self {
            primary,
            secondary,
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Fetcher for FallbackFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let result = self.primary.fetch(url).await;
        if !self.policy.should_fall_back(&result) {
            return result;
        }

        match &result {
            Ok(_) => tracing::info!(
                "{} fetch of {} returned an empty body, retrying with {}",
                self.primary.name(),
                url,
                self.secondary.name()
            ),
            Err(e) => tracing::info!(
                "{} fetch blocked ({}), retrying with {}",
                self.primary.name(),
                e,
                self.secondary.name()
            ),
        }

        self.secondary.fetch(url).await
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

/// Build the fetch strategy described by the configuration.
pub fn from_config(config: &FetchConfig) -> Result<Box<dyn Fetcher>, reqwest::Error> {
    let http = Box::new(HttpFetcher::new(config)?);

    match (&config.webdriver_url, config.browser_fallback) {
        (Some(webdriver_url), true) => {
            tracing::info!("Browser fallback enabled via WebDriver at {}", webdriver_url);
            Ok(Box::new(FallbackFetcher::new(
                http,
                Box::new(BrowserFetcher::new(webdriver_url.clone())),
            )))
        }
        _ => Ok(http),
    }
}
