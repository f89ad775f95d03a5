//! Page fetching
//!
//! This module handles every request the crawler makes for a source page:
//! - Building the HTTP client with timeouts and compression
//! - Rotating user agents and sending browser-like headers
//! - Retry with exponential backoff for rate limiting and transient failures
//! - Falling back to the browser transport once when plain HTTP gives up

use crate::config::FetchConfig;
use crate::state::{FailureKind, FetchOutcome, TransportKind};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, UPGRADE_INSECURE_REQUESTS, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Used only when the configured pool is empty, which validation rejects
const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// A way of turning a URL into page markup
///
/// Implementations never return an error: every failure is folded into a
/// [`FetchOutcome::Failure`] with a [`FailureKind`].
#[async_trait]
pub trait PageTransport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// Retry timing for the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_retry.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            pacing_min: Duration::from_millis(config.pacing_min_ms),
            pacing_max: Duration::from_millis(config.pacing_max_ms),
        }
    }

    /// Delay before the attempt after `attempt` (zero-based) failed with `kind`
    ///
    /// Rate limiting doubles per attempt; everything else waits the base delay.
    pub fn backoff(&self, kind: FailureKind, attempt: u32) -> Duration {
        match kind {
            FailureKind::RateLimited => self.backoff_base.saturating_mul(1 << attempt.min(16)),
            _ => self.backoff_base,
        }
    }

    fn pacing_delay(&self) -> Duration {
        jitter(self.pacing_min, self.pacing_max)
    }
}

/// Picks a uniformly random duration in `[min, max]`
pub(crate) fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
}

/// Picks a random user agent from the pool
pub(crate) fn pick_user_agent(pool: &[String]) -> &str {
    pool.choose(&mut rand::thread_rng())
        .map(String::as_str)
        .unwrap_or(FALLBACK_USER_AGENT)
}

/// Builds an HTTP client with the configured request timeout
///
/// The user agent is not fixed on the client; it is chosen per request.
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP transport with retry and backoff
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 200 | Return content |
/// | HTTP 403 / 429 | Retry, backoff `base * 2^attempt` |
/// | HTTP 5xx | Retry, backoff `base` |
/// | Other status | Immediate failure |
/// | Timeout | Retry, backoff `base` |
/// | Connection / body error | Retry, backoff `base` |
///
/// No backoff is slept after the final attempt.
pub struct HttpTransport {
    client: Client,
    user_agents: Vec<String>,
    accept_language: String,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self {
            client,
            user_agents: config.user_agents.clone(),
            accept_language: config.accept_language.clone(),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?, config))
    }

    /// Sends one GET request and classifies the result
    async fn attempt(&self, url: &str) -> FetchOutcome {
        let user_agent = pick_user_agent(&self.user_agents).to_string();

        // Accept-Encoding is set by reqwest so it can decode the body
        let request = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str())
            .header(UPGRADE_INSECURE_REQUESTS, "1");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status().as_u16();
        if let Some(kind) = FailureKind::from_status(status) {
            return FetchOutcome::failure(kind, format!("HTTP {}", status));
        }

        match response.text().await {
            Ok(body) => FetchOutcome::content(body, TransportKind::Http),
            Err(e) => classify_error(&e),
        }
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut last = FetchOutcome::failure(FailureKind::Network, "no attempt made");

        for attempt in 0..max_attempts {
            tokio::time::sleep(self.policy.pacing_delay()).await;

            let outcome = self.attempt(url).await;
            let kind = match &outcome {
                FetchOutcome::Content { .. } => {
                    tracing::debug!("Fetched {} on attempt {}", url, attempt + 1);
                    return outcome;
                }
                FetchOutcome::Failure { kind, detail } => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {} ({})",
                        attempt + 1,
                        max_attempts,
                        url,
                        kind,
                        detail
                    );
                    *kind
                }
            };

            if !kind.is_retryable() {
                return outcome;
            }

            if attempt + 1 < max_attempts {
                let delay = self.policy.backoff(kind, attempt);
                tracing::debug!("Backing off {:?} before retrying {}", delay, url);
                tokio::time::sleep(delay).await;
            }

            last = outcome;
        }

        tracing::warn!("Giving up on {} after {} attempts", url, max_attempts);
        last
    }
}

fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::failure(FailureKind::TransportTimeout, error.to_string())
    } else {
        FetchOutcome::failure(FailureKind::Network, error.to_string())
    }
}

/// Lightweight transport first, browser render once if that fails
pub struct FetchStrategy {
    primary: Box<dyn PageTransport>,
    fallback: Option<Box<dyn PageTransport>>,
}

impl FetchStrategy {
    pub fn new(primary: Box<dyn PageTransport>, fallback: Option<Box<dyn PageTransport>>) -> Self {
        Self { primary, fallback }
    }

    /// A strategy with no render fallback
    pub fn http_only(primary: Box<dyn PageTransport>) -> Self {
        Self::new(primary, None)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Fetches `url`, falling back to the browser transport at most once
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let outcome = self.primary.fetch(url).await;
        if outcome.is_content() {
            return outcome;
        }

        let Some(fallback) = &self.fallback else {
            tracing::warn!("No render fallback configured for {}", url);
            return outcome;
        };

        tracing::info!(
            "{} transport failed for {}, falling back to {}",
            self.primary.kind(),
            url,
            fallback.kind()
        );

        let rendered = fallback.fetch(url).await;
        if let FetchOutcome::Failure { kind, detail } = &rendered {
            tracing::warn!("Render fallback for {} failed: {} ({})", url, kind, detail);
        }
        rendered
    }
}
