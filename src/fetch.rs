//! Problem page download.
//!
//! Every attempt waits a jittered delay first and goes out under a rotated
//! browser identity. Failed attempts are followed by a flat cooldown; there
//! is no exponential backoff. A 404 ends the loop immediately since the
//! problem will not appear on a retry.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_ORIGIN: &str = "https://www.acmicpc.net";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);
pub const DEFAULT_DELAY_WINDOW_MS: RangeInclusive<u64> = 500..=1500;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:136.0) Gecko/20100101 Firefox/136.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36 Edg/134.0.0.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 18_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.3 Mobile/15E148 Safari/604.1",
];

// ── Error types ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid problem identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("problem {0} does not exist")]
    NotFound(String),
    #[error("gave up on problem {identifier} after {attempts} attempts: {last_error}")]
    Exhausted {
        identifier: String,
        attempts: u32,
        last_error: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Why [`RetryFetcher::fetch`] returned without a body.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Failed(#[from] FetchError),
    #[error("fetch cancelled")]
    Cancelled,
}

/// A single failed attempt.
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("problem page not found")]
    NotFound,
    #[error("unacceptable status {0}")]
    Status(StatusCode),
    #[error("empty response body")]
    EmptyBody,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

// ── Request identity ─────────────────────────────────────────────────────────

/// What one attempt looks like from the server's side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_agent: String,
    /// Wait before the request is sent.
    pub delay: Duration,
}

/// Picks the identity for each attempt.
pub trait RequestIdentityProvider: Send + Sync {
    fn next_identity(&self) -> RequestIdentity;
}

/// Random user agent from a pool of common browsers and a uniformly
/// distributed delay.
#[derive(Debug, Clone)]
pub struct RotatingIdentity {
    delay_window_ms: RangeInclusive<u64>,
}

impl RotatingIdentity {
    pub fn new() -> Self {
        Self {
            delay_window_ms: DEFAULT_DELAY_WINDOW_MS,
        }
    }

    pub fn with_delay_window(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            delay_window_ms: min.as_millis() as u64..=max.as_millis() as u64,
        }
    }
}

impl Default for RotatingIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdentityProvider for RotatingIdentity {
    fn next_identity(&self) -> RequestIdentity {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let delay_ms = rng.gen_range(self.delay_window_ms.clone());
        RequestIdentity {
            user_agent: user_agent.to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Same identity and delay for every attempt.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub RequestIdentity);

impl RequestIdentityProvider for FixedIdentity {
    fn next_identity(&self) -> RequestIdentity {
        self.0.clone()
    }
}

// ── Failure notification ─────────────────────────────────────────────────────

/// Receives the one-shot notice emitted when all attempts are used up.
pub trait FailureNotifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl FailureNotifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::error!(notice = message, "problem fetch failed");
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Target origin; pages live at `{origin}/problem/{identifier}`. Also the
    /// base for rewriting relative image sources.
    pub origin: Url,
    pub max_attempts: u32,
    /// Flat wait after a failed attempt.
    pub cooldown: Duration,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl FetchConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
        }
    }
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

pub struct RetryFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    identity: Arc<dyn RequestIdentityProvider>,
    notifier: Arc<dyn FailureNotifier>,
}

impl RetryFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        if let Ok(referer) = HeaderValue::from_str(config.origin.as_str()) {
            headers.insert(header::REFERER, referer);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        let mut builder = reqwest::ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(headers);

        if config.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            config,
            identity: Arc::new(RotatingIdentity::new()),
            notifier: Arc::new(LogNotifier),
        })
    }

    pub fn with_identity(mut self, identity: Arc<dyn RequestIdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn origin(&self) -> &Url {
        &self.config.origin
    }

    /// `{origin}/problem/{identifier}`, with the identifier as one encoded
    /// path segment.
    pub fn problem_url(&self, identifier: &str) -> Result<Url, FetchError> {
        // `.` and `..` would be collapsed by the URL path rules.
        if matches!(identifier.trim(), "" | "." | "..") {
            return Err(FetchError::InvalidIdentifier(identifier.to_string()));
        }
        let mut url = self.config.origin.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidIdentifier(identifier.to_string()))?
            .pop_if_empty()
            .push("problem")
            .push(identifier);
        Ok(url)
    }

    /// Download the problem page, retrying until `max_attempts` is used up.
    ///
    /// Cancelling `cancel` interrupts the pre-request delay, the cooldown,
    /// or the request in flight.
    pub async fn fetch(
        &self,
        identifier: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchFailure> {
        let url = self.problem_url(identifier)?;
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let identity = self.identity.next_identity();
            debug!(
                identifier,
                attempt,
                delay_ms = identity.delay.as_millis() as u64,
                "waiting before request"
            );
            pause(cancel, identity.delay).await?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchFailure::Cancelled),
                outcome = self.attempt(&url, &identity) => outcome,
            };

            match outcome {
                Ok(body) => {
                    info!(identifier, attempt, bytes = body.len(), "fetched problem page");
                    return Ok(body);
                }
                Err(AttemptError::NotFound) => {
                    warn!(identifier, attempt, "problem page not found");
                    return Err(FetchError::NotFound(identifier.to_string()).into());
                }
                Err(err) => {
                    warn!(identifier, attempt, error = %err, "problem fetch attempt failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        pause(cancel, self.config.cooldown).await?;
                    }
                }
            }
        }

        self.notifier.notify(&format!(
            "Could not load problem {identifier} after {attempts} attempts."
        ));
        Err(FetchError::Exhausted {
            identifier: identifier.to_string(),
            attempts,
            last_error,
        }
        .into())
    }

    async fn attempt(&self, url: &Url, identity: &RequestIdentity) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, identity.user_agent.as_str())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AttemptError::NotFound);
        }
        if status.as_u16() >= 400 {
            return Err(AttemptError::Status(status));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(AttemptError::EmptyBody);
        }
        Ok(body.to_vec())
    }
}

async fn pause(cancel: &CancellationToken, duration: Duration) -> Result<(), FetchFailure> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
