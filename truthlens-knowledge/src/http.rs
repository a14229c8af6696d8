//! Shared HTTP plumbing for knowledge source requests.
//!
//! Provides a configured [`reqwest::Client`] and [`RequestGate`], the
//! per-upstream throttle every adapter holds for the duration of each
//! outbound call.

use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::error::KnowledgeError;

/// Build a [`reqwest::Client`] for knowledge source APIs.
///
/// The client has:
/// - The given timeout (an upper bound; the manager usually cancels first)
/// - An identifying User-Agent
/// - Brotli and gzip decompression
///
/// # Errors
///
/// Returns [`KnowledgeError::Http`] if the client cannot be constructed.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, KnowledgeError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| KnowledgeError::Http(format!("failed to build HTTP client: {e}")))
}

/// Serialises calls to one upstream and spaces them by a minimum interval.
///
/// Callers hold the returned [`GatePass`] for the whole request, so
/// concurrent searches against the same provider instance queue behind
/// each other instead of racing past the delay.
#[derive(Debug)]
pub struct RequestGate {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    jitter_ms: (u64, u64),
}

/// Exclusive right to issue one request through a [`RequestGate`].
#[derive(Debug)]
pub struct GatePass<'a> {
    _guard: MutexGuard<'a, Option<Instant>>,
}

impl RequestGate {
    /// Create a gate enforcing `min_interval` between request starts.
    pub fn new(min_interval: Duration) -> Self {
        Self::with_jitter(min_interval, (0, 0))
    }

    /// Create a gate with a random extra delay in `jitter_ms` (min, max).
    pub fn with_jitter(min_interval: Duration, jitter_ms: (u64, u64)) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
            jitter_ms,
        }
    }

    /// The configured minimum interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for our turn and for the interval to elapse.
    pub async fn acquire(&self) -> GatePass<'_> {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let wait_until = last_time + self.min_interval + self.jitter();
            let now = Instant::now();
            if wait_until > now {
                tracing::trace!(wait_ms = (wait_until - now).as_millis() as u64, "request gate waiting");
                tokio::time::sleep_until(wait_until).await;
            }
        }

        *last = Some(Instant::now());
        GatePass { _guard: last }
    }

    fn jitter(&self) -> Duration {
        let (min, max) = self.jitter_ms;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Send a GET request and decode a JSON body, mapping failures to
/// [`KnowledgeError`] with the upstream label in the message.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    request: reqwest::RequestBuilder,
    upstream: &str,
) -> Result<T, KnowledgeError> {
    request
        .send()
        .await
        .map_err(|e| KnowledgeError::Http(format!("{upstream} request failed: {}", redact(e))))?
        .error_for_status()
        .map_err(|e| KnowledgeError::Http(format!("{upstream} HTTP error: {}", redact(e))))?
        .json::<T>()
        .await
        .map_err(|e| KnowledgeError::Parse(format!("{upstream} response decode failed: {}", redact(e))))
}

/// Send a GET request and return the body as text.
pub async fn get_text(request: reqwest::RequestBuilder, upstream: &str) -> Result<String, KnowledgeError> {
    request
        .send()
        .await
        .map_err(|e| KnowledgeError::Http(format!("{upstream} request failed: {}", redact(e))))?
        .error_for_status()
        .map_err(|e| KnowledgeError::Http(format!("{upstream} HTTP error: {}", redact(e))))?
        .text()
        .await
        .map_err(|e| KnowledgeError::Http(format!("{upstream} response read failed: {}", redact(e))))
}

/// Request URLs can carry API keys in the query string.
fn redact(err: reqwest::Error) -> String {
    err.without_url().to_string()
}
