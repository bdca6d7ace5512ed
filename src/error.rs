//! Typed error taxonomy for upstream fetches, plus the retry policy the
//! fetch client runs on top of it.

use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone, Error)]
pub enum GalleryError {
    /// Request timed out before the upstream answered
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    /// Request never reached the upstream server
    #[error("No connectivity: {0}")]
    NoConnectivity(String),

    /// Upstream answered with a non-2xx status (5xx and other non-404s)
    #[error("Upstream server error (status {status}): {message}")]
    UpstreamServer { status: u16, message: String },

    /// Upstream answered 404 for the requested resource
    #[error("Upstream resource not found: {0}")]
    UpstreamNotFound(String),

    /// 2xx response missing the fields we rely on
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Configuration errors
    #[error("Config Error: {0}")]
    Config(String),
}

impl GalleryError {
    /// Classify a transport-level reqwest failure. Status-code handling
    /// happens in the client, which sees the response before the body.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GalleryError::NetworkTimeout(err.to_string())
        } else if err.is_decode() {
            GalleryError::MalformedResponse(err.to_string())
        } else {
            // Connect errors and everything else that never produced a
            // response count as connectivity failures.
            GalleryError::NoConnectivity(err.to_string())
        }
    }

    /// Determines if an error is worth another attempt within the retry budget
    pub fn is_retryable(&self) -> bool {
        match self {
            GalleryError::NetworkTimeout(_) => true,
            GalleryError::NoConnectivity(_) => true,
            GalleryError::UpstreamServer { status, .. } => *status >= 500,
            GalleryError::UpstreamNotFound(_) => false,
            GalleryError::MalformedResponse(_) => false,
            GalleryError::Config(_) => false,
        }
    }

    /// The inline string the rendering layer shows in place of content
    pub fn user_message(&self) -> &'static str {
        match self {
            GalleryError::NetworkTimeout(_) => "Request timed out, please try again",
            GalleryError::NoConnectivity(_) => "Check your connection.",
            GalleryError::UpstreamServer { .. } => "Internal server error, try again later",
            GalleryError::UpstreamNotFound(_) => "Content not found.",
            GalleryError::MalformedResponse(_) => "Unexpected response from upstream, try again later",
            GalleryError::Config(_) => "Internal server error, try again later",
        }
    }
}

/// Retry policy with a growing per-attempt delay
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before a given attempt (the first attempt is attempt 0 and
    /// runs immediately; attempt n waits base_delay * n).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        self.base_delay * attempt
    }

    /// Execute operation with retry logic, stopping early on errors that
    /// retrying cannot fix. Raises the most recent error once the budget
    /// is exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.delay_for_attempt(attempt);
                debug!("Retry attempt {}: delay = {:?}", attempt, delay);
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Fetch succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        warn!("Non-retryable error on attempt {}: {}", attempt + 1, e);
                        return Err(e);
                    }
                    warn!("Attempt {} failed: {} (retrying...)", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GalleryError::NoConnectivity("retry budget exhausted".to_string())))
    }
}

pub type Result<T> = std::result::Result<T, GalleryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(0));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let attempts = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(GalleryError::UpstreamNotFound("gone".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(GalleryError::UpstreamNotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_and_raises_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let attempts = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(GalleryError::NetworkTimeout("slow".to_string())) }
            })
            .await;
        assert!(matches!(result, Err(GalleryError::NetworkTimeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn user_messages_match_categories() {
        assert_eq!(
            GalleryError::NetworkTimeout(String::new()).user_message(),
            "Request timed out, please try again"
        );
        assert_eq!(
            GalleryError::UpstreamServer {
                status: 503,
                message: String::new()
            }
            .user_message(),
            "Internal server error, try again later"
        );
        assert_eq!(
            GalleryError::UpstreamNotFound(String::new()).user_message(),
            "Content not found."
        );
        assert_eq!(
            GalleryError::NoConnectivity(String::new()).user_message(),
            "Check your connection."
        );
    }
}
