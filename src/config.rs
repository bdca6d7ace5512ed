//! Environment-driven configuration. Every knob has a default so the
//! server starts with no environment at all; `.env` values are loaded by
//! the binary before this runs.

use std::env;
use std::time::Duration;

/// Items per page requested from the upstream channel
const DEFAULT_PAGE_SIZE: u32 = 30;
/// Collection size used when the upstream count is missing or zero
const DEFAULT_FALLBACK_CONTENTS_COUNT: u64 = 46;

#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_base_url: String,
    pub channel_slug: String,
    pub page_size: u32,
    pub cache_window_secs: u64,
    pub cache_sweep_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_max_attempts: u32,
    pub fetch_retry_base_delay_ms: u64,
    pub fallback_contents_count: u64,
    pub fallback_channel_title: String,
    pub metadata_refresh_interval_secs: u64,
    pub listen_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            upstream_base_url: env::var("ARENA_BASE_URL")
                .unwrap_or_else(|_| "https://api.are.na/v2".to_string()),
            channel_slug: env::var("ARENA_CHANNEL_SLUG")
                .unwrap_or_else(|_| "found-fonts-foundry".to_string()),
            page_size: env::var("GALLERY_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            cache_window_secs: env::var("CACHE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(600),
            cache_sweep_interval_secs: env::var("CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12),
            fetch_max_attempts: env::var("FETCH_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            fetch_retry_base_delay_ms: env::var("FETCH_RETRY_BASE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            fallback_contents_count: env::var("FALLBACK_CONTENTS_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FALLBACK_CONTENTS_COUNT),
            fallback_channel_title: env::var("FALLBACK_CHANNEL_TITLE")
                .unwrap_or_else(|_| "Found Fonts Foundry".to_string()),
            metadata_refresh_interval_secs: env::var("METADATA_REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_base_delay_ms)
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.upstream_base_url.is_empty() {
            log::error!("ARENA_BASE_URL cannot be empty.");
        }
        if self.channel_slug.is_empty() {
            log::error!("ARENA_CHANNEL_SLUG cannot be empty.");
        }
        if self.page_size == 0 {
            log::warn!("GALLERY_PAGE_SIZE is 0; upstream pagination will misbehave.");
        }
        if self.fetch_max_attempts == 0 {
            log::warn!("FETCH_MAX_ATTEMPTS is 0; every fetch will fail without trying.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_cover_every_field() {
        let config = Config::from_env();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.fallback_contents_count, DEFAULT_FALLBACK_CONTENTS_COUNT);
        assert_eq!(config.cache_window(), Duration::from_secs(600));
        assert_eq!(config.fetch_max_attempts, 3);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(1000));
    }
}
