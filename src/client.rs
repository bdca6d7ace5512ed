//! Remote fetch client: cache-aware HTTP GET with bounded retries, plus
//! the typed Are.na channel client the coordinator talks to.

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{GalleryError, Result, RetryPolicy};
use crate::models::{ChannelContentsDto, ChannelInfoDto, ChannelMetadata, ContentPage};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("found-fonts-foundry/", env!("CARGO_PKG_VERSION"));

/// How a payload was obtained, mirrored into the proxy's `X-Cache` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
    Fallback,
}

impl CacheStatus {
    pub fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
            CacheStatus::Fallback => "FALLBACK",
        }
    }
}

/// A fetched payload annotated with its cache provenance
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub payload: Value,
    pub cache_status: CacheStatus,
    /// Age of the served cache entry; `None` for freshly fetched data
    pub age: Option<Duration>,
}

/// HTTP GET with per-attempt timeout, retry budget, and the shared
/// response cache in front of the network.
pub struct FetchClient {
    http: reqwest::Client,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(cache: Arc<ResponseCache>, config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GalleryError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            cache,
            retry: RetryPolicy::new(config.fetch_max_attempts, config.retry_base_delay()),
        })
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Fetch a JSON payload through the cache.
    ///
    /// `force_refresh` skips the cache read but still writes the fresh
    /// result back. When every attempt fails and any entry exists for the
    /// URL (fresh or not), the entry is served annotated as stale instead
    /// of propagating the error; with no entry the error propagates.
    pub async fn fetch_json(&self, url: &str, force_refresh: bool) -> Result<FetchOutcome> {
        let now = Instant::now();
        if !force_refresh {
            if let Some(entry) = self.cache.get(url) {
                if self.cache.is_fresh(&entry, now) {
                    self.cache.record_hit();
                    debug!("Cache HIT for {}", url);
                    return Ok(FetchOutcome {
                        age: Some(entry.age(now)),
                        payload: entry.payload,
                        cache_status: CacheStatus::Hit,
                    });
                }
            }
        }

        match self.retry.execute(|| self.get_once(url)).await {
            Ok(payload) => {
                self.cache.put(url, payload.clone());
                self.cache.record_miss();
                debug!("Cache MISS for {}, stored fresh payload", url);
                Ok(FetchOutcome {
                    payload,
                    cache_status: CacheStatus::Miss,
                    age: None,
                })
            }
            Err(err) => {
                if let Some(entry) = self.cache.get(url) {
                    self.cache.record_stale_serve();
                    warn!(
                        "Upstream fetch failed for {} ({}); serving stale cache entry",
                        url, err
                    );
                    return Ok(FetchOutcome {
                        age: Some(entry.age(Instant::now())),
                        payload: entry.payload,
                        cache_status: CacheStatus::Stale,
                    });
                }
                Err(err)
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(GalleryError::from_transport)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GalleryError::UpstreamNotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(GalleryError::UpstreamServer {
                status: status.as_u16(),
                message: format!("GET {}", url),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| GalleryError::MalformedResponse(e.to_string()))
    }
}

/// The seam between the coordinator and the network. Production uses
/// [`ArenaClient`]; tests substitute a scripted implementation.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn channel_metadata(&self, force_refresh: bool) -> Result<ChannelMetadata>;
    async fn content_page(&self, page: u32) -> Result<ContentPage>;
}

/// Are.na v2 channel client
pub struct ArenaClient {
    fetch: Arc<FetchClient>,
    base_url: String,
    channel_slug: String,
    page_size: u32,
    fallback_contents_count: u64,
    fallback_channel_title: String,
}

impl ArenaClient {
    pub fn new(fetch: Arc<FetchClient>, config: &Config) -> Self {
        Self {
            fetch,
            base_url: config.upstream_base_url.trim_end_matches('/').to_string(),
            channel_slug: config.channel_slug.clone(),
            page_size: config.page_size,
            fallback_contents_count: config.fallback_contents_count,
            fallback_channel_title: config.fallback_channel_title.clone(),
        }
    }

    pub fn channel_info_url(&self) -> String {
        format!("{}/channels/{}", self.base_url, self.channel_slug)
    }

    pub fn contents_url(&self, page: u32) -> String {
        format!(
            "{}/channels/{}/contents?page={}&per={}&sort=position&direction=desc",
            self.base_url, self.channel_slug, page, self.page_size
        )
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

#[async_trait]
impl ContentFetcher for ArenaClient {
    async fn channel_metadata(&self, force_refresh: bool) -> Result<ChannelMetadata> {
        let outcome = self
            .fetch
            .fetch_json(&self.channel_info_url(), force_refresh)
            .await?;
        let dto: ChannelInfoDto = serde_json::from_value(outcome.payload)
            .map_err(|e| GalleryError::MalformedResponse(format!("channel info: {}", e)))?;
        Ok(ChannelMetadata::from_dto(
            dto,
            self.fallback_contents_count,
            &self.fallback_channel_title,
        ))
    }

    async fn content_page(&self, page: u32) -> Result<ContentPage> {
        let outcome = self.fetch.fetch_json(&self.contents_url(page), false).await?;
        let dto: ChannelContentsDto = serde_json::from_value(outcome.payload)
            .map_err(|e| GalleryError::MalformedResponse(format!("channel contents: {}", e)))?;
        // An envelope without a contents array is malformed; an empty
        // array is a valid page past the end of the channel.
        if dto.contents.is_none() {
            return Err(GalleryError::MalformedResponse(format!(
                "page {} response missing contents",
                page
            )));
        }
        Ok(ContentPage::from_dto(dto, page, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        let mut config = Config::from_env();
        config.upstream_base_url = "https://api.are.na/v2/".to_string();
        config.channel_slug = "found-fonts-foundry".to_string();
        config.page_size = 30;
        config
    }

    fn arena_client() -> ArenaClient {
        let config = test_config();
        let cache = Arc::new(ResponseCache::new(config.cache_window()));
        let fetch = Arc::new(FetchClient::new(cache, &config).unwrap());
        ArenaClient::new(fetch, &config)
    }

    #[test]
    fn urls_match_the_upstream_surface() {
        let client = arena_client();
        assert_eq!(
            client.channel_info_url(),
            "https://api.are.na/v2/channels/found-fonts-foundry"
        );
        assert_eq!(
            client.contents_url(2),
            "https://api.are.na/v2/channels/found-fonts-foundry/contents?page=2&per=30&sort=position&direction=desc"
        );
    }

    #[test]
    fn cache_status_header_values() {
        assert_eq!(CacheStatus::Hit.as_header_value(), "HIT");
        assert_eq!(CacheStatus::Miss.as_header_value(), "MISS");
        assert_eq!(CacheStatus::Stale.as_header_value(), "STALE");
        assert_eq!(CacheStatus::Fallback.as_header_value(), "FALLBACK");
    }
}
