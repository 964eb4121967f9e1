//! HTTP fetch pipeline feeding the resource cache.
//!
//! ### Cache interaction
//! - Lookups go through the registry's reload-mode check first.
//! - Stale entries with an ETag or Last-Modified get a conditional request;
//!   a `304` keeps the existing entry.
//! - Redirects are not followed by the HTTP client. They are recorded on the
//!   entry and followed through the cache, bounded by `max_redirects`.
//! - Bodies are streamed chunk by chunk into the entry's fragment list.
//! - A partial collection pass runs after each transfer when one is due.

pub mod headers;
pub mod transfer;
pub mod url;

use chrono::Utc;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

use rescache_core::{CacheConfig, EntryId, Error, Registry, ReloadMode};

pub use transfer::Transfer;
pub use url::{UrlError, canonicalize};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "rescache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for FetchConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// What a single fetch did to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the cache without touching the network.
    Cached(EntryId),
    /// A fresh body was downloaded into a new entry.
    Stored(EntryId),
    /// The server confirmed the cached entry is current.
    NotModified(EntryId),
    /// The response was a redirect, recorded on the entry.
    Redirected { entry: EntryId, target: ::url::Url },
}

impl FetchOutcome {
    pub fn entry(&self) -> EntryId {
        match self {
            FetchOutcome::Cached(id) | FetchOutcome::Stored(id) | FetchOutcome::NotModified(id) => *id,
            FetchOutcome::Redirected { entry, .. } => *entry,
        }
    }
}

/// HTTP client that stores what it fetches in a registry.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Perform at most one transfer for `url` under the given reload mode.
    pub async fn fetch(&self, registry: &mut Registry, url: &::url::Url, mode: ReloadMode) -> Result<FetchOutcome, Error> {
        if let Some(id) = registry.get_validated_cache_entry(url, mode) {
            return Ok(FetchOutcome::Cached(id));
        }

        let start = Instant::now();
        // Force reloads skip revalidation and always download a fresh body.
        let cached = if mode < ReloadMode::ForceReload { registry.find_in_cache(url) } else { None };
        let conditional = cached.and_then(|id| registry.conditional_request(id));

        let mut request = self.http.get(url.as_str());
        if let Some(cond) = &conditional {
            if let Some(etag) = cond.etag.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(since) = cond.last_modified.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                request = request.header(header::IF_MODIFIED_SINCE, since);
            }
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("network error: {}", e)))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            let id = cached.ok_or_else(|| Error::HttpError("304 for an uncached resource".into()))?;
            transfer::refresh_expiry(registry, id, response.headers())?;
            registry.get_validated_cache_entry(url, ReloadMode::Always);
            tracing::debug!("{} not modified", url);
            self.tick(registry);
            return Ok(FetchOutcome::NotModified(id));
        }

        if status.is_redirection()
            && let Some(location) = response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok())
        {
            let (entry, target) = Transfer::redirect(registry, url, status, response.headers(), location)?;
            tracing::debug!("{} redirects to {}", url, target);
            self.tick(registry);
            return Ok(FetchOutcome::Redirected { entry, target });
        }

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let mut transfer = Transfer::begin(registry, url, status, response.headers(), self.config.max_bytes)?;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if let Err(e) = transfer.write(registry, &chunk) {
                        transfer.abort(registry);
                        return Err(e);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    transfer.abort(registry);
                    return Err(Error::Network(format!("failed to read response: {}", e)));
                }
            }
        }

        let received = transfer.received();
        let id = transfer.finish(registry)?;

        tracing::debug!("fetched {} in {}ms ({} bytes)", url, start.elapsed().as_millis(), received);

        self.tick(registry);
        Ok(FetchOutcome::Stored(id))
    }

    /// Fetch `url` and follow its redirect chain, through the cache where possible.
    pub async fn load(&self, registry: &mut Registry, url: &::url::Url, mode: ReloadMode) -> Result<EntryId, Error> {
        let mut current = url.clone();

        for _ in 0..=self.config.max_redirects {
            let id = self.fetch(registry, &current, mode).await?.entry();
            match registry.entry(id).and_then(|e| e.redirect_target()).cloned() {
                Some(target) => current = target,
                None => return Ok(id),
            }
        }

        Err(Error::TooManyRedirects(format!("{} after {} hops", url, self.config.max_redirects)))
    }

    fn tick(&self, registry: &mut Registry) {
        if let Some(report) = registry.collect_if_due(Utc::now()) {
            tracing::trace!(freed = report.freed_entries, remaining = report.remaining_size, "periodic collection");
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
