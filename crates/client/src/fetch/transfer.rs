//! The network-free half of a download: applying a response to the registry.

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap};
use rescache_core::cache::FragmentWrite;
use rescache_core::cache::uri::{cache_key, resolve};
use rescache_core::{EntryId, Error, Registry};
use url::Url;

use super::headers::{content_length, freshness_lifetime, header_block, header_string};

/// One in-flight body being written into a fresh cache entry.
#[derive(Debug)]
pub struct Transfer {
    id: EntryId,
    offset: u64,
    expected: Option<u64>,
    limit: u64,
}

impl Transfer {
    /// Register a fresh entry for `url` and record the response metadata.
    ///
    /// Any previous entry for the key is superseded.
    pub fn begin(
        registry: &mut Registry, url: &Url, status: StatusCode, headers: &HeaderMap, limit: usize,
    ) -> Result<Self, Error> {
        let id = registry.replace_cache_entry(url)?;
        record_metadata(registry, id, status, headers)?;

        let expected = content_length(headers);
        registry.set_expected_length(id, expected)?;

        Ok(Self { id, offset: 0, expected, limit: limit as u64 })
    }

    /// Record a redirect response for `url` pointing at `location`.
    ///
    /// The location is resolved before anything is superseded, so a bad
    /// `Location` header leaves the cached entry for `url` untouched.
    pub fn redirect(
        registry: &mut Registry, url: &Url, status: StatusCode, headers: &HeaderMap, location: &str,
    ) -> Result<(EntryId, Url), Error> {
        let target = resolve(&cache_key(url), location)?;

        let id = registry.replace_cache_entry(url)?;
        record_metadata(registry, id, status, headers)?;

        match registry.redirect_cache(id, target.as_str(), Some(status == StatusCode::SEE_OTHER), Some(false)) {
            Ok(target) => Ok((id, target)),
            Err(e) => {
                if let Err(cleanup) = registry.delete_cache_entry(id) {
                    tracing::debug!(id = %id, error = %cleanup, "redirect entry kept after failure");
                }
                Err(e)
            }
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.offset
    }

    /// Append the next chunk of the body.
    pub fn write(&mut self, registry: &mut Registry, chunk: &[u8]) -> Result<FragmentWrite, Error> {
        let end = self.offset + chunk.len() as u64;
        if end > self.limit {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", end, self.limit)));
        }

        let outcome = registry.add_fragment(self.id, self.offset, chunk)?;
        self.offset = end;
        Ok(outcome)
    }

    /// Finalize the entry once the transport reports completion.
    pub fn finish(self, registry: &mut Registry) -> Result<EntryId, Error> {
        registry.normalize_cache_entry(self.id, self.expected)?;

        if let Some(entry) = registry.entry(self.id)
            && entry.is_incomplete()
        {
            tracing::warn!(
                key = %entry.key(),
                received = self.offset,
                expected = ?self.expected,
                "transfer ended short of announced length"
            );
        }
        Ok(self.id)
    }

    /// Discard the partial entry after a failed transfer.
    ///
    /// Referenced entries keep their partial content and stay incomplete.
    pub fn abort(self, registry: &mut Registry) {
        if let Err(e) = registry.delete_cache_entry(self.id) {
            tracing::debug!(id = %self.id, error = %e, "partial entry kept after aborted transfer");
        }
    }
}

fn record_metadata(registry: &mut Registry, id: EntryId, status: StatusCode, headers: &HeaderMap) -> Result<(), Error> {
    let metadata = registry.metadata_mut(id)?;
    metadata.head = Some(header_block(status, headers));
    metadata.content_type = header_string(headers, header::CONTENT_TYPE);
    metadata.etag = header_string(headers, header::ETAG);
    metadata.last_modified = header_string(headers, header::LAST_MODIFIED);

    refresh_expiry(registry, id, headers)
}

/// Apply the response's expiry headers to an entry.
pub(crate) fn refresh_expiry(registry: &mut Registry, id: EntryId, headers: &HeaderMap) -> Result<(), Error> {
    let lifetime = freshness_lifetime(headers, Utc::now());
    registry.set_expiry(id, lifetime, lifetime.is_some())
}
