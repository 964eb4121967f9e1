//! Cache entries and the handles consumers hold on to them.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use url::Url;

use super::fragment::{Fragment, Fragments};
use super::validity::{Freshness, ReloadMode};

/// Registry-unique handle for an entry.
///
/// Ids are never reused by a registry, so a handle that outlived its entry
/// simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntryId(pub(crate) u64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

/// Opaque protocol metadata copied in by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryMetadata {
    /// Raw response header block.
    pub head: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    /// Transfer security summary (protocol, cipher).
    pub ssl_info: Option<String>,
}

/// Validators for a conditional re-fetch of a stale entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionalRequest {
    /// Sent as `If-None-Match`.
    pub etag: Option<String>,
    /// Sent as `If-Modified-Since`.
    pub last_modified: Option<String>,
}

/// A cached resource: metadata plus whatever fragments have arrived.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) id: EntryId,
    pub(crate) key: Url,
    pub(crate) proxy_key: Url,
    pub(crate) redirect_target: Option<Url>,
    pub(crate) redirect_get: bool,
    pub(crate) fragments: Fragments,
    pub(crate) expected_length: Option<u64>,
    pub(crate) actual_size: u64,
    pub(crate) incomplete: bool,
    pub(crate) valid: bool,
    pub(crate) cache_id: u64,
    pub(crate) last_access_time: DateTime<Utc>,
    pub(crate) access_seq: u64,
    pub(crate) max_age: Option<Duration>,
    pub(crate) honor_expiry: bool,
    pub(crate) reload_policy: ReloadMode,
    pub(crate) reference_count: u32,
    pub(crate) gc_mark: bool,
    pub(crate) metadata: EntryMetadata,
}

impl CacheEntry {
    pub(crate) fn new(id: EntryId, key: Url, cache_id: u64, now: DateTime<Utc>, access_seq: u64) -> Self {
        Self {
            id,
            proxy_key: key.clone(),
            key,
            redirect_target: None,
            redirect_get: false,
            fragments: Fragments::default(),
            expected_length: None,
            actual_size: 0,
            incomplete: true,
            valid: true,
            cache_id,
            last_access_time: now,
            access_seq,
            max_age: None,
            honor_expiry: false,
            reload_policy: ReloadMode::default(),
            reference_count: 0,
            gc_mark: false,
            metadata: EntryMetadata::default(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn key(&self) -> &Url {
        &self.key
    }

    /// URI the transfer actually used; equals `key` unless a proxy rewrote it.
    pub fn proxy_key(&self) -> &Url {
        &self.proxy_key
    }

    pub fn redirect_target(&self) -> Option<&Url> {
        self.redirect_target.as_ref()
    }

    /// Whether the redirect must be followed with GET whatever the original method.
    pub fn redirect_get(&self) -> bool {
        self.redirect_get
    }

    pub fn fragments(&self) -> &Fragments {
        &self.fragments
    }

    pub fn expected_length(&self) -> Option<u64> {
        self.expected_length
    }

    pub fn actual_size(&self) -> u64 {
        self.actual_size
    }

    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn cache_id(&self) -> u64 {
        self.cache_id
    }

    pub fn last_access_time(&self) -> DateTime<Utc> {
        self.last_access_time
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn honors_expiry(&self) -> bool {
        self.honor_expiry
    }

    pub fn reload_policy(&self) -> ReloadMode {
        self.reload_policy
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    pub fn is_used(&self) -> bool {
        self.reference_count > 0
    }

    pub fn gc_mark(&self) -> bool {
        self.gc_mark
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// The whole body, if it is already held as a single fragment from offset 0.
    ///
    /// Use `Registry::get_cache_fragment` to coalesce first.
    pub fn contiguous(&self) -> Option<&Fragment> {
        let mut iter = self.fragments.iter();
        match (iter.next(), iter.next()) {
            (Some(only), None) if only.offset() == 0 => Some(only),
            _ => None,
        }
    }

    pub fn conditional_request(&self) -> Option<ConditionalRequest> {
        let etag = self.metadata.etag.clone();
        let last_modified = self.metadata.last_modified.clone();
        if etag.is_none() && last_modified.is_none() {
            return None;
        }
        Some(ConditionalRequest { etag, last_modified })
    }

    pub(crate) fn freshness(&self, ignore_cache_control: bool) -> Freshness<'_> {
        Freshness {
            last_access_time: self.last_access_time,
            max_age: self.max_age,
            honor_expiry: self.honor_expiry && !ignore_cache_control,
            etag: self.metadata.etag.as_deref(),
            last_modified: self.metadata.last_modified.as_deref(),
        }
    }

    pub(crate) fn sync_size(&mut self) {
        self.actual_size = self.fragments.total_len();
    }
}
