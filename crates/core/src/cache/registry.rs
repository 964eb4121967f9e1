//! The entry registry: URI index, entry lifetime, and content mutation.
//!
//! Every write to an entry's content goes through here so that `cache_id`
//! is bumped consistently. `cache_id` values come from one registry-wide
//! counter, so a superseding entry never reuses a value an old holder saw.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use url::Url;

use super::entry::{CacheEntry, ConditionalRequest, EntryId, EntryMetadata};
use super::fragment::{Fragment, FragmentWrite};
use super::uri::cache_key;
use super::validity::ReloadMode;
use crate::Error;
use crate::config::CacheConfig;

/// Aggregate counters over the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: u64,
    pub entries: usize,
    pub used: usize,
    pub loading: usize,
    pub budget: u64,
}

/// Owner of every cache entry.
#[derive(Debug)]
pub struct Registry {
    pub(crate) config: CacheConfig,
    pub(crate) entries: HashMap<EntryId, CacheEntry>,
    pub(crate) index: HashMap<Url, EntryId>,
    next_entry: u64,
    id_counter: u64,
    access_counter: u64,
    pub(crate) last_gc: Option<DateTime<Utc>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Registry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            index: HashMap::new(),
            next_entry: 0,
            id_counter: 0,
            access_counter: 0,
            last_gc: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn next_cache_id(&mut self) -> u64 {
        self.id_counter += 1;
        self.id_counter
    }

    pub(crate) fn next_access(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn get_mut(&mut self, id: EntryId) -> Result<&mut CacheEntry, Error> {
        self.entries.get_mut(&id).ok_or(Error::NoSuchEntry(id))
    }

    pub fn entry(&self, id: EntryId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Look up the current valid entry for `uri`.
    pub fn find_in_cache(&self, uri: &Url) -> Option<EntryId> {
        self.index.get(&cache_key(uri)).copied()
    }

    /// Find the entry for `uri`, creating an empty one on a miss.
    pub fn get_cache_entry(&mut self, uri: &Url) -> Result<EntryId, Error> {
        if let Some(id) = self.find_in_cache(uri) {
            return Ok(id);
        }
        self.insert_entry(cache_key(uri))
    }

    /// Register a fresh entry for `uri`, superseding any existing one.
    ///
    /// The old entry is marked invalid and unindexed. It is destroyed at once
    /// when unreferenced, otherwise it lingers for its holders until collected.
    pub fn replace_cache_entry(&mut self, uri: &Url) -> Result<EntryId, Error> {
        let key = cache_key(uri);
        self.entries.try_reserve(1)?;
        self.index.try_reserve(1)?;

        if let Some(old) = self.index.remove(&key) {
            let cache_id = self.next_cache_id();
            if let Some(entry) = self.entries.get_mut(&old) {
                entry.valid = false;
                entry.cache_id = cache_id;
                tracing::debug!(key = %key, id = %old, used = entry.is_used(), "superseded cache entry");
                if !entry.is_used() {
                    self.entries.remove(&old);
                }
            }
        }

        self.insert_entry(key)
    }

    fn insert_entry(&mut self, key: Url) -> Result<EntryId, Error> {
        self.entries.try_reserve(1)?;
        self.index.try_reserve(1)?;

        self.next_entry += 1;
        let id = EntryId(self.next_entry);
        let cache_id = self.next_cache_id();
        let access = self.next_access();

        tracing::debug!(key = %key, id = %id, "new cache entry");
        self.index.insert(key.clone(), id);
        self.entries.insert(id, CacheEntry::new(id, key, cache_id, Utc::now(), access));
        Ok(id)
    }

    /// Look up `uri` and apply the reload `mode` to decide whether it may be reused.
    pub fn get_validated_cache_entry(&mut self, uri: &Url, mode: ReloadMode) -> Option<EntryId> {
        self.get_validated_cache_entry_at(uri, mode, Utc::now())
    }

    /// As [`Registry::get_validated_cache_entry`] with an explicit clock.
    pub fn get_validated_cache_entry_at(&mut self, uri: &Url, mode: ReloadMode, now: DateTime<Utc>) -> Option<EntryId> {
        if !mode.uses_cache() {
            tracing::debug!(uri = %uri, "cache bypassed");
            return None;
        }

        let id = self.find_in_cache(uri)?;
        let ignore_cache_control = self.config.ignore_cache_control;
        let access = self.next_access();
        let entry = self.entries.get_mut(&id)?;

        if !mode.permits(&entry.freshness(ignore_cache_control), now) {
            tracing::debug!(uri = %uri, mode = %mode, "cache entry rejected");
            return None;
        }

        entry.last_access_time = now;
        entry.access_seq = access;
        entry.reload_policy = mode;
        tracing::debug!(uri = %uri, mode = %mode, id = %id, "cache hit");
        Some(id)
    }

    /// Whether `id` still names a live, valid entry.
    pub fn cache_entry_is_valid(&self, id: EntryId) -> bool {
        self.entries.get(&id).is_some_and(CacheEntry::is_valid)
    }

    pub fn acquire(&mut self, id: EntryId) -> Result<u32, Error> {
        let entry = self.get_mut(id)?;
        entry.reference_count += 1;
        Ok(entry.reference_count)
    }

    pub fn release(&mut self, id: EntryId) -> Result<u32, Error> {
        let entry = self.get_mut(id)?;
        if entry.reference_count == 0 {
            tracing::warn!(id = %id, "release of an unreferenced cache entry");
            return Ok(0);
        }
        entry.reference_count -= 1;
        Ok(entry.reference_count)
    }

    /// Store `data` at `offset` in the entry's fragment list.
    pub fn add_fragment(&mut self, id: EntryId, offset: u64, data: &[u8]) -> Result<FragmentWrite, Error> {
        if data.is_empty() {
            self.get_mut(id)?;
            return Ok(FragmentWrite::Overwritten);
        }

        let cache_id = self.next_cache_id();
        let entry = self.get_mut(id)?;
        let outcome = entry.fragments.insert(offset, data)?;
        entry.sync_size();
        entry.cache_id = cache_id;

        let end = offset + data.len() as u64;
        if let Some(expected) = entry.expected_length
            && end > expected
        {
            tracing::debug!(id = %id, expected, end, "fragment extends past announced length");
            entry.expected_length = Some(end);
        }

        tracing::trace!(id = %id, offset, len = data.len(), ?outcome, size = entry.actual_size, "fragment stored");
        Ok(outcome)
    }

    /// The whole body as one fragment, or `None` while any byte is missing.
    pub fn get_cache_fragment(&mut self, id: EntryId) -> Option<&Fragment> {
        self.entries.get_mut(&id)?.fragments.defragment()
    }

    /// Drop content at or beyond `length`.
    pub fn truncate_entry(&mut self, id: EntryId, length: u64) -> Result<(), Error> {
        let cache_id = self.next_cache_id();
        let entry = self.get_mut(id)?;
        if entry.fragments.truncate(length) {
            entry.sync_size();
            entry.cache_id = cache_id;
        }
        Ok(())
    }

    /// Drop content before `offset`, for consumers that already processed it.
    pub fn free_entry_to(&mut self, id: EntryId, offset: u64) -> Result<(), Error> {
        let cache_id = self.next_cache_id();
        let entry = self.get_mut(id)?;
        if entry.fragments.free_to(offset) {
            entry.sync_size();
            entry.cache_id = cache_id;
        }
        Ok(())
    }

    /// Finish a transfer. A known length truncates any excess content.
    pub fn normalize_cache_entry(&mut self, id: EntryId, expected_length: Option<u64>) -> Result<(), Error> {
        let cache_id = self.next_cache_id();
        let entry = self.get_mut(id)?;

        match expected_length {
            Some(length) => {
                if entry.fragments.truncate(length) {
                    entry.sync_size();
                    entry.cache_id = cache_id;
                }
                entry.expected_length = Some(length);
                entry.incomplete = entry.actual_size != length;
            }
            None => {
                entry.expected_length = Some(entry.actual_size);
                entry.incomplete = false;
            }
        }

        tracing::debug!(
            id = %id,
            size = entry.actual_size,
            incomplete = entry.incomplete,
            "cache entry normalized"
        );
        Ok(())
    }

    /// Release all content but keep the entry registered.
    pub fn delete_entry_content(&mut self, id: EntryId) -> Result<(), Error> {
        let cache_id = self.next_cache_id();
        let entry = self.get_mut(id)?;
        entry.fragments.clear();
        entry.actual_size = 0;
        entry.cache_id = cache_id;
        Ok(())
    }

    /// Unregister and destroy an unreferenced entry.
    pub fn delete_cache_entry(&mut self, id: EntryId) -> Result<(), Error> {
        let entry = self.entries.get(&id).ok_or(Error::NoSuchEntry(id))?;
        if entry.is_used() {
            return Err(Error::EntryInUse(id));
        }
        self.destroy(id);
        Ok(())
    }

    pub(crate) fn destroy(&mut self, id: EntryId) -> Option<CacheEntry> {
        let entry = self.entries.remove(&id)?;
        if self.index.get(&entry.key) == Some(&id) {
            self.index.remove(&entry.key);
        }
        tracing::debug!(key = %entry.key, id = %id, size = entry.actual_size, "cache entry destroyed");
        Some(entry)
    }

    pub fn metadata_mut(&mut self, id: EntryId) -> Result<&mut EntryMetadata, Error> {
        Ok(&mut self.get_mut(id)?.metadata)
    }

    pub fn set_proxy_key(&mut self, id: EntryId, proxy_key: Url) -> Result<(), Error> {
        self.get_mut(id)?.proxy_key = proxy_key;
        Ok(())
    }

    /// Record the announced length. A length below the bytes already held is
    /// raised to `actual_size`, as in [`Registry::add_fragment`].
    pub fn set_expected_length(&mut self, id: EntryId, length: Option<u64>) -> Result<(), Error> {
        let entry = self.get_mut(id)?;
        let size = entry.actual_size;
        entry.expected_length = length.map(|length| {
            if length < size {
                tracing::debug!(id = %id, length, size, "announced length below stored content");
            }
            length.max(size)
        });
        Ok(())
    }

    pub fn set_expiry(&mut self, id: EntryId, max_age: Option<Duration>, honor_expiry: bool) -> Result<(), Error> {
        let entry = self.get_mut(id)?;
        entry.max_age = max_age;
        entry.honor_expiry = honor_expiry;
        Ok(())
    }

    pub fn conditional_request(&self, id: EntryId) -> Option<ConditionalRequest> {
        self.entries.get(&id)?.conditional_request()
    }

    /// Bytes held by every entry.
    pub fn get_cache_size(&self) -> u64 {
        self.entries.values().map(CacheEntry::actual_size).sum()
    }

    pub fn get_cache_entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_cache_entry_used_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_used()).count()
    }

    pub fn get_cache_entry_loading_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_incomplete()).count()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.get_cache_size(),
            entries: self.get_cache_entry_count(),
            used: self.get_cache_entry_used_count(),
            loading: self.get_cache_entry_loading_count(),
            budget: self.config.memory_cache_size,
        }
    }
}
