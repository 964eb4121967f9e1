//! Redirect recording and resolution through the registry.

use url::Url;

use super::entry::EntryId;
use super::registry::Registry;
use super::uri::resolve;
use crate::Error;

impl Registry {
    /// Record that the entry redirects to `location`, resolved against its key.
    ///
    /// `get` and `incomplete` overwrite the entry's flags when `Some` and leave
    /// them untouched when `None`.
    pub fn redirect_cache(
        &mut self, id: EntryId, location: &str, get: Option<bool>, incomplete: Option<bool>,
    ) -> Result<Url, Error> {
        let key = self.entry(id).ok_or(Error::NoSuchEntry(id))?.key().clone();
        let target = resolve(&key, location)?;
        let cache_id = self.next_cache_id();

        let entry = self.entries.get_mut(&id).ok_or(Error::NoSuchEntry(id))?;
        entry.redirect_target = Some(target.clone());
        if let Some(get) = get {
            entry.redirect_get = get;
        }
        if let Some(incomplete) = incomplete {
            entry.incomplete = incomplete;
        }
        entry.cache_id = cache_id;

        tracing::debug!(from = %key, to = %target, "cached redirect");
        Ok(target)
    }

    /// Follow redirect targets from `id` to the terminal entry.
    ///
    /// Returns `id` itself when it does not redirect, and `None` when a hop
    /// leads to an unknown key or the chain exceeds `max_redirects` hops.
    pub fn follow_cached_redirects(&self, id: EntryId) -> Option<EntryId> {
        let mut current = id;
        let mut entry = self.entry(current)?;

        for _ in 0..=self.config.max_redirects {
            let Some(target) = entry.redirect_target() else {
                return Some(current);
            };
            current = self.find_in_cache(target)?;
            entry = self.entry(current)?;
        }

        tracing::debug!(start = %id, max = self.config.max_redirects, "redirect chain exceeds hop limit");
        None
    }

    /// [`Registry::find_in_cache`] followed by [`Registry::follow_cached_redirects`].
    pub fn get_redirected_cache_entry(&self, uri: &Url) -> Option<EntryId> {
        let id = self.find_in_cache(uri)?;
        self.follow_cached_redirects(id)
    }
}
