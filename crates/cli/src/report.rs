//! JSON reports printed on stdout.

use rescache_core::cache::content_digest;
use rescache_core::{EntryId, Registry};
use serde::Serialize;

/// Result of loading one URL.
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub size: u64,
    pub cache_id: u64,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchReport {
    /// Describe the entry a load ended on.
    ///
    /// The entry is held for the duration of the read so a collection
    /// triggered meanwhile cannot drop it.
    pub fn for_entry(registry: &mut Registry, url: &str, id: EntryId) -> Self {
        let held = registry.acquire(id).is_ok();

        let digest = registry.get_cache_fragment(id).map(|fragment| content_digest(fragment.data()));
        let report = match registry.entry(id) {
            Some(entry) => Self {
                url: url.to_string(),
                final_url: Some(entry.key().to_string()),
                entry: Some(id.to_string()),
                size: entry.actual_size(),
                cache_id: entry.cache_id(),
                complete: !entry.is_incomplete(),
                content_type: entry.metadata().content_type.clone(),
                digest,
                error: None,
            },
            None => Self::failed(url, "entry vanished"),
        };

        if held && let Err(e) = registry.release(id) {
            tracing::warn!(id = %id, error = %e, "release after report failed");
        }
        report
    }

    /// A load that produced no entry.
    pub fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            final_url: None,
            entry: None,
            size: 0,
            cache_id: 0,
            complete: false,
            content_type: None,
            digest: None,
            error: Some(error.to_string()),
        }
    }
}
