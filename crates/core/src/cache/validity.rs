//! Reload modes and the validity rule applied on lookup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How aggressively a lookup may reuse a cached entry.
///
/// Variants are ordered from most cached to most reloaded. `Increment` and
/// `Always` behave identically here; callers keep them apart for their own
/// bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMode {
    Increment,
    Always,
    #[default]
    Normal,
    CheckIfModified,
    ForceReload,
    Never,
}

/// The entry metadata a validity decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct Freshness<'a> {
    pub last_access_time: DateTime<Utc>,
    pub max_age: Option<Duration>,
    pub honor_expiry: bool,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
}

impl Freshness<'_> {
    /// Whether `max_age` has run out since the last access.
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        match self.max_age {
            Some(max_age) if self.honor_expiry => now - self.last_access_time >= max_age,
            _ => false,
        }
    }

    /// Whether a conditional request could be built from this entry.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

impl ReloadMode {
    /// Decide whether an existing entry may be returned as-is.
    pub fn permits(self, freshness: &Freshness<'_>, now: DateTime<Utc>) -> bool {
        match self {
            ReloadMode::Increment | ReloadMode::Always => true,
            ReloadMode::Normal => !freshness.has_expired(now),
            ReloadMode::CheckIfModified => freshness.has_validators(),
            ReloadMode::ForceReload | ReloadMode::Never => false,
        }
    }

    /// Whether lookups in this mode consult the cache at all.
    pub fn uses_cache(self) -> bool {
        self != ReloadMode::Never
    }
}

impl std::fmt::Display for ReloadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReloadMode::Increment => "increment",
            ReloadMode::Always => "always",
            ReloadMode::Normal => "normal",
            ReloadMode::CheckIfModified => "check_if_modified",
            ReloadMode::ForceReload => "force_reload",
            ReloadMode::Never => "never",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ReloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "increment" => Ok(ReloadMode::Increment),
            "always" => Ok(ReloadMode::Always),
            "normal" => Ok(ReloadMode::Normal),
            "check_if_modified" => Ok(ReloadMode::CheckIfModified),
            "force_reload" => Ok(ReloadMode::ForceReload),
            "never" => Ok(ReloadMode::Never),
            other => Err(format!("unknown reload mode: {other}")),
        }
    }
}
