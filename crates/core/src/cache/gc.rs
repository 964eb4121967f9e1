//! Budget-driven mark/sweep collection of unreferenced entries.
//!
//! The mark phase reads every entry and only flips `gc_mark`. The sweep phase
//! walks the id snapshot taken while marking, never the live map.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::entry::EntryId;
use super::registry::Registry;

/// Outcome of one collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub marked: usize,
    pub freed_entries: usize,
    pub freed_bytes: u64,
    /// Bytes still held by unreferenced entries.
    pub remaining_size: u64,
    /// Whether the whole cache, referenced entries included, fits the budget.
    pub budget_satisfied: bool,
}

impl Registry {
    /// Run one collection pass. `whole` evicts every unreferenced entry.
    pub fn garbage_collection(&mut self, whole: bool) -> GcReport {
        self.collect(whole, Utc::now())
    }

    /// Run a partial pass if `gc_interval` has elapsed since the previous one.
    pub fn collect_if_due(&mut self, now: DateTime<Utc>) -> Option<GcReport> {
        let interval = self.config.gc_interval()?;
        if let Some(last) = self.last_gc
            && now - last < interval
        {
            return None;
        }
        Some(self.collect(false, now))
    }

    fn collect(&mut self, whole: bool, now: DateTime<Utc>) -> GcReport {
        let budget = self.config.memory_cache_size;
        let marked = self.mark(whole, budget);

        for id in &marked {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.gc_mark = true;
            }
        }

        let mut report = GcReport { marked: marked.len(), ..Default::default() };
        for id in &marked {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            entry.gc_mark = false;
            if entry.is_used() {
                continue;
            }
            report.freed_bytes += entry.actual_size;
            entry.fragments.clear();
            entry.actual_size = 0;
            if self.destroy(*id).is_some() {
                report.freed_entries += 1;
            }
        }

        report.remaining_size = self.entries.values().filter(|e| !e.is_used()).map(|e| e.actual_size).sum();
        // Referenced entries count against the budget even though they cannot be evicted.
        let total_size = self.get_cache_size();
        report.budget_satisfied = total_size <= budget;
        self.last_gc = Some(now);

        if report.budget_satisfied {
            tracing::debug!(
                whole,
                freed_entries = report.freed_entries,
                freed_bytes = report.freed_bytes,
                remaining = report.remaining_size,
                "garbage collection finished"
            );
        } else {
            tracing::debug!(
                whole,
                remaining = report.remaining_size,
                total = total_size,
                budget,
                used = self.get_cache_entry_used_count(),
                "garbage collection could not meet budget"
            );
        }

        report
    }

    /// Pick eviction candidates. Referenced entries are never chosen.
    fn mark(&self, whole: bool, budget: u64) -> Vec<EntryId> {
        let mut unused: Vec<_> = self.entries.values().filter(|e| !e.is_used()).collect();

        if whole {
            return unused.iter().map(|e| e.id).collect();
        }

        let mut total: u64 = unused.iter().map(|e| e.actual_size).sum();
        let mut marked = Vec::new();

        unused.retain(|e| {
            if e.valid {
                return true;
            }
            total -= e.actual_size;
            marked.push(e.id);
            false
        });

        if total <= budget {
            return marked;
        }

        unused.sort_by_key(|e| (e.last_access_time, e.access_seq));
        for entry in unused {
            if total <= budget {
                break;
            }
            total -= entry.actual_size;
            marked.push(entry.id);
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use chrono::Duration;
    use url::Url;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn filled(reg: &mut Registry, path: &str, size: usize) -> EntryId {
        let id = reg.get_cache_entry(&url(&format!("https://example.com/{path}"))).unwrap();
        reg.add_fragment(id, 0, &vec![b'x'; size]).unwrap();
        reg.normalize_cache_entry(id, Some(size as u64)).unwrap();
        id
    }

    fn small_registry(budget: u64) -> Registry {
        Registry::new(CacheConfig { memory_cache_size: budget, ..Default::default() })
    }

    #[test]
    fn test_under_budget_keeps_everything() {
        let mut reg = small_registry(100);
        filled(&mut reg, "a", 30);
        filled(&mut reg, "b", 30);

        let report = reg.garbage_collection(false);
        assert_eq!(report.freed_entries, 0);
        assert!(report.budget_satisfied);
        assert_eq!(reg.get_cache_entry_count(), 2);
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let mut reg = small_registry(50);
        let a = filled(&mut reg, "a", 30);
        let b = filled(&mut reg, "b", 30);
        let c = filled(&mut reg, "c", 30);

        let later = Utc::now() + Duration::seconds(5);
        reg.get_validated_cache_entry_at(&url("https://example.com/a"), crate::cache::ReloadMode::Normal, later)
            .unwrap();

        let report = reg.garbage_collection(false);
        assert_eq!(report.freed_entries, 2);
        assert_eq!(report.freed_bytes, 60);
        assert!(report.budget_satisfied);
        assert!(reg.entry(a).is_some());
        assert!(reg.entry(b).is_none());
        assert!(reg.entry(c).is_none());
        assert!(reg.entries().all(|e| !e.gc_mark()));
    }

    #[test]
    fn test_referenced_entries_survive_pressure() {
        let mut reg = small_registry(10);
        let a = filled(&mut reg, "a", 40);
        let b = filled(&mut reg, "b", 40);
        reg.acquire(a).unwrap();
        let id_before = reg.entry(a).unwrap().cache_id();

        let report = reg.garbage_collection(false);
        assert!(reg.entry(b).is_none());
        assert_eq!(report.remaining_size, 0);
        assert!(!report.budget_satisfied);

        let entry = reg.entry(a).unwrap();
        assert_eq!(entry.actual_size(), 40);
        assert_eq!(entry.cache_id(), id_before);
    }

    #[test]
    fn test_budget_unsatisfiable_when_everything_is_held() {
        let mut reg = small_registry(10);
        let a = filled(&mut reg, "a", 40);
        let b = filled(&mut reg, "b", 40);
        reg.acquire(a).unwrap();
        reg.acquire(b).unwrap();

        let report = reg.garbage_collection(false);
        assert_eq!(report.marked, 0);
        assert_eq!(report.freed_entries, 0);
        assert!(!report.budget_satisfied);
        assert_eq!(reg.get_cache_size(), 80);

        reg.release(a).unwrap();
        let report = reg.garbage_collection(false);
        assert_eq!(report.freed_entries, 1);
        assert!(!report.budget_satisfied);
        assert_eq!(reg.get_cache_size(), 40);
    }

    #[test]
    fn test_whole_spares_referenced() {
        let mut reg = small_registry(1024);
        let a = filled(&mut reg, "a", 10);
        let b = filled(&mut reg, "b", 10);
        reg.acquire(b).unwrap();

        let report = reg.garbage_collection(true);
        assert_eq!(report.freed_entries, 1);
        assert!(reg.entry(a).is_none());
        assert_eq!(reg.get_cache_fragment(b).unwrap().data(), &[b'x'; 10]);
    }

    #[test]
    fn test_superseded_entries_collected_once_released() {
        let mut reg = small_registry(1024);
        let uri = url("https://example.com/page");
        let old = filled(&mut reg, "page", 10);
        reg.acquire(old).unwrap();
        let fresh = reg.replace_cache_entry(&uri).unwrap();

        reg.garbage_collection(false);
        assert!(reg.entry(old).is_some());

        reg.release(old).unwrap();
        let report = reg.garbage_collection(false);
        assert_eq!(report.freed_entries, 1);
        assert!(reg.entry(old).is_none());
        assert_eq!(reg.find_in_cache(&uri), Some(fresh));
    }

    #[test]
    fn test_collect_if_due() {
        let mut reg = small_registry(1024);
        let now = Utc::now();
        assert!(reg.collect_if_due(now).is_some());
        assert!(reg.collect_if_due(now + Duration::milliseconds(10)).is_none());
        assert!(reg.collect_if_due(now + Duration::seconds(2)).is_some());

        let mut disabled = Registry::new(CacheConfig { gc_interval_ms: 0, ..Default::default() });
        assert!(disabled.collect_if_due(now).is_none());
    }
}
