//! End-to-end behaviour of the cache engine through its public API.

use chrono::{Duration, Utc};
use rescache_core::cache::{FragmentWrite, ReloadMode};
use rescache_core::{CacheConfig, Registry};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[test]
fn out_of_order_halves_defragment() {
    let mut reg = Registry::default();
    let id = reg.get_cache_entry(&url("https://example.com/U")).unwrap();
    reg.set_expected_length(id, Some(10)).unwrap();

    reg.add_fragment(id, 5, b"FGHIJ").unwrap();
    reg.add_fragment(id, 0, b"ABCDE").unwrap();
    reg.normalize_cache_entry(id, Some(10)).unwrap();

    let entry = reg.entry(id).unwrap();
    assert_eq!(entry.actual_size(), 10);
    assert!(!entry.is_incomplete());
    assert_eq!(reg.get_cache_fragment(id).unwrap().data(), b"ABCDEFGHIJ");
}

#[test]
fn overlapping_write_overwrites() {
    let mut reg = Registry::default();
    let id = reg.get_cache_entry(&url("https://example.com/x")).unwrap();

    assert_eq!(reg.add_fragment(id, 0, b"XXXXX").unwrap(), FragmentWrite::Enlarged);
    assert_eq!(reg.add_fragment(id, 2, b"YYY").unwrap(), FragmentWrite::Overwritten);

    let entry = reg.entry(id).unwrap();
    assert_eq!(entry.actual_size(), 5);
    assert_eq!(entry.fragments().len(), 1);
    assert_eq!(reg.get_cache_fragment(id).unwrap().data(), b"XXYYY");
}

#[test]
fn coverage_equals_union_of_writes() {
    let body: Vec<u8> = (0..64u8).collect();
    let writes: &[(usize, usize)] = &[(48, 64), (0, 8), (20, 30), (6, 22), (40, 50)];

    let mut reg = Registry::default();
    let id = reg.get_cache_entry(&url("https://example.com/union")).unwrap();
    for &(start, end) in writes {
        reg.add_fragment(id, start as u64, &body[start..end]).unwrap();
    }

    // [0,30) and [40,64) are covered, [30,40) is still missing.
    let covered: Vec<(u64, u64)> = reg.entry(id).unwrap().fragments().iter().map(|f| (f.offset(), f.end())).collect();
    assert_eq!(covered, vec![(0, 30), (40, 64)]);
    assert_eq!(reg.entry(id).unwrap().actual_size(), 54);
    assert!(reg.get_cache_fragment(id).is_none());

    reg.add_fragment(id, 30, &body[30..40]).unwrap();
    assert_eq!(reg.get_cache_fragment(id).unwrap().data(), body.as_slice());
}

#[test]
fn retransmission_is_idempotent_in_size() {
    let mut reg = Registry::default();
    let id = reg.get_cache_entry(&url("https://example.com/r")).unwrap();
    reg.add_fragment(id, 0, b"0123456789").unwrap();
    for offset in 0..10u64 {
        reg.add_fragment(id, offset, b"z").unwrap();
        assert_eq!(reg.entry(id).unwrap().actual_size(), 10);
    }
    assert_eq!(reg.get_cache_fragment(id).unwrap().data(), b"zzzzzzzzzz");
}

#[test]
fn validity_modes_are_monotonic() {
    let mut reg = Registry::default();
    let uri = url("https://example.com/page");
    let id = reg.get_cache_entry(&uri).unwrap();
    reg.set_expiry(id, Some(Duration::seconds(30)), true).unwrap();

    let fresh = Utc::now() + Duration::seconds(1);
    let stale = Utc::now() + Duration::minutes(10);

    assert!(reg.get_validated_cache_entry_at(&uri, ReloadMode::Never, fresh).is_none());
    assert!(reg.get_validated_cache_entry_at(&uri, ReloadMode::ForceReload, fresh).is_none());
    assert!(reg.get_validated_cache_entry_at(&uri, ReloadMode::CheckIfModified, fresh).is_none());
    assert_eq!(reg.get_validated_cache_entry_at(&uri, ReloadMode::Normal, fresh), Some(id));

    // The hit above refreshed the access time to `fresh`.
    assert!(reg.get_validated_cache_entry_at(&uri, ReloadMode::Normal, stale).is_none());
    assert_eq!(reg.get_validated_cache_entry_at(&uri, ReloadMode::Increment, stale), Some(id));
    assert_eq!(reg.get_validated_cache_entry_at(&uri, ReloadMode::Always, stale), Some(id));

    reg.metadata_mut(id).unwrap().last_modified = Some("Wed, 21 Oct 2015 07:28:00 GMT".into());
    assert_eq!(reg.get_validated_cache_entry_at(&uri, ReloadMode::CheckIfModified, stale), Some(id));
}

#[test]
fn stale_handle_detected_after_replacement() {
    let mut reg = Registry::default();
    let uri = url("https://example.com/script.js");
    let held = reg.get_cache_entry(&uri).unwrap();
    reg.add_fragment(held, 0, b"old()").unwrap();
    reg.acquire(held).unwrap();
    let seen = reg.entry(held).unwrap().cache_id();

    assert!(reg.get_validated_cache_entry(&uri, ReloadMode::ForceReload).is_none());
    let fresh = reg.replace_cache_entry(&uri).unwrap();
    reg.add_fragment(fresh, 0, b"new()").unwrap();

    assert!(!reg.cache_entry_is_valid(held));
    assert_ne!(reg.entry(held).unwrap().cache_id(), seen);
    assert_eq!(reg.get_cache_fragment(fresh).unwrap().data(), b"new()");
}

#[test]
fn redirect_chains_terminate() {
    let mut reg = Registry::new(CacheConfig { max_redirects: 4, ..Default::default() });
    let start = reg.get_cache_entry(&url("http://example.com/start")).unwrap();
    reg.redirect_cache(start, "https://example.com/step", Some(false), Some(false)).unwrap();
    let step = reg.get_cache_entry(&url("https://example.com/step")).unwrap();
    reg.redirect_cache(step, "final", None, None).unwrap();
    let last = reg.get_cache_entry(&url("https://example.com/final")).unwrap();

    assert_eq!(reg.get_redirected_cache_entry(&url("http://example.com/start")), Some(last));

    reg.redirect_cache(last, "/start", None, None).unwrap();
    let loops_back = reg.get_cache_entry(&url("https://example.com/start")).unwrap();
    reg.redirect_cache(loops_back, "/step", None, None).unwrap();
    assert!(reg.get_redirected_cache_entry(&url("http://example.com/start")).is_none());
}

#[test]
fn gc_never_touches_referenced_content() {
    let mut reg = Registry::new(CacheConfig { memory_cache_size: 1, ..Default::default() });
    let mut held = Vec::new();
    for i in 0..6 {
        let id = reg.get_cache_entry(&url(&format!("https://example.com/{i}"))).unwrap();
        reg.add_fragment(id, 0, format!("body-{i}").as_bytes()).unwrap();
        if i % 2 == 0 {
            reg.acquire(id).unwrap();
            held.push((id, reg.entry(id).unwrap().cache_id()));
        }
    }

    for whole in [false, true] {
        reg.garbage_collection(whole);
        for &(id, cache_id) in &held {
            let entry = reg.entry(id).unwrap();
            assert_eq!(entry.cache_id(), cache_id);
            assert!(entry.actual_size() > 0);
        }
    }
    assert_eq!(reg.get_cache_entry_count(), held.len());
    assert_eq!(reg.get_cache_entry_used_count(), held.len());
}
