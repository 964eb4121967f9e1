//! In-memory resource cache keyed by URI.
//!
//! Resources arrive as possibly overlapping, possibly gapped byte chunks while
//! consumers already hold handles to the entry. This module provides:
//!
//! - Fragment storage with overlap merging and defragmentation
//! - A registry indexing entries by URI, with reference counting
//! - Reload-mode validity checks on lookup
//! - Cached redirect chains with a hop bound
//! - Budget-driven mark/sweep garbage collection

pub mod entry;
pub mod fragment;
pub mod gc;
pub mod hash;
pub mod redirect;
pub mod registry;
pub mod uri;
pub mod validity;

pub use crate::Error;

pub use entry::{CacheEntry, ConditionalRequest, EntryId, EntryMetadata};
pub use fragment::{Fragment, FragmentWrite, Fragments};
pub use gc::GcReport;
pub use hash::content_digest;
pub use registry::{CacheStats, Registry};
pub use validity::{Freshness, ReloadMode};
