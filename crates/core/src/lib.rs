//! Core cache engine for rescache.
//!
//! This crate provides:
//! - The fragment-based resource cache and its registry
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheEntry, EntryId, Registry, ReloadMode};
pub use config::CacheConfig;
pub use error::Error;
