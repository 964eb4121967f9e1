//! Transport for rescache.
//!
//! This crate fetches resources over HTTP(S) and streams them into a
//! `rescache_core::Registry`, recording metadata, expiry, and redirects.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchOutcome, Transfer};
