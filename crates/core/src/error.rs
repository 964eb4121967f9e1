//! Unified error types for rescache.
//!
//! Every fallible cache operation returns one of these. Misses are not errors:
//! lookups return `Option` and only allocation or bookkeeping failures surface here.

use std::collections::TryReserveError;

use crate::cache::EntryId;

/// Unified error types for the cache engine and its transport.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Memory for an entry, fragment, or redirect target could not be reserved.
    #[error("ALLOCATION_FAILED: {0}")]
    AllocationFailed(String),

    /// `offset + length` does not fit in the resource address space.
    #[error("RANGE_OVERFLOW: offset {offset} + length {length}")]
    RangeOverflow { offset: u64, length: u64 },

    /// The entry handle does not refer to a registered entry.
    #[error("NO_SUCH_ENTRY: {0}")]
    NoSuchEntry(EntryId),

    /// The entry is still referenced and cannot be destroyed.
    #[error("ENTRY_IN_USE: {0}")]
    EntryInUse(EntryId),

    /// A redirect location could not be resolved against the entry URI.
    #[error("INVALID_REDIRECT: {0}")]
    InvalidRedirect(String),

    /// A redirect chain exceeded the configured hop bound.
    #[error("TOO_MANY_REDIRECTS: {0}")]
    TooManyRedirects(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network failure before or during a transfer.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// HTTP error response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error::AllocationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidRedirect("http://[::1".to_string());
        assert!(err.to_string().contains("INVALID_REDIRECT"));
        assert!(err.to_string().contains("http://[::1"));
    }

    #[test]
    fn test_range_overflow_display() {
        let err = Error::RangeOverflow { offset: u64::MAX, length: 2 };
        assert!(err.to_string().starts_with("RANGE_OVERFLOW"));
    }

    #[test]
    fn test_try_reserve_maps_to_allocation_failed() {
        let mut buf: Vec<u8> = Vec::new();
        let err = buf.try_reserve_exact(usize::MAX).unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::AllocationFailed(_)));
    }
}
