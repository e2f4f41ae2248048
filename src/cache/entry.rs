//! Per-key cached state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::client::TransportError;

/// Read-path lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// Entry exists but nothing has asked to fetch it yet.
    #[default]
    Idle,
    /// A fetch for this key is outstanding.
    Loading,
    /// The last resolved fetch succeeded; `data` is present.
    Success,
    /// The last resolved fetch failed; `error` is present.
    Error,
}

/// Opaque marker identifying one fetch attempt for a key.
///
/// Allocated by the store when a fetch begins; a resolution only applies if
/// it presents the token of the attempt that is still current. Tokens are
/// never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

impl FetchToken {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Stored state for one [`ResourceKey`](super::ResourceKey).
///
/// Invariants, maintained by the store:
///
/// - `status == Success` ⇒ `data` present and `error` absent.
/// - `status == Error` ⇒ `error` present; `data` may retain the last
///   successful value (stale-but-shown).
/// - `in_flight` present ⇔ exactly one request for this key is outstanding.
///
/// Payloads and errors are shared `Arc`s so snapshots are cheap to hand to
/// every subscriber.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub(crate) status: FetchStatus,
    pub(crate) data: Option<Arc<Value>>,
    pub(crate) error: Option<Arc<TransportError>>,
    pub(crate) last_fetched_at: Option<Instant>,
    pub(crate) in_flight: Option<FetchToken>,
}

impl CacheEntry {
    /// Returns the entry's status.
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    /// Returns the cached payload, if any.
    pub fn data(&self) -> Option<&Arc<Value>> {
        self.data.as_ref()
    }

    /// Returns the stored error, if any.
    pub fn error(&self) -> Option<&Arc<TransportError>> {
        self.error.as_ref()
    }

    /// Returns when the last successful fetch resolved.
    pub fn last_fetched_at(&self) -> Option<Instant> {
        self.last_fetched_at
    }

    /// Returns `true` while a fetch for this key is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns `true` if the entry holds a success fresh enough to skip a
    /// refetch: any success when `window` is `None`, otherwise one resolved
    /// within `window`.
    pub fn is_fresh(&self, window: Option<Duration>) -> bool {
        if self.status != FetchStatus::Success {
            return false;
        }
        match (window, self.last_fetched_at) {
            (None, _) => true,
            (Some(window), Some(at)) => at.elapsed() <= window,
            (Some(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_idle_and_empty() {
        let entry = CacheEntry::default();
        assert_eq!(entry.status(), FetchStatus::Idle);
        assert!(entry.data().is_none());
        assert!(entry.error().is_none());
        assert!(!entry.is_in_flight());
    }

    #[test]
    fn freshness_without_window_is_any_success() {
        let entry = CacheEntry {
            status: FetchStatus::Success,
            data: Some(Arc::new(serde_json::json!([]))),
            last_fetched_at: Some(Instant::now()),
            ..Default::default()
        };
        assert!(entry.is_fresh(None));
        assert!(entry.is_fresh(Some(Duration::from_secs(60))));
    }

    #[test]
    fn error_entries_are_never_fresh() {
        let entry = CacheEntry {
            status: FetchStatus::Error,
            ..Default::default()
        };
        assert!(!entry.is_fresh(None));
    }
}
