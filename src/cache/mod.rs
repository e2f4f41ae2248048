//! Process-wide cache store — the single source of truth for read-path state.
//!
//! The store maps a [`ResourceKey`] to a [`CacheEntry`] plus the listeners
//! subscribed to that key. It is constructed explicitly at startup and
//! injected into the engines; cloning the handle shares the same interior.
//!
//! ## Core operations
//!
//! - [`CacheStore::get_entry`] — read (and lazily create) an entry, never fetching.
//! - [`CacheStore::begin_fetch`] — the sole deduplication gate: at most one
//!   outstanding fetch per key, identified by a [`FetchToken`].
//! - [`CacheStore::resolve_fetch`] — apply a fetch outcome; resolutions
//!   presenting a superseded token are discarded.
//! - [`CacheStore::subscribe`] — register a callback for a key's status
//!   transitions; the returned handle unsubscribes on drop.

pub mod entry;
pub mod key;

pub use entry::{CacheEntry, FetchStatus, FetchToken};
pub use key::{ParamValue, ResourceKey};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use crate::client::TransportError;

/// Type-erased, reference-counted listener invoked with each entry snapshot.
type Listener = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Outcome of [`CacheStore::begin_fetch`].
#[derive(Debug, Clone, Copy)]
pub enum FetchGate {
    /// No fetch was outstanding; the caller now owns the transport call for
    /// this token.
    Started(FetchToken),
    /// A fetch is already outstanding; the caller must not issue a second
    /// transport call and can observe the existing attempt's resolution.
    AlreadyInFlight(FetchToken),
}

impl FetchGate {
    /// Returns the token either way.
    pub fn token(self) -> FetchToken {
        match self {
            Self::Started(token) | Self::AlreadyInFlight(token) => token,
        }
    }
}

struct KeyState {
    entry: CacheEntry,
    // Registration order; fan-out is synchronous in this order.
    listeners: Vec<(u64, Listener)>,
}

impl KeyState {
    fn new() -> Self {
        Self {
            entry: CacheEntry::default(),
            listeners: Vec::new(),
        }
    }
}

struct StoreInner {
    keys: Mutex<HashMap<ResourceKey, KeyState>>,
    next_token: AtomicU64,
    next_listener: AtomicU64,
}

/// The process-wide cache store.
///
/// Cheap to clone — clones share the same interior. Entries live for the
/// process lifetime; there is no eviction, since the dataset is small and
/// session-lived.
///
/// The interior mutex is only held for map mutation; listener callbacks run
/// after it is released, so they may re-enter the store.
///
/// # Examples
///
/// ```
/// use folio::cache::{CacheStore, FetchStatus, ResourceKey};
///
/// let store = CacheStore::new();
/// let key = ResourceKey::new("projects", vec![1.into(), 10.into()]);
/// assert_eq!(store.get_entry(&key).status(), FetchStatus::Idle);
/// ```
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                keys: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the current entry for `key`, creating an `Idle` entry if none
    /// exists. Never triggers a fetch.
    pub fn get_entry(&self, key: &ResourceKey) -> CacheEntry {
        let mut keys = self.lock();
        keys.entry(key.clone())
            .or_insert_with(KeyState::new)
            .entry
            .clone()
    }

    /// Gates a fetch for `key`.
    ///
    /// If a fetch is already outstanding, returns
    /// [`FetchGate::AlreadyInFlight`] with the existing token and changes
    /// nothing — this is what collapses concurrent identical requests into
    /// one transport call. Otherwise flips the entry to `Loading`, allocates
    /// a fresh token, and returns [`FetchGate::Started`].
    pub fn begin_fetch(&self, key: &ResourceKey) -> FetchGate {
        let (gate, notify) = {
            let mut keys = self.lock();
            let state = keys.entry(key.clone()).or_insert_with(KeyState::new);

            if let Some(token) = state.entry.in_flight {
                (FetchGate::AlreadyInFlight(token), None)
            } else {
                let token = FetchToken::new(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
                state.entry.status = FetchStatus::Loading;
                state.entry.in_flight = Some(token);
                debug!(key = %key, ?token, "fetch started");
                (
                    FetchGate::Started(token),
                    Some((state.entry.clone(), state.listeners.clone())),
                )
            }
        };

        if let Some((snapshot, listeners)) = notify {
            fan_out(&snapshot, &listeners);
        }
        gate
    }

    /// Applies a fetch outcome for `key`.
    ///
    /// If `token` is not the entry's current in-flight token the call is a
    /// stale no-op — a newer fetch superseded this one and its resolution
    /// must not clobber the entry. Otherwise the result is applied (success
    /// sets `data` and the fetch timestamp; failure sets `error` and retains
    /// any previous `data`) and the in-flight token is cleared.
    pub fn resolve_fetch(
        &self,
        key: &ResourceKey,
        token: FetchToken,
        result: Result<Value, TransportError>,
    ) {
        let notify = {
            let mut keys = self.lock();
            let Some(state) = keys.get_mut(key) else {
                return;
            };

            if state.entry.in_flight != Some(token) {
                debug!(key = %key, ?token, "discarding stale fetch resolution");
                return;
            }

            match result {
                Ok(data) => {
                    state.entry.status = FetchStatus::Success;
                    state.entry.data = Some(Arc::new(data));
                    state.entry.error = None;
                    state.entry.last_fetched_at = Some(Instant::now());
                    debug!(key = %key, "fetch resolved with success");
                }
                Err(error) => {
                    state.entry.status = FetchStatus::Error;
                    state.entry.error = Some(Arc::new(error));
                    debug!(key = %key, "fetch resolved with error");
                }
            }
            state.entry.in_flight = None;

            (state.entry.clone(), state.listeners.clone())
        };

        fan_out(&notify.0, &notify.1);
    }

    /// Registers `callback` to be invoked with an entry snapshot on every
    /// status transition for `key`. Returns a handle that unsubscribes when
    /// dropped.
    pub fn subscribe(
        &self,
        key: &ResourceKey,
        callback: impl Fn(&CacheEntry) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        let mut keys = self.lock();
        keys.entry(key.clone())
            .or_insert_with(KeyState::new)
            .listeners
            .push((id, Arc::new(callback)));
        drop(keys);

        Subscription {
            store: self.clone(),
            key: key.clone(),
            id,
        }
    }

    fn remove_listener(&self, key: &ResourceKey, id: u64) {
        let mut keys = self.lock();
        if let Some(state) = keys.get_mut(key) {
            state.listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceKey, KeyState>> {
        // Listener callbacks never run under this lock, so the only way to
        // poison it is a panic inside the store itself.
        self.inner.keys.lock().expect("cache store lock poisoned")
    }
}

/// Invokes listeners with the snapshot, synchronously, in registration order.
fn fan_out(snapshot: &CacheEntry, listeners: &[(u64, Listener)]) {
    for (_, listener) in listeners {
        listener(snapshot);
    }
}

/// A live listener registration for one key.
///
/// Unsubscribes exactly once, when dropped. Unsubscription is idempotent —
/// the entry and its cached data are untouched.
pub struct Subscription {
    store: CacheStore,
    key: ResourceKey,
    id: u64,
}

impl Subscription {
    /// Returns the key this subscription is bound to.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Removes the listener. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.remove_listener(&self.key, self.id);
    }
}
