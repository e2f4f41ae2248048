//! Query engine — orchestrates reads through the cache store.
//!
//! A [`Query`] is a live subscription to one [`ResourceKey`]: it derives the
//! key from a [`ResourceRequest`], consults the store, starts a fetch when no
//! fresh success exists and none is in flight, and re-evaluates whenever its
//! request or `enabled` gate changes. Deduplication and stale-resolution
//! filtering live in the store; the engine never cancels a transport call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::{
    CacheEntry, CacheStore, FetchGate, FetchStatus, ParamValue, ResourceKey, Subscription,
};
use crate::client::{ResourceClient, TransportError};
use crate::http::{Method, Request};

/// Describes one read resource: cache identity plus how to fetch it.
///
/// Query-string parameters contribute to both the HTTP request and the cache
/// key; key components cover identity carried in the path itself (a detail
/// id). Parameter order is significant for both.
///
/// # Examples
///
/// ```
/// use folio::query::ResourceRequest;
///
/// let request = ResourceRequest::new("projects", "/project")
///     .param("page", 1)
///     .param("limit", 10);
/// assert_eq!(request.key().to_string(), "projects:1:10");
/// ```
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    resource: String,
    path: String,
    key_components: Vec<ParamValue>,
    query: Vec<(&'static str, ParamValue)>,
}

impl ResourceRequest {
    /// Creates a request for `resource` fetched from `path`.
    pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            path: path.into(),
            key_components: Vec::new(),
            query: Vec::new(),
        }
    }

    /// Appends a query-string parameter; it is part of the cache key.
    #[must_use]
    pub fn param(mut self, name: &'static str, value: impl Into<ParamValue>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    /// Appends a key-only component for identity already encoded in the path.
    #[must_use]
    pub fn key_component(mut self, value: impl Into<ParamValue>) -> Self {
        self.key_components.push(value.into());
        self
    }

    /// Derives the cache key: resource name, then key components, then
    /// query parameter values in insertion order.
    pub fn key(&self) -> ResourceKey {
        let mut params = self.key_components.clone();
        params.extend(self.query.iter().map(|(_, value)| value.clone()));
        ResourceKey::new(self.resource.clone(), params)
    }

    /// Builds the HTTP request for this resource.
    fn to_http(&self) -> Request {
        let mut request = Request::new(Method::Get, self.path.clone());
        for (name, value) in &self.query {
            if !matches!(value, ParamValue::Null) {
                request = request.query(*name, value.to_string());
            }
        }
        request
    }
}

/// The `{status, data, error}` view a consumer renders from.
///
/// `data` and `error` are shared with the cache entry, so snapshots are
/// cheap and read-only.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    status: FetchStatus,
    data: Option<Arc<Value>>,
    error: Option<Arc<TransportError>>,
}

impl QuerySnapshot {
    fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
        }
    }

    fn from_entry(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status(),
            data: entry.data().cloned(),
            error: entry.error().cloned(),
        }
    }

    /// Returns the read-path status.
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    /// Returns the raw cached payload, if any.
    pub fn data(&self) -> Option<&Arc<Value>> {
        self.data.as_ref()
    }

    /// Returns the stored error, if any.
    pub fn error(&self) -> Option<&Arc<TransportError>> {
        self.error.as_ref()
    }

    /// Decodes the payload into `T`, if data is present.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when the payload does
    /// not match `T`.
    pub fn data_as<T>(&self) -> Result<Option<T>, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        match &self.data {
            Some(value) => serde_json::from_value(value.as_ref().clone()).map(Some),
            None => Ok(None),
        }
    }

    /// Returns `true` once the active key reached `Success` or `Error`.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, FetchStatus::Success | FetchStatus::Error)
    }
}

/// Orchestrates reads: key derivation, freshness, fetch spawning.
///
/// Cheap to clone; construct once at startup with an explicitly built
/// [`CacheStore`] and [`ResourceClient`] and hand clones to call sites.
#[derive(Clone)]
pub struct QueryEngine {
    client: ResourceClient,
    store: CacheStore,
    stale_after: Option<Duration>,
}

impl QueryEngine {
    /// Creates an engine over the given transport and store. Successful
    /// entries never go stale unless [`stale_after`](Self::stale_after) is set.
    pub fn new(client: ResourceClient, store: CacheStore) -> Self {
        Self {
            client,
            store,
            stale_after: None,
        }
    }

    /// Sets the window after which a success is refetched on re-evaluation.
    #[must_use]
    pub fn stale_after(mut self, window: Duration) -> Self {
        self.stale_after = Some(window);
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Starts a query for `request` with the gate open.
    pub fn query(&self, request: ResourceRequest) -> Query {
        self.query_when(request, true)
    }

    /// Starts a query with an explicit `enabled` gate — the dependent-query
    /// entry point. While disabled, the entry's state is exposed as-is and
    /// never mutated; flipping the gate to `true` is the single trigger
    /// condition for a fetch.
    pub fn query_when(&self, request: ResourceRequest, enabled: bool) -> Query {
        Query::new(self.clone(), request, enabled)
    }

    /// Begins a fetch for `key` unless one is already outstanding, and
    /// spawns the transport call for it.
    fn spawn_fetch(&self, key: ResourceKey, request: &ResourceRequest) {
        let FetchGate::Started(token) = self.store.begin_fetch(&key) else {
            debug!(key = %key, "fetch already in flight — joining it");
            return;
        };

        let client = self.client.clone();
        let store = self.store.clone();
        let http_request = request.to_http();
        tokio::spawn(async move {
            let result = match client.call(http_request).await {
                Ok(response) => response.json::<Value>().map_err(TransportError::from),
                Err(e) => Err(e),
            };
            // Keyed resolution: if this fetch was superseded, the store
            // discards it via the token check.
            store.resolve_fetch(&key, token, result);
        });
    }
}

/// A live read binding: one consumer's subscription to one resource.
///
/// Dropping the query only removes its listener — the cache entry and any
/// in-flight fetch are left to resolve into the store.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::cache::CacheStore;
/// use folio::client::{ClientConfig, ResourceClient};
/// use folio::query::{QueryEngine, ResourceRequest};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ResourceClient::new(ClientConfig::new("http://127.0.0.1:3001")?);
/// let engine = QueryEngine::new(client, CacheStore::new());
///
/// let mut projects = engine.query(
///     ResourceRequest::new("projects", "/project")
///         .param("page", 1)
///         .param("limit", 10),
/// );
/// let snapshot = projects.settled().await;
/// println!("{:?}", snapshot.status());
/// # Ok(())
/// # }
/// ```
pub struct Query {
    engine: QueryEngine,
    request: ResourceRequest,
    enabled: bool,
    tx: Arc<watch::Sender<QuerySnapshot>>,
    rx: watch::Receiver<QuerySnapshot>,
    subscription: Option<Subscription>,
}

impl Query {
    fn new(engine: QueryEngine, request: ResourceRequest, enabled: bool) -> Self {
        let (tx, rx) = watch::channel(QuerySnapshot::idle());
        let mut query = Self {
            engine,
            request,
            enabled,
            tx: Arc::new(tx),
            rx,
            subscription: None,
        };
        query.evaluate();
        query
    }

    /// Returns the key currently subscribed to.
    pub fn key(&self) -> ResourceKey {
        self.request.key()
    }

    /// Returns whether the fetch gate is open.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the current `{status, data, error}` view.
    pub fn snapshot(&self) -> QuerySnapshot {
        self.rx.borrow().clone()
    }

    /// Opens or closes the fetch gate. A `false → true` transition
    /// re-evaluates and is the single trigger condition for a fetch.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        self.evaluate();
    }

    /// Swaps the resource request (new page, different detail id). The new
    /// key is derived immediately; the previous key's entry — including any
    /// in-flight fetch — is left untouched.
    pub fn set_request(&mut self, request: ResourceRequest) {
        let rekey = request.key() != self.request.key();
        self.request = request;
        if rekey {
            self.evaluate();
        }
    }

    /// Forces a fetch for the active key regardless of freshness (still
    /// deduplicated against an in-flight one). The explicit retry path.
    pub fn refetch(&self) {
        if self.enabled {
            self.engine.spawn_fetch(self.request.key(), &self.request);
        }
    }

    /// Waits until the active key reaches `Success` or `Error` and returns
    /// that snapshot. Returns the current snapshot immediately when the
    /// query is disabled.
    pub async fn settled(&mut self) -> QuerySnapshot {
        loop {
            let snapshot = self.rx.borrow_and_update().clone();
            if snapshot.is_settled() || !self.enabled {
                return snapshot;
            }
            if self.rx.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }

    /// (Re-)binds to the active key and fetches if the gate allows it.
    fn evaluate(&mut self) {
        let key = self.request.key();

        // Subscribe before reading so no transition is missed, then push the
        // current state as the starting snapshot.
        self.subscription = None;
        let tx = Arc::clone(&self.tx);
        self.subscription = Some(self.engine.store.subscribe(&key, move |entry| {
            tx.send_replace(QuerySnapshot::from_entry(entry));
        }));

        let entry = self.engine.store.get_entry(&key);
        self.tx.send_replace(QuerySnapshot::from_entry(&entry));

        if !self.enabled {
            return;
        }
        if entry.is_fresh(self.engine.stale_after) || entry.is_in_flight() {
            return;
        }
        self.engine.spawn_fetch(key, &self.request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, ErrorKind};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves every connection with a JSON body echoing the requested path,
    /// counting hits.
    async fn serve_echo(hits: Arc<AtomicUsize>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                hits.fetch_add(1, AtomicOrdering::SeqCst);
                let mut buf = [0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).into_owned();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_owned();
                let body = format!("{{\"path\":\"{path}\"}}");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        addr
    }

    fn engine_for(addr: SocketAddr) -> QueryEngine {
        let config = ClientConfig::new(format!("http://{addr}")).unwrap();
        QueryEngine::new(ResourceClient::new(config), CacheStore::new())
    }

    fn projects_page_one() -> ResourceRequest {
        ResourceRequest::new("projects", "/project")
            .param("page", 1)
            .param("limit", 10)
    }

    #[tokio::test]
    async fn concurrent_identical_queries_share_one_call() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        let mut first = engine.query(projects_page_one());
        let mut second = engine.query(projects_page_one());

        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(a.status(), FetchStatus::Success);
        assert_eq!(b.status(), FetchStatus::Success);
        assert_eq!(
            a.data().unwrap().as_ref(),
            b.data().unwrap().as_ref()
        );
    }

    #[tokio::test]
    async fn fresh_success_is_served_from_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        engine.query(projects_page_one()).settled().await;
        let later = engine.query(projects_page_one());

        assert_eq!(later.snapshot().status(), FetchStatus::Success);
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_window_forces_refetch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await).stale_after(Duration::ZERO);

        engine.query(projects_page_one()).settled().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.query(projects_page_one()).settled().await;

        assert_eq!(hits.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_query_never_fetches_or_transitions() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        let query = engine.query_when(
            ResourceRequest::new("project", "/project/abc").key_component("abc"),
            false,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(query.snapshot().status(), FetchStatus::Idle);
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enabling_triggers_exactly_one_fetch_for_that_key() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        let detail = ResourceRequest::new("project", "/project/abc").key_component("abc");
        let mut query = engine.query_when(detail.clone(), false);

        query.set_enabled(true);
        let snapshot = query.settled().await;

        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(snapshot.status(), FetchStatus::Success);
        // Unrelated keys are untouched.
        let other = engine
            .store()
            .get_entry(&ResourceKey::new("projects", vec![1.into(), 10.into()]));
        assert_eq!(other.status(), FetchStatus::Idle);
    }

    #[tokio::test]
    async fn offline_query_surfaces_network_error_without_data() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let engine = engine_for(addr);
        let mut query = engine.query(projects_page_one());
        let snapshot = query.settled().await;

        assert_eq!(snapshot.status(), FetchStatus::Error);
        assert_eq!(snapshot.error().unwrap().kind(), ErrorKind::Network);
        assert!(snapshot.data().is_none());
    }

    #[tokio::test]
    async fn switching_detail_ids_displays_the_latest_selection() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        let mut detail =
            engine.query(ResourceRequest::new("project", "/project/abc").key_component("abc"));
        // Switch before the first fetch resolves.
        detail.set_request(ResourceRequest::new("project", "/project/def").key_component("def"));

        let snapshot = detail.settled().await;
        assert_eq!(
            snapshot.data().unwrap().as_ref(),
            &serde_json::json!({"path": "/project/def"})
        );

        // The superseded fetch still resolves into its own entry.
        let abc_key = ResourceKey::new("project", vec!["abc".into()]);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let entry = engine.store().get_entry(&abc_key);
            if entry.status() == FetchStatus::Success {
                assert_eq!(
                    entry.data().unwrap().as_ref(),
                    &serde_json::json!({"path": "/project/abc"})
                );
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "abc never resolved");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refetch_bypasses_freshness() {
        let hits = Arc::new(AtomicUsize::new(0));
        let engine = engine_for(serve_echo(Arc::clone(&hits)).await);

        let mut query = engine.query(projects_page_one());
        query.settled().await;
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);

        query.refetch();
        let snapshot = query.settled().await;
        assert_eq!(snapshot.status(), FetchStatus::Success);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while hits.load(AtomicOrdering::SeqCst) < 2 {
            assert!(tokio::time::Instant::now() < deadline, "refetch never hit");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
