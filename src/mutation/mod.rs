//! Mutation engine — one-shot write operations, uncached and unkeyed.
//!
//! A [`Mutation`] tracks per-call state (`Idle → Pending → Success/Error`)
//! for one mutation site and invokes per-call completion callbacks. It never
//! touches the cache store: writes have no resource identity to cache under.
//!
//! Concurrent triggers are allowed by design — no dedup, no queueing — and
//! the last completion to land wins the visible status. Callers wanting
//! exactly-once submission disable their submit control while
//! [`Mutation::is_pending`] holds, the way the contact form does.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::client::{ResourceClient, TransportError};
use crate::http::{Method, Request, Response};

/// Write-path lifecycle of one mutation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    /// No trigger has been issued yet.
    #[default]
    Idle,
    /// A triggered call is outstanding.
    Pending,
    /// The most recently completed call succeeded.
    Success,
    /// The most recently completed call failed.
    Error,
}

/// Describes one write endpoint.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    method: Method,
    path: String,
}

impl MutationRequest {
    /// A POST mutation against `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
        }
    }
}

/// Per-call completion callbacks, invoked after the transport call lands.
///
/// Mirrors the caller-side contract of the read path's subscription: the
/// success callback receives the raw response, the error callback the
/// transport error (whose [`message`](TransportError::message) is the
/// user-facing text).
#[derive(Default)]
pub struct MutationCallbacks {
    on_success: Option<Box<dyn FnOnce(Response) + Send>>,
    on_error: Option<Box<dyn FnOnce(&TransportError) + Send>>,
}

impl MutationCallbacks {
    /// No callbacks; status tracking only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked with the response when the call succeeds.
    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce(Response) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Invoked with the error when the call fails.
    #[must_use]
    pub fn on_error(mut self, callback: impl FnOnce(&TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

// Ephemeral per-site state; discarded with the Mutation itself.
#[derive(Default)]
struct MutationCall {
    status: MutationStatus,
    last_error: Option<Arc<TransportError>>,
}

/// Hands out [`Mutation`] handles over a shared transport.
#[derive(Clone)]
pub struct MutationEngine {
    client: ResourceClient,
}

impl MutationEngine {
    /// Creates an engine over the given transport.
    pub fn new(client: ResourceClient) -> Self {
        Self { client }
    }

    /// Creates a mutation site for `request`, starting `Idle`.
    pub fn mutation(&self, request: MutationRequest) -> Mutation {
        Mutation {
            client: self.client.clone(),
            request,
            call: Arc::new(Mutex::new(MutationCall::default())),
        }
    }
}

/// One mutation site: a write endpoint plus its per-call state.
///
/// # Examples
///
/// ```rust,no_run
/// use folio::client::{ClientConfig, ResourceClient};
/// use folio::mutation::{MutationCallbacks, MutationEngine, MutationRequest};
///
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ResourceClient::new(ClientConfig::new("http://127.0.0.1:3001")?);
/// let engine = MutationEngine::new(client);
///
/// let send_mail = engine.mutation(MutationRequest::post("/mail"));
/// send_mail.trigger(
///     &serde_json::json!({"name": "Ada", "email": "ada@example.com"}),
///     MutationCallbacks::new()
///         .on_success(|_| println!("sent"))
///         .on_error(|e| eprintln!("{}", e.message())),
/// );
/// # Ok(())
/// # }
/// ```
pub struct Mutation {
    client: ResourceClient,
    request: MutationRequest,
    call: Arc<Mutex<MutationCall>>,
}

impl Mutation {
    /// Returns the visible status of this site.
    pub fn status(&self) -> MutationStatus {
        self.lock().status
    }

    /// Returns `true` while a triggered call is outstanding.
    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    /// Returns the error of the most recent failed call, if any.
    pub fn last_error(&self) -> Option<Arc<TransportError>> {
        self.lock().last_error.clone()
    }

    /// Fires the write: transitions to `Pending`, performs exactly one
    /// transport call, then transitions to `Success`/`Error` and invokes the
    /// matching callback. Failure is terminal for this call — retrying takes
    /// an explicit new `trigger`.
    pub fn trigger<P>(&self, payload: &P, callbacks: MutationCallbacks)
    where
        P: serde::Serialize + ?Sized,
    {
        self.lock().status = MutationStatus::Pending;
        debug!(path = %self.request.path, "mutation triggered");

        let request = match Request::new(self.request.method, self.request.path.clone()).json(payload)
        {
            Ok(request) => request,
            Err(e) => {
                // Unserializable payload: fail the call without a transport hit.
                self.complete_error(TransportError::Decode(e), callbacks.on_error);
                return;
            }
        };

        let client = self.client.clone();
        let call = Arc::clone(&self.call);
        let path = self.request.path.clone();
        tokio::spawn(async move {
            match client.call(request).await {
                Ok(response) => {
                    {
                        let mut call = call.lock().expect("mutation state lock poisoned");
                        call.status = MutationStatus::Success;
                        call.last_error = None;
                    }
                    debug!(path = %path, "mutation succeeded");
                    if let Some(on_success) = callbacks.on_success {
                        on_success(response);
                    }
                }
                Err(error) => {
                    let error = Arc::new(error);
                    {
                        let mut call = call.lock().expect("mutation state lock poisoned");
                        call.status = MutationStatus::Error;
                        call.last_error = Some(Arc::clone(&error));
                    }
                    warn!(path = %path, error = %error, "mutation failed");
                    if let Some(on_error) = callbacks.on_error {
                        on_error(&error);
                    }
                }
            }
        });
    }

    fn complete_error(
        &self,
        error: TransportError,
        on_error: Option<Box<dyn FnOnce(&TransportError) + Send>>,
    ) {
        let error = Arc::new(error);
        {
            let mut call = self.lock();
            call.status = MutationStatus::Error;
            call.last_error = Some(Arc::clone(&error));
        }
        warn!(path = %self.request.path, error = %error, "mutation failed before transport");
        if let Some(on_error) = on_error {
            on_error(&error);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MutationCall> {
        self.call.lock().expect("mutation state lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, ErrorKind};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn serve_once(raw: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(raw.as_bytes()).await;
            }
        });
        addr
    }

    fn engine_for(addr: SocketAddr) -> MutationEngine {
        let config = ClientConfig::new(format!("http://{addr}")).unwrap();
        MutationEngine::new(ResourceClient::new(config))
    }

    fn mail_payload() -> serde_json::Value {
        serde_json::json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "subject": "Hello",
            "message": "Nice portfolio."
        })
    }

    #[tokio::test]
    async fn successful_trigger_runs_success_callback() {
        let addr = serve_once("HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n").await;
        let mutation = engine_for(addr).mutation(MutationRequest::post("/mail"));

        let (tx, rx) = oneshot::channel();
        mutation.trigger(
            &mail_payload(),
            MutationCallbacks::new().on_success(move |response| {
                let _ = tx.send(response.status().as_u16());
            }),
        );

        // Pending is set synchronously, before the transport call lands.
        assert!(mutation.is_pending());

        assert_eq!(rx.await.unwrap(), 201);
        assert_eq!(mutation.status(), MutationStatus::Success);
        assert!(mutation.last_error().is_none());
    }

    #[tokio::test]
    async fn rejected_payload_surfaces_server_message() {
        let addr = serve_once(
            "HTTP/1.1 422 Unprocessable Entity\r\nContent-Type: application/json\r\nContent-Length: 27\r\n\r\n{\"message\":\"Invalid email\"}",
        )
        .await;
        let mutation = engine_for(addr).mutation(MutationRequest::post("/mail"));

        let (tx, rx) = oneshot::channel();
        mutation.trigger(
            &mail_payload(),
            MutationCallbacks::new().on_error(move |error| {
                let _ = tx.send(error.message());
            }),
        );

        assert_eq!(rx.await.unwrap(), "Invalid email");
        assert_eq!(mutation.status(), MutationStatus::Error);
        assert_eq!(
            mutation.last_error().unwrap().kind(),
            ErrorKind::HttpStatus
        );
    }

    #[tokio::test]
    async fn failure_is_terminal_until_retriggered() {
        // Nothing listening: first trigger fails.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mutation = engine_for(addr).mutation(MutationRequest::post("/mail"));

        let (tx, rx) = oneshot::channel();
        mutation.trigger(
            &mail_payload(),
            MutationCallbacks::new().on_error(move |error| {
                let _ = tx.send(error.kind());
            }),
        );
        assert_eq!(rx.await.unwrap(), ErrorKind::Network);
        assert_eq!(mutation.status(), MutationStatus::Error);

        // An explicit new trigger is the only retry path.
        let addr = serve_once("HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await;
        let retry = engine_for(addr).mutation(MutationRequest::post("/mail"));
        let (tx, rx) = oneshot::channel();
        retry.trigger(
            &mail_payload(),
            MutationCallbacks::new().on_success(move |_| {
                let _ = tx.send(());
            }),
        );
        rx.await.unwrap();
        assert_eq!(retry.status(), MutationStatus::Success);
    }
}
