//! HTTP/1.1 request builder.
//!
//! Provides a fluent builder API for constructing outgoing requests and
//! serializing them to a byte buffer for transmission over TCP.

use bytes::{BufMut, BytesMut};

use super::{Headers, Method};

/// An outgoing HTTP/1.1 request, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use folio::http::{Method, Request};
///
/// let request = Request::new(Method::Get, "/project")
///     .query("page", "1")
///     .query("limit", "10");
///
/// let bytes = request.into_bytes("api.example.com");
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /project?page=1&limit=10 HTTP/1.1\r\n"));
/// assert!(text.contains("Host: api.example.com\r\n"));
/// assert!(text.contains("Connection: close\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Headers,
    body: Vec<u8>,
}

impl Request {
    /// Creates a new request for the given method and path (no query, empty body).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Appends a query-string parameter. Values are percent-encoded on serialization.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body, serializing `payload` and marking the content type.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if `payload` cannot be
    /// serialized.
    pub fn json<T: serde::Serialize + ?Sized>(
        mut self,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        self.body = serde_json::to_vec(payload)?;
        self.headers.insert("Content-Type", "application/json");
        Ok(self)
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Prepends the base address path prefix, if the configured base URL has one.
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.path = format!("{prefix}{}", self.path);
        }
        self
    }

    /// Serializes the request into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Host: <host>` (always first).
    /// - `Accept: application/json` unless already set.
    /// - `Content-Length: <n>` when the body is non-empty.
    /// - `Connection: close` — the transport uses one connection per call.
    pub fn into_bytes(self, host: &str) -> BytesMut {
        let target = if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, encode_query(&self.query))
        };

        let estimated_size = 128 + self.headers.len() * 64 + target.len() + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Request line
        buf.put(format!("{} {} HTTP/1.1\r\n", self.method.as_str(), target).as_bytes());

        // Host first, then caller-supplied headers in insertion order
        buf.put(format!("Host: {host}\r\n").as_bytes());
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        if !self.headers.contains("accept") {
            buf.put(&b"Accept: application/json\r\n"[..]);
        }
        if !self.body.is_empty() {
            buf.put(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        buf.put(&b"Connection: close\r\n"[..]);

        // Header/body separator
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}

/// Encodes query pairs as `key=value&key2=value2` with percent-encoding.
fn encode_query(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        encode_component(key, &mut out);
        out.push('=');
        encode_component(value, &mut out);
    }
    out
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_component(input: &str, out: &mut String) {
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
}
