//! HTTP/1.1 response parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors that can occur while parsing an HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A fully parsed HTTP/1.1 response.
///
/// Created by [`Response::parse`] from a raw byte buffer. The body is stored
/// as a [`Bytes`] buffer holding whatever followed the header terminator at
/// parse time; the transport re-parses once the full body has arrived.
///
/// # Examples
///
/// ```
/// use folio::http::Response;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n[]";
/// let (response, offset) = Response::parse(raw).unwrap();
///
/// assert_eq!(response.status().as_u16(), 200);
/// assert_eq!(response.content_length(), Some(2));
/// assert_eq!(&raw[offset..], b"[]");
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Maximum number of headers we support per response.
    const MAX_HEADERS: usize = 64;

    /// Parse a raw HTTP/1.1 response from a byte slice.
    ///
    /// Returns the parsed `Response` and the byte offset at which the body
    /// begins in `buf` (i.e. immediately after the `\r\n\r\n` header
    /// terminator).
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`] — more data is needed to complete the response headers.
    /// - [`ResponseError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`ResponseError::MissingField`] — the status code is absent from the status line.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_resp = httparse::Response::new(&mut headers);

        let body_offset = match raw_resp.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let status = raw_resp
            .code
            .ok_or(ResponseError::MissingField { field: "status" })?;

        let mut header_map = Headers::with_capacity(raw_resp.headers.len());
        for header in raw_resp.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                status: StatusCode::new(status),
                headers: header_map,
                body,
            },
            body_offset,
        ))
    }

    /// Returns the response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body decoded as UTF-8, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }

    /// Deserializes the body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the body is not valid
    /// JSON for `T`.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_ok() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}";
        let (resp, offset) = Response::parse(raw).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type"), Some("application/json"));
        assert_eq!(resp.content_length(), Some(2));
        assert_eq!(&raw[offset..], b"{}");
    }

    #[test]
    fn parse_error_status() {
        let raw = b"HTTP/1.1 422 Unprocessable Entity\r\nContent-Length: 27\r\n\r\n{\"message\":\"Invalid email\"}";
        let (resp, _) = Response::parse(raw).unwrap();
        assert!(resp.status().is_client_error());
        assert_eq!(resp.body_text(), "{\"message\":\"Invalid email\"}");
    }

    #[test]
    fn incomplete_headers() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Len";
        assert!(matches!(
            Response::parse(raw),
            Err(ResponseError::Incomplete)
        ));
    }

    #[test]
    fn json_body_decoding() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 13\r\n\r\n{\"total\":42}\n";
        let (resp, _) = Response::parse(raw).unwrap();
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["total"], 42);
    }

    #[test]
    fn missing_content_length() {
        let raw = b"HTTP/1.1 204 No Content\r\n\r\n";
        let (resp, _) = Response::parse(raw).unwrap();
        assert_eq!(resp.content_length(), None);
        assert!(resp.body().is_empty());
    }
}
