use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode, Version};

use super::Body;

/// An outbound HTTP response.
pub struct Response {
    /// The response's status.
    pub status: StatusCode,

    /// The response's version.
    pub version: Version,

    /// The response's headers.
    pub headers: HeaderMap,

    /// The response body.
    pub body: Body,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            version: Version::default(),
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// Set the status.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a chunk to the body.
    pub fn write(&mut self, chunk: impl Into<Bytes>) {
        self.body.append(chunk.into());
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
