use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri, Version};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use super::Body;
use crate::error::Error;
use crate::ws::Upgrade;

/// An inbound HTTP request.
pub struct Request {
    /// The request's method.
    pub method: Method,

    /// The request's URI.
    pub uri: Uri,

    /// The request's version.
    pub version: Version,

    /// The request's headers.
    pub headers: HeaderMap,

    /// The request body.
    pub body: Body,

    // One-shot protocol-upgrade handle, installed by the transport.
    upgrade: Mutex<Option<Upgrade>>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::default(),
            headers: HeaderMap::new(),
            body: Body::empty(),
            upgrade: Mutex::new(None),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a protocol-upgrade handle.
    pub fn with_upgrade(self, upgrade: Upgrade) -> Self {
        *self.upgrade.lock() = Some(upgrade);
        self
    }

    /// The request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Decode the query string.
    pub fn query<T>(&self) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let query = self.uri.query().unwrap_or("");
        serde_urlencoded::from_str(query).map_err(Error::from)
    }

    pub(crate) fn take_upgrade(&self) -> Option<Upgrade> {
        self.upgrade.lock().take()
    }
}
