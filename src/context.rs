use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{header, Method, StatusCode};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;

use crate::handler::DynHandler;
use crate::http::{Request, Response};
use crate::store::Store;
use crate::ws::WebSocket;
use crate::Error;

/// The execution context of a single inbound request.
///
/// One context exists per request; it is handed to every handler in the
/// request's chain and destroyed when the request completes (or, for an
/// upgraded connection, when the streaming session ends). The handle is a
/// cheap clone; all clones observe the same request, response, store, and
/// chain position.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    request: Request,
    response: Mutex<Response>,
    params: Vec<(String, String)>,
    store: Store,
    handlers: Arc<Vec<DynHandler>>,
    chain: Mutex<Chain>,
    websocket: Mutex<Option<WebSocket>>,
}

struct Chain {
    cursor: usize,
    stopped: bool,
}

impl Context {
    pub(crate) fn new(
        request: Request,
        params: Vec<(String, String)>,
        handlers: Arc<Vec<DynHandler>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                request,
                response: Mutex::new(Response::new()),
                params,
                store: Store::new(),
                handlers,
                chain: Mutex::new(Chain { cursor: 0, stopped: false }),
                websocket: Mutex::new(None),
            }),
        }
    }

    /// The inbound request.
    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.inner.request.method
    }

    /// The request path.
    pub fn path(&self) -> &str {
        self.inner.request.uri.path()
    }

    /// Whether the request was made with the given method.
    pub fn is_method(&self, method: &Method) -> bool {
        self.inner.request.method == *method
    }

    /// A named route parameter, as extracted by the router.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner
            .params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// All route parameters, in pattern order.
    pub fn params(&self) -> &[(String, String)] {
        &self.inner.params
    }

    /// Collect the request body.
    ///
    /// The body can be collected once; a second call returns
    /// [`Error::BodyConsumed`].
    pub async fn body(&self) -> Result<Bytes, Error> {
        match self.inner.request.body.take() {
            Some(body) => body.bytes().await.map_err(Error::Body),
            None => Err(Error::BodyConsumed),
        }
    }

    /// Store a request-scoped value under `key` for later stages.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.inner.store.set(key, value);
    }

    /// Read a request-scoped value stored by an earlier stage.
    ///
    /// `None` covers both an unset key and a value of a different type.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.inner.store.get(key)
    }

    /// A handle to the underlying store.
    pub fn store(&self) -> Store {
        self.inner.store.clone()
    }

    /// Exclusive access to the response under construction.
    ///
    /// Release the guard before awaiting anything.
    pub fn response(&self) -> MutexGuard<'_, Response> {
        self.inner.response.lock()
    }

    /// Set the response status.
    pub fn status(&self, status: StatusCode) {
        self.inner.response.lock().status = status;
    }

    /// Set a response header.
    pub fn header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response.lock().headers.insert(name, value);
    }

    /// Append a chunk to the response body.
    pub fn write(&self, chunk: impl Into<Bytes>) {
        self.inner.response.lock().write(chunk);
    }

    /// Respond with plain text.
    pub fn text(&self, text: impl Into<Bytes>) {
        let mut response = self.inner.response.lock();
        response
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response.write(text);
    }

    /// Respond with a JSON-encoded value.
    pub fn json<T>(&self, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(value)?;
        let mut response = self.inner.response.lock();
        response
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.write(body);
        Ok(())
    }

    /// Hand control to the rest of the chain and resume when it finishes.
    ///
    /// The calling handler stays on the stack: code after `next().await`
    /// runs once every later stage has returned, which is how before/after
    /// middleware is written. When a later stage is a streaming session,
    /// this call blocks for the session's whole lifetime.
    ///
    /// Past the end of the chain this is a no-op.
    pub async fn next(&self) {
        self.advance();
        self.run().await;
    }

    /// Stop the chain: no handler after the current one will run.
    ///
    /// Takes effect at the next stop check; the currently-running handler
    /// is never interrupted. Idempotent.
    pub fn halt(&self) {
        self.inner.chain.lock().stopped = true;
    }

    /// The upgraded connection, once a streaming upgrade has happened.
    pub fn websocket(&self) -> Option<WebSocket> {
        self.inner.websocket.lock().clone()
    }

    /// Send a JSON message over the upgraded connection.
    pub async fn send_json<T>(&self, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        match self.websocket() {
            Some(websocket) => websocket.send_json(value).await,
            None => Err(Error::NotUpgraded),
        }
    }

    pub(crate) fn install_websocket(&self, websocket: WebSocket) {
        *self.inner.websocket.lock() = Some(websocket);
    }

    // Cursor increments saturate at the chain length, so the cursor always
    // stays within `0..=handlers.len()`.
    fn advance(&self) {
        let mut chain = self.inner.chain.lock();
        chain.cursor = (chain.cursor + 1).min(self.inner.handlers.len());
    }

    /// The dispatch loop: invoke `handlers[cursor]`, advance, and check the
    /// stop flag, until the chain is exhausted or stopped. Invoked exactly
    /// once per request by the server; re-entered by [`next`](Self::next).
    pub(crate) async fn run(&self) {
        loop {
            let handler = {
                let chain = self.inner.chain.lock();
                if chain.stopped || chain.cursor >= self.inner.handlers.len() {
                    return;
                }
                Arc::clone(&self.inner.handlers[chain.cursor])
            };

            handler.call(self.clone()).await;

            self.advance();
            if self.inner.chain.lock().stopped {
                return;
            }
        }
    }

    pub(crate) fn finish(self) -> Response {
        std::mem::take(&mut *self.inner.response.lock())
    }
}
