//! The streaming upgrade adapter and the upgraded-connection API.

use std::future::Future;
use std::io;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use http::{header, StatusCode};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

pub use tokio_tungstenite::tungstenite::Message;

use crate::http::Request;
use crate::{Context, Error, Handler};

/// A byte stream a connection can continue on after a protocol switch.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// The raw upgraded byte stream, type-erased.
pub type BoxIo = Box<dyn Io>;

/// A transport-supplied, one-shot handle that completes a protocol upgrade.
///
/// How the `101 Switching Protocols` status reaches the peer is the
/// transport's business; invoking the handle with the derived
/// `Sec-WebSocket-Accept` value commits to the upgrade and resolves to the
/// raw byte stream once the switch has happened.
pub struct Upgrade {
    perform: Box<dyn FnOnce(String) -> BoxFuture<'static, io::Result<BoxIo>> + Send>,
}

impl Upgrade {
    pub fn new<F, Fut>(perform: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<BoxIo>> + Send + 'static,
    {
        Self {
            perform: Box::new(move |accept| Box::pin(perform(accept))),
        }
    }

    pub(crate) async fn perform(self, accept: String) -> io::Result<BoxIo> {
        (self.perform)(accept).await
    }
}

/// An active WebSocket session.
///
/// Clonable: the connected handler can share the session with a task it
/// cooperates with. Sends and receives serialize on an internal async lock.
#[derive(Clone)]
pub struct WebSocket {
    stream: Arc<Mutex<WebSocketStream<BoxIo>>>,
}

impl WebSocket {
    pub(crate) fn new(stream: WebSocketStream<BoxIo>) -> Self {
        Self {
            stream: Arc::new(Mutex::new(stream)),
        }
    }

    /// Send a value to the peer as a JSON text message.
    pub async fn send_json<T>(&self, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(value)?;
        self.send(Message::text(text)).await
    }

    /// Send a raw protocol message.
    pub async fn send(&self, message: Message) -> Result<(), Error> {
        self.stream.lock().await.send(message).await.map_err(Error::from)
    }

    /// Receive the next message; `None` once the connection has closed.
    pub async fn recv(&self) -> Option<Result<Message, Error>> {
        let mut stream = self.stream.lock().await;
        stream.next().await.map(|result| result.map_err(Error::from))
    }

    /// Send a close frame to the peer.
    pub async fn close(&self) -> Result<(), Error> {
        self.stream.lock().await.close(None).await.map_err(Error::from)
    }

    /// The raw connection handle.
    pub fn stream(&self) -> Arc<Mutex<WebSocketStream<BoxIo>>> {
        Arc::clone(&self.stream)
    }
}

/// The upgrade stage of a streaming route's chain.
///
/// On a valid handshake it completes the protocol switch, installs the
/// session into the context, and drives the rest of the chain (the
/// connected application logic) for the lifetime of the connection. On an
/// invalid one it leaves a client error in the response and halts so no
/// user handler runs.
pub(crate) struct WsUpgrade;

#[async_trait::async_trait]
impl Handler for WsUpgrade {
    async fn call(&self, cx: Context) {
        let accept = match accept_key(cx.request()) {
            Some(accept) => accept,
            None => return reject(&cx),
        };

        let upgrade = match cx.request().take_upgrade() {
            Some(upgrade) => upgrade,
            None => return reject(&cx),
        };

        match upgrade.perform(accept).await {
            Ok(io) => {
                let stream = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                cx.install_websocket(WebSocket::new(stream));

                tracing::debug!(path = cx.path(), "websocket session opened");
                cx.next().await;

                if let Some(websocket) = cx.websocket() {
                    let _ = websocket.close().await;
                }
                tracing::debug!(path = cx.path(), "websocket session closed");
            }
            Err(err) => {
                tracing::debug!(error = %err, "websocket upgrade failed");
            }
        }

        // If the switch never happened, the handshake response owns the
        // wire; make sure dispatch does not run more handlers.
        if cx.websocket().is_none() {
            reject(&cx);
        }
    }
}

fn reject(cx: &Context) {
    cx.status(StatusCode::BAD_REQUEST);
    cx.halt();
}

/// Validate the RFC 6455 handshake and derive the accept key.
fn accept_key(request: &Request) -> Option<String> {
    let headers = &request.headers;

    let connection = headers.get(header::CONNECTION)?.to_str().ok()?;
    if !connection
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return None;
    }

    let upgrade = headers.get(header::UPGRADE)?.to_str().ok()?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return None;
    }

    if headers.get(header::SEC_WEBSOCKET_VERSION)?.to_str().ok()? != "13" {
        return None;
    }

    let key = headers.get(header::SEC_WEBSOCKET_KEY)?.to_str().ok()?;
    Some(derive_accept_key(key.as_bytes()))
}
