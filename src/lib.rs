mod context;
mod error;
mod handler;
mod router;
mod server;
mod store;
mod ws;

pub mod http;

pub use async_trait::async_trait;

pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{DynHandler, Handler, IntoHandlers};
pub use crate::http::{Request, Response};
pub use server::{panic_message, Server};
pub use store::Store;
pub use ws::{BoxIo, Io, Message, Upgrade, WebSocket};
