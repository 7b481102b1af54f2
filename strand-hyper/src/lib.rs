//! Serve a [`strand::Server`] over hyper.
//!
//! Ordinary requests flow through [`strand::Server::serve_one`] and back
//! out as hyper responses. WebSocket routes need one extra move: the
//! pipeline blocks inside the streaming session, so when it commits to an
//! upgrade mid-request, this adapter immediately answers
//! `101 Switching Protocols` and leaves the pipeline running on its own
//! task, wired to the connection hyper hands over.

use std::convert::Infallible;
use std::future::{ready, Future, Ready};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, Either};
use futures::Stream;
use hyper::server::conn::AddrIncoming;
use hyper::service::Service;
use strand::http::{header, Body, Bytes, HeaderValue, StatusCode};
use strand::{BoxIo, Upgrade};
use tokio::sync::oneshot;

pub use hyper::Server;

/// Entry points for serving a [`strand::Server`] over hyper.
pub trait Serve {
    fn serve(self, addr: SocketAddr) -> hyper::Server<AddrIncoming, StrandMakeService>;
    fn into_make_service(self) -> StrandMakeService;
    fn into_service(self) -> StrandService;
}

impl Serve for strand::Server {
    fn serve(self, addr: SocketAddr) -> hyper::Server<AddrIncoming, StrandMakeService> {
        hyper::Server::bind(&addr).serve(self.into_make_service())
    }

    fn into_make_service(self) -> StrandMakeService {
        StrandMakeService {
            service: self.into_service(),
        }
    }

    fn into_service(self) -> StrandService {
        StrandService {
            server: Arc::new(self),
        }
    }
}

pub struct StrandMakeService {
    service: StrandService,
}

impl<T> Service<T> for StrandMakeService {
    type Response = StrandService;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _: T) -> Self::Future {
        ready(Ok(self.service.clone()))
    }
}

pub struct StrandService {
    server: Arc<strand::Server>,
}

impl Service<hyper::Request<hyper::Body>> for StrandService {
    type Response = hyper::Response<StrandHttpBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: hyper::Request<hyper::Body>) -> Self::Future {
        let on_upgrade = hyper::upgrade::on(&mut req);
        let (commit, committed) = oneshot::channel::<String>();

        let upgrade = Upgrade::new(move |accept: String| async move {
            let _ = commit.send(accept);
            let upgraded = on_upgrade
                .await
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
            Ok(Box::new(upgraded) as BoxIo)
        });

        let (parts, body) = req.into_parts();
        let mut request = strand::Request::new(parts.method, parts.uri)
            .body(Body::stream(body))
            .with_upgrade(upgrade);
        request.version = parts.version;
        request.headers = parts.headers;

        let server = self.server.clone();

        Box::pin(async move {
            let serve = Box::pin(async move { server.serve_one(request).await });

            match future::select(serve, committed).await {
                Either::Left((response, _)) => Ok(into_hyper(response)),
                Either::Right((Ok(accept), serve)) => {
                    // The pipeline is now blocked inside the streaming
                    // session; answer the handshake and let the session
                    // run out on its own task.
                    tracing::debug!("upgrade committed, detaching pipeline");
                    tokio::spawn(serve);
                    Ok(switching_protocols(&accept))
                }
                Either::Right((Err(_), serve)) => Ok(into_hyper(serve.await)),
            }
        })
    }
}

impl Clone for StrandService {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
        }
    }
}

fn into_hyper(response: strand::Response) -> hyper::Response<StrandHttpBody> {
    let mut out = hyper::Response::new(StrandHttpBody {
        inner: response.body,
    });
    *out.status_mut() = response.status;
    *out.version_mut() = response.version;
    *out.headers_mut() = response.headers;
    out
}

fn switching_protocols(accept: &str) -> hyper::Response<StrandHttpBody> {
    let mut response = hyper::Response::new(StrandHttpBody {
        inner: Body::empty(),
    });
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;

    let headers = response.headers_mut();
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    if let Ok(value) = HeaderValue::from_str(accept) {
        headers.insert(header::SEC_WEBSOCKET_ACCEPT, value);
    }

    response
}

pub struct StrandHttpBody {
    inner: Body,
}

impl http_body::Body for StrandHttpBody {
    type Data = Bytes;
    type Error = strand::BoxError;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
    ) -> Poll<Result<Option<hyper::HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn size_hint(&self) -> http_body::SizeHint {
        let (lower, upper) = self.inner.size_hint();

        let mut hint = http_body::SizeHint::new();
        hint.set_lower(lower as _);
        if let Some(upper) = upper {
            hint.set_upper(upper as _);
        }
        hint
    }
}
