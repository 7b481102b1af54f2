use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::header::HeaderValue;
use http::{header, Method, StatusCode};

use crate::context::Context;
use crate::handler::{DynHandler, IntoHandlers};
use crate::http::{Request, Response};
use crate::router::{Lookup, Router};
use crate::ws::WsUpgrade;

type FallbackFn = Arc<dyn Fn(&Request, &mut Response) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&Request, &mut Response, Box<dyn Any + Send>) + Send + Sync>;

/// The dispatch registrar: routes, global middleware, and the fallback
/// callbacks for requests that never reach a chain.
///
/// Registration is a consuming builder. A route's chain (the global
/// middleware registered so far, then the route's own handlers) is frozen
/// at declaration time; per inbound request, [`serve_one`](Self::serve_one)
/// builds a fresh [`Context`] and runs that chain exactly once.
pub struct Server {
    router: Router,
    middleware: Vec<DynHandler>,
    not_found: FallbackFn,
    method_not_allowed: FallbackFn,
    error: ErrorFn,
}

macro_rules! insert_route {
    ($name:ident => Method::$method:ident) => {
        #[doc = concat!("Register a route for the `", stringify!($method), "` method.")]
        pub fn $name<P, H, M>(self, pattern: P, handlers: H) -> Self
        where
            P: Into<String>,
            H: IntoHandlers<M>,
        {
            self.route(Method::$method, pattern, handlers)
        }
    };
}

impl Server {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            middleware: Vec::new(),
            not_found: Arc::new(|_req, response: &mut Response| {
                response.status = StatusCode::NOT_FOUND;
                response.write("Not Found");
            }),
            method_not_allowed: Arc::new(|_req, response: &mut Response| {
                response.status = StatusCode::METHOD_NOT_ALLOWED;
                response.write("Method Not Allowed");
            }),
            error: Arc::new(|_req, response: &mut Response, _panic| {
                response.status = StatusCode::INTERNAL_SERVER_ERROR;
                response.write("Internal Server Error");
            }),
        }
    }

    /// Register a global middleware stage, run for every route declared
    /// after it, in registration order.
    pub fn wrap(mut self, handler: impl crate::Handler) -> Self {
        self.middleware.push(Arc::new(handler));
        self
    }

    /// Register a route.
    pub fn route<P, H, M>(self, method: Method, pattern: P, handlers: H) -> Self
    where
        P: Into<String>,
        H: IntoHandlers<M>,
    {
        self.route_chain(method, &pattern.into(), handlers.into_handlers())
    }

    insert_route!(delete => Method::DELETE);
    insert_route!(get => Method::GET);
    insert_route!(head => Method::HEAD);
    insert_route!(post => Method::POST);
    insert_route!(put => Method::PUT);

    /// Register a WebSocket route, served under `GET` semantics.
    ///
    /// The upgrade stage is spliced in immediately before the *last*
    /// handler: earlier handlers in the list run before the handshake (and
    /// can [`halt`](Context::halt) it), while the final handler is the
    /// connected application logic and runs for the whole session.
    pub fn ws<P, H, M>(self, pattern: P, handlers: H) -> Self
    where
        P: Into<String>,
        H: IntoHandlers<M>,
    {
        let mut handlers = handlers.into_handlers();
        assert!(!handlers.is_empty(), "websocket routes require a connected handler");
        handlers.insert(handlers.len() - 1, Arc::new(WsUpgrade));

        self.route_chain(Method::GET, &pattern.into(), handlers)
    }

    fn route_chain(mut self, method: Method, pattern: &str, handlers: Vec<DynHandler>) -> Self {
        let chain: Vec<DynHandler> = self.middleware.iter().cloned().chain(handlers).collect();

        self.router
            .route(method, pattern, Arc::new(chain))
            .expect("failed to insert route");
        self
    }

    /// Replace the not-found responder.
    pub fn not_found<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.not_found = Arc::new(callback);
        self
    }

    /// Replace the method-not-allowed responder.
    pub fn method_not_allowed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Request, &mut Response) + Send + Sync + 'static,
    {
        self.method_not_allowed = Arc::new(callback);
        self
    }

    /// Replace the responder for handlers that panic.
    ///
    /// The callback receives the response sink, the request, and the panic
    /// payload (see [`panic_message`]).
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Request, &mut Response, Box<dyn Any + Send>) + Send + Sync + 'static,
    {
        self.error = Arc::new(callback);
        self
    }

    /// Serve a single request through its handler chain.
    ///
    /// For an upgraded connection this future runs for the whole session;
    /// the transport decides what to do with the returned response in that
    /// case (the handshake already owns the wire).
    pub async fn serve_one(&self, request: Request) -> Response {
        tracing::debug!(method = %request.method, path = request.uri.path(), "dispatching request");

        match self.router.lookup(&request.method, request.uri.path()) {
            Lookup::Route { handlers, params } => {
                let cx = Context::new(request, params, handlers);
                let outcome = AssertUnwindSafe(cx.run()).catch_unwind().await;

                match outcome {
                    Ok(()) => cx.finish(),
                    Err(panic) => {
                        tracing::error!(panic = panic_message(&*panic), "handler panicked");

                        let mut response = Response::new();
                        (self.error)(cx.request(), &mut response, panic);
                        response
                    }
                }
            }
            Lookup::NotFound => {
                let mut response = Response::new();
                (self.not_found)(&request, &mut response);
                response
            }
            Lookup::MethodNotAllowed { allowed } => {
                let mut response = Response::new();
                if let Ok(value) = HeaderValue::try_from(allowed) {
                    response.headers.insert(header::ALLOW, value);
                }
                (self.method_not_allowed)(&request, &mut response);
                response
            }
            Lookup::Redirect { location } => {
                let mut response = Response::new().status(StatusCode::PERMANENT_REDIRECT);
                if let Ok(value) = HeaderValue::try_from(location) {
                    response.headers.insert(header::LOCATION, value);
                }
                response
            }
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// A readable rendering of a panic payload, for error callbacks and logs.
pub fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
