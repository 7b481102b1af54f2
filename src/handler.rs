//! Asynchronous stages of a request's handler chain.

use std::future::Future;
use std::sync::Arc;

use crate::Context;

/// One stage of a handler chain.
///
/// A handler receives the request's [`Context`] and either completes (the
/// enclosing run loop continues with its successor), calls
/// [`Context::next`] to drive the rest of the chain before it returns, or
/// calls [`Context::halt`] to end the chain.
///
/// Implemented for any `async fn(Context)` and for async closures; implement
/// it directly (with [`async_trait`](crate::async_trait)) for stateful
/// stages.
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, cx: Context);
}

/// A reference-counted, type-erased [`Handler`].
///
/// Chains share global middleware, so stages are `Arc`ed rather than boxed.
pub type DynHandler = Arc<dyn Handler>;

#[async_trait::async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn call(&self, cx: Context) {
        self(cx).await
    }
}

/// A handler list for route registration: a single handler or a tuple of
/// handlers, executed in order.
///
/// The marker parameter `M` keeps the single-handler and tuple impls
/// coherent; it is always inferred.
pub trait IntoHandlers<M> {
    fn into_handlers(self) -> Vec<DynHandler>;
}

impl<H> IntoHandlers<()> for H
where
    H: Handler,
{
    fn into_handlers(self) -> Vec<DynHandler> {
        vec![Arc::new(self)]
    }
}

macro_rules! tuple_handlers {
    ($( ($($H:ident),+) ),* $(,)?) => {$(
        #[allow(non_snake_case)]
        impl<$($H),+> IntoHandlers<($($H,)+)> for ($($H,)+)
        where
            $($H: Handler),+
        {
            fn into_handlers(self) -> Vec<DynHandler> {
                let ($($H,)+) = self;
                vec![$(Arc::new($H) as DynHandler),+]
            }
        }
    )*}
}

tuple_handlers! {
    (H1, H2),
    (H1, H2, H3),
    (H1, H2, H3, H4),
    (H1, H2, H3, H4, H5),
}
