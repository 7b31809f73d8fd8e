//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one table, and every
//! middleware layer turns one handler into another. Both need a single
//! concrete type, so handlers are hidden behind the [`ErasedHandler`] trait
//! object:
//!
//! ```text
//! async fn test(ctx: Context, req: Request) -> Result<Response, Error>   ← user writes this
//!        ↓ app.handle(Method::GET, "v1", "/test", test, …)
//! test.into_boxed_handler()                                             ← Handler blanket impl
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! middleware.wrap(handler)                                              ← one layer per middleware
//!        ↓
//! handler.call(ctx, req) at request time                                ← one vtable dispatch per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` lets tokio move the future across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What every handler and every middleware-wrapped handler resolves to.
pub type HandlerResult = Result<Response, Error>;

/// Dispatch interface shared by route handlers and middleware layers.
pub trait ErasedHandler {
    fn call(&self, ctx: Context, req: Request) -> BoxFuture<HandlerResult>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the shape:
///
/// ```text
/// async fn name(ctx: Context, req: Request) -> Result<impl IntoResponse, Error>
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: Context, req: Request) -> BoxFuture<HandlerResult> {
        let fut = (self.0)(ctx.clone(), req);
        Box::pin(async move {
            let response = fut.await?.into_response();
            // The response leaving this layer is the one the client gets,
            // whatever inner layers recorded.
            ctx.replace_status(response.status_code());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::response::respond;

    fn request() -> Request {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        Request::from_http(http::Request::new(Bytes::new()), addr)
    }

    #[tokio::test]
    async fn returned_response_decides_the_status() {
        let handler = (|ctx: Context, _req: Request| async move {
            let _draft = respond(&ctx, &"draft", StatusCode::CREATED)?;
            Ok::<_, Error>(Response::text("final"))
        })
        .into_boxed_handler();

        let ctx = Context::new();
        let res = handler.call(ctx.clone(), request()).await.unwrap();

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(ctx.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn plain_values_record_their_status() {
        let handler = (|_ctx: Context, _req: Request| async { Ok::<_, Error>(StatusCode::NO_CONTENT) })
            .into_boxed_handler();

        let ctx = Context::new();
        handler.call(ctx.clone(), request()).await.unwrap();
        assert_eq!(ctx.status(), Some(StatusCode::NO_CONTENT));
    }
}
