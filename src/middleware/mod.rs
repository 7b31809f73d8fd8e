//! Middleware layer.
//!
//! A middleware turns one handler into another. The layers stack up like an
//! onion around each route handler:
//!
//! ```text
//! Logger → Errors → Metrics → Panics → route middleware → handler
//!   in ──────────────────────────────────────────────────────▶
//!   ◀────────────────────────────────────────────────────── out
//! ```
//!
//! The first middleware declared is the first to see the request and the
//! last to see the response. Route-scoped middleware always sits inside the
//! process-wide list. [`compose`] is the single place that ordering lives.
//!
//! Any `Fn(BoxedHandler) -> BoxedHandler` closure is a middleware:
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::{BoxedHandler, Context, ErasedHandler, Handler, Request};
//! use strata::middleware::BoxedMiddleware;
//!
//! let tag: BoxedMiddleware = Arc::new(|next: BoxedHandler| {
//!     (move |ctx: Context, req: Request| {
//!         let next = Arc::clone(&next);
//!         async move {
//!             let res = next.call(ctx, req).await?;
//!             Ok::<_, strata::Error>(res)
//!         }
//!     })
//!     .into_boxed_handler()
//! });
//! ```

mod auth;
mod errors;
mod logger;
mod metrics;
mod panics;

use std::sync::Arc;

use crate::handler::BoxedHandler;

pub use auth::{Authenticate, Authorize};
pub use errors::Errors;
pub use logger::Logger;
pub use metrics::Metrics;
pub use panics::Panics;

/// A transform from handler to handler.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// A type-erased middleware that can be stored in a list.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Builds the effective handler for one route.
///
/// `route` wraps `handler` first (innermost), `global` wraps the result
/// (outermost). Within each list the first entry ends up outermost. Nothing
/// runs until the returned handler is called.
pub fn compose(
    global: &[BoxedMiddleware],
    route: &[BoxedMiddleware],
    handler: BoxedHandler,
) -> BoxedHandler {
    wrap_all(global, wrap_all(route, handler))
}

fn wrap_all(mw: &[BoxedMiddleware], handler: BoxedHandler) -> BoxedHandler {
    // Walking backwards makes mw[0] the last wrapper applied, i.e. the outermost.
    mw.iter().rev().fold(handler, |inner, m| m.wrap(inner))
}

/// The process-wide stack every service runs: logging, error translation,
/// metrics and panic recovery, in that order.
pub fn standard(metrics: Arc<crate::metrics::Metrics>) -> Vec<BoxedMiddleware> {
    vec![
        Arc::new(Logger),
        Arc::new(Errors),
        Arc::new(Metrics::new(metrics)),
        Arc::new(Panics),
    ]
}
