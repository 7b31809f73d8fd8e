use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::Middleware;
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::metrics;
use crate::request::Request;

/// Recovers from panics raised by inner layers.
///
/// A panic becomes an untrusted error carrying the panic message and a stack
/// trace taken at the recovery point, and bumps the panic counter when a
/// [`Metrics`](crate::metrics::Metrics) handle is in the request extensions.
/// Other requests running on the same worker are unaffected.
pub struct Panics;

impl Middleware for Panics {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                let metrics = req.extension::<Arc<metrics::Metrics>>().cloned();

                match AssertUnwindSafe(next.call(ctx, req)).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        if let Some(metrics) = metrics {
                            metrics.add_panic();
                        }
                        let trace = Backtrace::force_capture();
                        Err(Error::untrusted(format!(
                            "PANIC [{}] TRACE [{trace}]",
                            panic_message(payload.as_ref())
                        )))
                    }
                }
            }
        })
        .into_boxed_handler()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
