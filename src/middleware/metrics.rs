use std::sync::Arc;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::metrics;
use crate::request::Request;

/// Counts requests and errors and samples the live task count.
///
/// The shared counters are also placed in the request extensions so the
/// panic middleware further in can reach them.
pub struct Metrics {
    metrics: Arc<metrics::Metrics>,
}

impl Metrics {
    pub fn new(metrics: Arc<metrics::Metrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for Metrics {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let metrics = Arc::clone(&self.metrics);
        (move |ctx: Context, mut req: Request| {
            let next = Arc::clone(&next);
            let metrics = Arc::clone(&metrics);
            async move {
                req.extensions_mut().insert(Arc::clone(&metrics));

                let result = next.call(ctx, req).await;

                metrics.add_request();
                metrics.observe_tasks();
                if result.is_err() {
                    metrics.add_error();
                }

                result
            }
        })
        .into_boxed_handler()
    }
}
