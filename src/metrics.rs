//! Process-wide request counters.
//!
//! Counters live in one shared [`Metrics`] value owned by the application.
//! Every update is also forwarded to the `metrics` facade so an installed
//! exporter sees the same numbers; [`vars`] serves a JSON snapshot for
//! quick inspection on the debug listener.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use serde::Serialize;

use crate::context::Context;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::respond;

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    panics: AtomicU64,
    tasks: AtomicU64,
}

/// A point-in-time copy of the counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub panics: u64,
    /// Live tokio tasks at the last sample.
    pub tasks: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("strata_requests_total").increment(1);
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("strata_errors_total").increment(1);
    }

    pub fn add_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("strata_panics_total").increment(1);
    }

    /// Samples the number of live tasks on the current runtime. A no-op
    /// outside a runtime.
    pub fn observe_tasks(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let alive = handle.metrics().num_alive_tasks() as u64;
        self.tasks.store(alive, Ordering::Relaxed);
        metrics::gauge!("strata_tasks").set(alive as f64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            tasks: self.tasks.load(Ordering::Relaxed),
        }
    }
}

/// Handler answering with the current [`MetricsSnapshot`].
pub fn vars(metrics: Arc<Metrics>) -> impl Handler {
    move |ctx: Context, _req: Request| {
        let snapshot = metrics.snapshot();
        async move { respond(&ctx, &snapshot, StatusCode::OK) }
    }
}
