//! Request-scoped state.
//!
//! The pipeline creates exactly one [`Context`] per request before any
//! middleware runs and hands it down the chain by value. Clones share the same
//! state, so a status recorded by an inner layer is visible to the outer ones
//! on the way back out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use http::StatusCode;
use uuid::Uuid;

use crate::error::Error;

/// Handle to the state of a single in-flight request.
#[derive(Clone, Debug)]
pub struct Context {
    state: Arc<State>,
}

#[derive(Debug)]
struct State {
    trace_id: String,
    started: Instant,
    /// `0` until a status is recorded.
    status: AtomicU16,
}

impl Context {
    /// Fresh state with a new trace id and the clock started now.
    pub fn new() -> Self {
        Self {
            state: Arc::new(State {
                trace_id: Uuid::new_v4().to_string(),
                started: Instant::now(),
                status: AtomicU16::new(0),
            }),
        }
    }

    /// The correlation id attached to every log line of this request.
    pub fn trace_id(&self) -> &str {
        &self.state.trace_id
    }

    pub fn started(&self) -> Instant {
        self.state.started
    }

    pub fn elapsed(&self) -> Duration {
        self.state.started.elapsed()
    }

    /// The response status, once some layer has decided it.
    pub fn status(&self) -> Option<StatusCode> {
        match self.state.status.load(Ordering::Acquire) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    /// Records the response status.
    ///
    /// Handlers write the status once. A second write means the handler built
    /// two responses and the pipeline cannot tell which one it meant: it is
    /// reported as a shutdown error.
    pub fn set_status(&self, status: StatusCode) -> Result<(), Error> {
        self.state
            .status
            .compare_exchange(0, status.as_u16(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                Error::shutdown(format!(
                    "response status already written for request {}",
                    self.state.trace_id
                ))
            })
    }

    /// Records the status of the response actually leaving a layer,
    /// overwriting whatever was recorded before.
    pub(crate) fn replace_status(&self, status: StatusCode) {
        self.state.status.store(status.as_u16(), Ordering::Release);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
