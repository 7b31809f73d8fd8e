//! Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. These handlers answer them.
//!
//! | Probe | Question |
//! |---|---|
//! | **Liveness** | Is the process alive? Failure → restart. |
//! | **Readiness** | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Both are ordinary handlers; register them on the debug listener's [`App`](crate::App):
//!
//! ```rust,no_run
//! use http::Method;
//! use strata::{App, health::Health, shutdown};
//!
//! let (tx, _rx) = shutdown::channel();
//! let health = Health::new("v1.4.2");
//! let app = App::new(tx, vec![])
//!     .handle(Method::GET, "", "/liveness", health.liveness())
//!     .handle(Method::GET, "", "/readiness", health.readiness());
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;
use tracing::warn;

use crate::context::Context;
use crate::error::BoxError;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::respond;

/// Upper bound on a readiness check.
pub const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// A dependency the service needs before it can take traffic.
#[async_trait]
pub trait StatusCheck: Send + Sync + 'static {
    async fn status_check(&self) -> Result<(), BoxError>;
}

#[derive(Clone)]
pub struct Health {
    build: Arc<str>,
    check: Option<Arc<dyn StatusCheck>>,
}

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
    build: String,
    host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pod: Option<String>,
    #[serde(rename = "podIP", skip_serializing_if = "Option::is_none")]
    pod_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
}

impl Health {
    pub fn new(build: impl Into<Arc<str>>) -> Self {
        Self { build: build.into(), check: None }
    }

    /// Gates readiness on `check`. Without one the service is always ready.
    pub fn with_check(mut self, check: Arc<dyn StatusCheck>) -> Self {
        self.check = Some(check);
        self
    }

    /// Always 200 with the build and, when running in Kubernetes, the pod
    /// coordinates taken from the environment.
    pub fn liveness(&self) -> impl Handler {
        let build = Arc::clone(&self.build);
        move |ctx: Context, _req: Request| {
            let data = Liveness {
                status: "up",
                build: build.to_string(),
                host: std::env::var("HOSTNAME").unwrap_or_else(|_| "unavailable".to_owned()),
                pod: std::env::var("KUBERNETES_PODNAME").ok(),
                pod_ip: std::env::var("KUBERNETES_NAMESPACE_POD_IP").ok(),
                node: std::env::var("KUBERNETES_NODENAME").ok(),
                namespace: std::env::var("KUBERNETES_NAMESPACE").ok(),
            };
            async move { respond(&ctx, &data, StatusCode::OK) }
        }
    }

    /// 200 when the status check passes within [`READINESS_TIMEOUT`], 500
    /// otherwise.
    pub fn readiness(&self) -> impl Handler {
        let check = self.check.clone();
        move |ctx: Context, _req: Request| {
            let check = check.clone();
            async move {
                let ready = match check {
                    None => true,
                    Some(check) => match tokio::time::timeout(READINESS_TIMEOUT, check.status_check()).await {
                        Ok(Ok(())) => true,
                        Ok(Err(e)) => {
                            warn!(trace_id = %ctx.trace_id(), error = %e, "readiness check failed");
                            false
                        }
                        Err(_) => {
                            warn!(trace_id = %ctx.trace_id(), timeout = ?READINESS_TIMEOUT, "readiness check timed out");
                            false
                        }
                    },
                };

                if ready {
                    respond(&ctx, &Readiness { status: "ok" }, StatusCode::OK)
                } else {
                    respond(&ctx, &Readiness { status: "not ready" }, StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    }
}
