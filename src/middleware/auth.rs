use std::sync::Arc;

use http::header::AUTHORIZATION;

use super::Middleware;
use crate::auth::{Auth, AuthError, Claims, Rule};
use crate::context::Context;
use crate::error::ResultExt;
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;

/// Validates the bearer token and stores the verified [`Claims`] in the
/// request extensions. Failure is a 401.
pub struct Authenticate {
    auth: Arc<Auth>,
}

impl Authenticate {
    pub fn new(auth: Arc<Auth>) -> Self {
        Self { auth }
    }
}

impl Middleware for Authenticate {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let auth = Arc::clone(&self.auth);
        (move |ctx: Context, mut req: Request| {
            let next = Arc::clone(&next);
            let auth = Arc::clone(&auth);
            async move {
                let header = req.header(AUTHORIZATION.as_str()).unwrap_or_default().to_owned();
                let claims = auth.authenticate(&header).await.context("authenticate")?;

                req.extensions_mut().insert(claims);
                next.call(ctx, req).await
            }
        })
        .into_boxed_handler()
    }
}

/// Checks the authenticated caller against a [`Rule`]. Must sit inside
/// [`Authenticate`]. The `{id}` path parameter, when the route has one, is
/// the subject of the action. Failure is a 403.
pub struct Authorize {
    auth: Arc<Auth>,
    rule: Rule,
}

impl Authorize {
    pub fn new(auth: Arc<Auth>, rule: Rule) -> Self {
        Self { auth, rule }
    }
}

impl Middleware for Authorize {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        let auth = Arc::clone(&self.auth);
        let rule = self.rule;
        (move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            let auth = Arc::clone(&auth);
            async move {
                let claims = req
                    .extension::<Claims>()
                    .ok_or(AuthError::MissingClaims)
                    .context("authorize")?;

                auth.authorize(claims, req.param("id"), rule)
                    .await
                    .context(format!("authorize {}", rule.as_str()))?;

                next.call(ctx, req).await
            }
        })
        .into_boxed_handler()
    }
}
