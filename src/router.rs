//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. The router only stores
//! already-composed handlers; the middleware stack is folded in by
//! [`App`](crate::App) at registration time.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::BoxedHandler;

#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax.
    ///
    /// # Panics
    ///
    /// On a malformed or conflicting path. Routes are registered at startup,
    /// so a bad table fails fast.
    pub(crate) fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

/// Joins a route group and path: `("v1", "/tasks")` → `/v1/tasks`. An empty
/// group leaves the path alone.
pub(crate) fn route_path(group: &str, path: &str) -> String {
    if group.is_empty() {
        path.to_owned()
    } else {
        format!("/{group}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::Error;
    use crate::handler::Handler;
    use crate::request::Request;

    fn handler(tag: &'static str) -> BoxedHandler {
        (move |_ctx: Context, _req: Request| async move { Ok::<_, Error>(tag) }).into_boxed_handler()
    }

    #[test]
    fn routes_by_method_and_path() {
        let mut router = Router::default();
        router.insert(Method::GET, "/v1/tasks/{id}", handler("get"));
        router.insert(Method::DELETE, "/v1/tasks/{id}", handler("delete"));

        let (_, params) = router.lookup(&Method::GET, "/v1/tasks/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        assert!(router.lookup(&Method::DELETE, "/v1/tasks/42").is_some());
        assert!(router.lookup(&Method::POST, "/v1/tasks/42").is_none());
        assert!(router.lookup(&Method::GET, "/v1/users/42").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let mut router = Router::default();
        router.insert(Method::GET, "/tasks/{id}", handler("a"));
        router.insert(Method::GET, "/tasks/{id}", handler("b"));
    }

    #[test]
    fn group_prefix() {
        assert_eq!(route_path("v1", "/tasks"), "/v1/tasks");
        assert_eq!(route_path("", "/readiness"), "/readiness");
    }
}
