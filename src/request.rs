//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::error::Error;

/// An incoming HTTP request with its body fully read.
///
/// Middleware hands data to inner layers through the request extensions:
/// the authentication middleware stores the verified
/// [`Claims`](crate::auth::Claims) there, the metrics middleware its
/// [`Metrics`](crate::metrics::Metrics) handle.
pub struct Request {
    head: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: SocketAddr,
}

impl Request {
    /// Wraps an `http` request received from `remote_addr`.
    pub fn from_http(req: http::Request<Bytes>, remote_addr: SocketAddr) -> Self {
        let (head, body) = req.into_parts();
        Self { head, body, params: HashMap::new(), remote_addr }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/tasks/{id}`, `req.param("id")` on `/tasks/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.head.extensions.get::<T>()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.head.extensions
    }

    /// Decodes the JSON body. A malformed body is the client's fault: 400.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::request(format!("unable to decode payload: {e}"), http::StatusCode::BAD_REQUEST))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(body: &'static str) -> Request {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/v1/tasks?page=1")
            .header("Content-Type", "application/json")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        Request::from_http(req, "127.0.0.1:9000".parse().unwrap())
    }

    #[test]
    fn exposes_head_and_params() {
        let req = request("{}").with_params(HashMap::from([("id".to_owned(), "7".to_owned())]));

        assert_eq!(*req.method(), Method::POST);
        assert_eq!(req.path(), "/v1/tasks");
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.param("id"), Some("7"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn json_body_errors_are_bad_requests() {
        #[derive(Deserialize)]
        struct NewTask {
            #[allow(dead_code)]
            url: String,
        }

        assert!(request(r#"{"url":"https://example.com"}"#).json::<NewTask>().is_ok());

        match request("not json").json::<NewTask>() {
            Err(Error::Request { status, .. }) => assert_eq!(status, http::StatusCode::BAD_REQUEST),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("decoded garbage"),
        }
    }

    #[test]
    fn extensions_carry_values_between_layers() {
        let mut req = request("");
        req.extensions_mut().insert(42_u32);
        assert_eq!(req.extension::<u32>(), Some(&42));
    }
}
