//! Outgoing HTTP response type, the [`IntoResponse`] conversion trait and the
//! [`respond`] helper.
//!
//! Handlers either build a [`Response`] directly or call [`respond`], which
//! serializes a value to JSON and records the status in the request
//! [`Context`]. Error responses are written by the
//! [`Errors`](crate::middleware::Errors) middleware, never by handlers.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::context::Context;
use crate::error::Error;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use strata::{Response, ContentType};
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/v1/tasks/42")
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    body: Bytes,
    headers: HeaderMap,
    status: StatusCode,
}

impl Response {
    /// `200 OK` with an `application/json` body.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK` with a `text/plain; charset=utf-8` body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: HeaderMap::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Converts into the `http` representation hyper writes to the wire.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    /// Adds a header. Invalid names or values are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json, body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Bytes::from(body.into()))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`).
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }

    fn finish(mut self, content_type: ContentType, body: Bytes) -> Response {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        Response { body, headers: self.headers, status: self.status }
    }
}

// ── respond ───────────────────────────────────────────────────────────────────

/// Serializes `data` as the JSON response body and records `status` as the
/// request's status.
///
/// `204 No Content` is written without a body. Fails with a shutdown error if
/// the handler already responded once. The response the handler finally
/// returns is what the client gets; its status replaces the one recorded
/// here.
pub fn respond<T>(ctx: &Context, data: &T, status: StatusCode) -> Result<Response, Error>
where
    T: Serialize + ?Sized,
{
    ctx.set_status(status)?;
    json_response(data, status)
}

/// Builds the JSON response for `data` without touching the context.
pub(crate) fn json_response<T>(data: &T, status: StatusCode) -> Result<Response, Error>
where
    T: Serialize + ?Sized,
{
    if status == StatusCode::NO_CONTENT {
        return Ok(Response::status(status));
    }

    let body = serde_json::to_vec(data).map_err(Error::untrusted)?;
    Ok(Response::builder().status(status).json(body))
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `Ok(StatusCode::NO_CONTENT)`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_writes_json_and_records_status() {
        let ctx = Context::new();
        let res = respond(&ctx, &serde_json::json!({"status": "OK"}), StatusCode::CREATED).unwrap();

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body().as_ref(), br#"{"status":"OK"}"#);
        assert_eq!(ctx.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn no_content_has_no_body() {
        let ctx = Context::new();
        let res = respond(&ctx, &(), StatusCode::NO_CONTENT).unwrap();

        assert!(res.body().is_empty());
        assert!(res.headers().is_empty());
    }

    #[test]
    fn second_respond_is_a_shutdown_error() {
        let ctx = Context::new();
        respond(&ctx, "first", StatusCode::OK).unwrap();

        let err = respond(&ctx, "second", StatusCode::OK).unwrap_err();
        assert!(err.is_shutdown());
    }

    #[test]
    fn builder_keeps_extra_headers() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/v1/tasks/42")
            .header("bad header", "dropped")
            .text("created");

        assert_eq!(res.header("location"), Some("/v1/tasks/42"));
        assert_eq!(res.headers().len(), 2);

        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::CREATED);
    }
}
