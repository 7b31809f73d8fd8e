use std::sync::Arc;

use http::StatusCode;
use tracing::error;

use super::Middleware;
use crate::context::Context;
use crate::error::{Error, ErrorResponse};
use crate::handler::{BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;
use crate::response::{Response, json_response};

/// Translates handler errors into structured JSON responses.
///
/// The response is chosen from the *root* cause of the error:
///
/// | Root cause   | Status                 | Body                                         |
/// |--------------|------------------------|----------------------------------------------|
/// | `Validation` | 400                    | `{"error":"data validation error","fields":…}` |
/// | `Request`    | the carried status     | `{"error":"<cause>"}`                        |
/// | `Auth`       | 401 / 403              | `{"error":"Unauthorized"}` / `"Forbidden"`   |
/// | anything else| 500                    | `{"error":"Internal Server Error"}`          |
///
/// The envelope replaces any response the handler built before failing, and
/// its status is the one recorded for the request. Every error is swallowed
/// once its response is written, except a shutdown error, which is returned
/// unchanged so the pipeline can escalate it.
pub struct Errors;

impl Middleware for Errors {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        (move |ctx: Context, req: Request| {
            let next = Arc::clone(&next);
            async move {
                let err = match next.call(ctx.clone(), req).await {
                    Ok(response) => return Ok(response),
                    Err(err) => err,
                };

                error!(trace_id = %ctx.trace_id(), error = %err, "request failed");

                let (status, body) = classify(err.cause());
                let response = json_response(&body, status)
                    .unwrap_or_else(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR));
                // The envelope supersedes anything the handler responded with
                // before failing.
                ctx.replace_status(response.status_code());

                if err.is_shutdown() {
                    return Err(err);
                }

                Ok(response)
            }
        })
        .into_boxed_handler()
    }
}

/// Picks the status and envelope for a root cause.
pub(crate) fn classify(cause: &Error) -> (StatusCode, ErrorResponse) {
    match cause {
        Error::Validation(fields) => (
            StatusCode::BAD_REQUEST,
            ErrorResponse { error: "data validation error".to_owned(), fields: Some(fields.to_string()) },
        ),
        Error::Request { source, status } => {
            (*status, ErrorResponse { error: source.to_string(), fields: None })
        }
        Error::Auth(e) => {
            let status = e.status();
            (status, ErrorResponse { error: reason(status), fields: None })
        }
        Error::Shutdown(_) | Error::Untrusted(_) | Error::Wrapped { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse { error: reason(StatusCode::INTERNAL_SERVER_ERROR), fields: None },
        ),
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use crate::error::FieldErrors;
    use crate::response::respond;

    #[test]
    fn validation_is_bad_request_with_fields() {
        let mut fields = FieldErrors::new();
        fields.push("name", "required");

        let (status, body) = classify(&Error::validation(fields));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "data validation error");
        assert_eq!(body.fields.as_deref(), Some(r#"[{"field":"name","error":"required"}]"#));
    }

    #[test]
    fn request_errors_keep_their_status_and_message() {
        let (status, body) = classify(&Error::request("task not found", StatusCode::NOT_FOUND));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, ErrorResponse { error: "task not found".into(), fields: None });
    }

    #[test]
    fn auth_errors_hide_their_detail() {
        let (status, body) = classify(&Error::Auth(AuthError::MalformedHeader));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "Unauthorized");

        let (status, body) = classify(&Error::Auth(AuthError::Forbidden(
            crate::auth::PolicyError::Denied("admin only".into()),
        )));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "Forbidden");
    }

    #[test]
    fn untrusted_errors_leak_nothing() {
        let (status, body) = classify(&Error::untrusted("password=hunter2 rejected by db"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal Server Error");
    }

    fn request() -> Request {
        let addr: std::net::SocketAddr = "127.0.0.1:1".parse().unwrap();
        Request::from_http(http::Request::new(bytes::Bytes::new()), addr)
    }

    #[tokio::test]
    async fn error_after_respond_is_answered_and_swallowed() {
        let handler = (|ctx: Context, _req: Request| async move {
            respond(&ctx, &"draft", StatusCode::OK)?;
            Err::<Response, _>(Error::request("task not found", StatusCode::NOT_FOUND))
        })
        .into_boxed_handler();

        let ctx = Context::new();
        let res = Errors.wrap(handler).call(ctx.clone(), request()).await.unwrap();

        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ctx.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn shutdown_errors_come_back_unchanged() {
        let handler = (|_ctx: Context, _req: Request| async {
            Err::<Response, _>(Error::shutdown("request state missing").context("loading"))
        })
        .into_boxed_handler();

        let ctx = Context::new();
        let err = Errors.wrap(handler).call(ctx.clone(), request()).await.unwrap_err();

        assert_eq!(err.to_string(), "loading: request state missing");
        assert_eq!(ctx.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
