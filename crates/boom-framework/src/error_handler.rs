//! Translation of dispatch errors into responses.
//!
//! The dispatch loop is the single place where a [`BoomError`] becomes a
//! [`Response`]; it hands every error to the application's [`ErrorHandler`].

use http::header::{ALLOW, HeaderValue};
use tracing::{debug, error, warn};

use boom_core::{BoomError, Request, Response};

/// Turns an error raised while handling `request` into a response.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, request: &Request, error: &BoomError) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Request, &BoomError) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request, error: &BoomError) -> Response {
        self(request, error)
    }
}

/// Maps errors to their status class.
///
/// Client errors carry the error message as the body; server errors carry
/// only the canonical reason so internals are not echoed back. A 405 lists
/// the allowed methods in `Allow`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, request: &Request, err: &BoomError) -> Response {
        let status = err.status();

        if err.is_cancellation() {
            debug!(
                method = %request.method(),
                path = request.path(),
                error = %err,
                "Request cancelled"
            );
            return Response::text("Response Timeout").with_status(status);
        }

        let body = if status.is_server_error() {
            error!(
                method = %request.method(),
                path = request.path(),
                error = ?err,
                "Request failed"
            );
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            warn!(
                method = %request.method(),
                path = request.path(),
                error = %err,
                "Request rejected"
            );
            err.to_string()
        };
        let response = Response::text(body).with_status(status);

        match err {
            BoomError::MethodNotAllowed { allowed, .. } => {
                let mut methods: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
                methods.sort_unstable();
                match HeaderValue::from_str(&methods.join(", ")) {
                    Ok(value) => response.with_header(ALLOW, value),
                    Err(_) => response,
                }
            }
            _ => response,
        }
    }
}
