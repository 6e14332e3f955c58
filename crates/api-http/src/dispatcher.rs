//! Protocol Dispatcher
//!
//! Runs a handler and converts its outcome into the wire response:
//!
//! - success: `200`, JSON bean body, outcome headers `1000`/`OK`
//! - failure: `500`, [`ExceptionInfo`](crate::types::ExceptionInfo) body,
//!   outcome headers `2000`/`ERROR` plus the internal error code and message
//!
//! A panicking handler is reported like any unrecognized error.

use crate::context::RequestContext;
use crate::error::{exception_info, header, header_value, ResponseCode};
use crate::handler::RequestHandler;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use metarepo_core::{AppError, ErrorCode};
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Dispatch one request to `handler`
pub async fn dispatch(handler: &dyn RequestHandler, ctx: RequestContext) -> Response {
    let outcome = AssertUnwindSafe(handler.handle_event(&ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(AppError::Internal(panic_message(panic.as_ref()))));

    match outcome {
        Ok(bean) => success_response(bean),
        Err(e) => {
            error!(
                method = %ctx.method(),
                path = %ctx.path(),
                error = %e,
                code = e.code(),
                "Exception in request handler"
            );
            error_response(&e)
        }
    }
}

fn success_response(bean: serde_json::Value) -> Response {
    let mut response = (StatusCode::OK, Json(bean)).into_response();
    ResponseCode::Success.apply(response.headers_mut());
    response
}

/// Structured 500 response for `err`
pub fn error_response(err: &AppError) -> Response {
    let info = exception_info(err);
    let code = header_value(&info.error_code);
    let message = header_value(&info.message);

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, Json(info)).into_response();
    let headers = response.headers_mut();
    ResponseCode::Error.apply(headers);
    headers.insert(HeaderName::from_static(header::INTERNAL_ERROR_CODE), code);
    headers.insert(HeaderName::from_static(header::INTERNAL_ERROR_MESSAGE), message);
    response
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", msg)
    } else {
        "handler panicked".to_string()
    }
}
