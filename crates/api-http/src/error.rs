//! Protocol Error Codes
//!
//! Maps application errors to response headers and an [`ExceptionInfo`] body.

use crate::types::ExceptionInfo;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use metarepo_core::ErrorCode;
use std::error::Error;

/// Response header names
pub mod header {
    pub const ERROR_CODE: &str = "x-metarepo-error-code";
    pub const ERROR_MESSAGE: &str = "x-metarepo-error-message";
    pub const INTERNAL_ERROR_CODE: &str = "x-metarepo-internal-error-code";
    pub const INTERNAL_ERROR_MESSAGE: &str = "x-metarepo-internal-error-message";
}

/// Outcome codes carried by every response, success included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    Error,
}

impl ResponseCode {
    pub fn code(&self) -> &'static str {
        match self {
            ResponseCode::Success => "1000",
            ResponseCode::Error => "2000",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ResponseCode::Success => "OK",
            ResponseCode::Error => "ERROR",
        }
    }

    /// Set the outcome code/message header pair
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(
            HeaderName::from_static(header::ERROR_CODE),
            HeaderValue::from_static(self.code()),
        );
        headers.insert(
            HeaderName::from_static(header::ERROR_MESSAGE),
            HeaderValue::from_static(self.message()),
        );
    }
}

/// Header-safe rendering of an arbitrary message
///
/// Control characters (newlines in particular) are not allowed in header
/// values and are replaced by spaces.
pub fn header_value(message: &str) -> HeaderValue {
    let sanitized: String = message
        .chars()
        .map(|c| if c.is_control() || !c.is_ascii() { ' ' } else { c })
        .collect();

    HeaderValue::from_str(&sanitized).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Build the error body for `err`, walking its chain of causes
pub fn exception_info<E>(err: &E) -> ExceptionInfo
where
    E: ErrorCode + Error,
{
    let mut stack_trace = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        stack_trace.push(cause.to_string());
        source = cause.source();
    }

    ExceptionInfo {
        error_code: err.code().to_string(),
        message: err.to_string(),
        stack_trace,
    }
}
