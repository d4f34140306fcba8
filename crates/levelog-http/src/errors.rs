//! Handler error recording
//!
//! Handlers report failures by attaching a [`HandlerErrors`] extension to
//! their response. The access-log middleware removes it and writes one error
//! record per entry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Error messages recorded while handling one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerErrors(Vec<String>);

impl HandlerErrors {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Record `err` on `response`.
pub fn record_error(response: &mut Response, err: impl fmt::Display) {
    let message = err.to_string();
    match response.extensions_mut().get_mut::<HandlerErrors>() {
        Some(errors) => errors.push(message),
        None => {
            let mut errors = HandlerErrors::default();
            errors.push(message);
            response.extensions_mut().insert(errors);
        }
    }
}

/// Handler failure that becomes a response with its errors recorded.
///
/// The body carries only the status text; error details stay in the logs.
#[derive(Debug, Clone)]
pub struct HandlerError {
    status: StatusCode,
    errors: HandlerErrors,
}

impl HandlerError {
    /// A 500 failure with one recorded error.
    pub fn new(err: impl fmt::Display) -> Self {
        let mut errors = HandlerErrors::default();
        errors.push(err.to_string());
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            errors,
        }
    }

    /// Record another error on the same failure.
    pub fn and(mut self, err: impl fmt::Display) -> Self {
        self.errors.push(err.to_string());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn errors(&self) -> &HandlerErrors {
        &self.errors
    }
}

impl<E: std::error::Error> From<E> for HandlerError {
    fn from(err: E) -> Self {
        Self::new(err)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = self
            .status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string();
        let mut response = (self.status, body).into_response();
        response.extensions_mut().insert(self.errors);
        response
    }
}
