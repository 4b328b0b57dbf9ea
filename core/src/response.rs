//! Decoded responses and the status-field conventions used to inspect them.
//!
//! # Design
//! A call either fails in transport (`Err(ApiError::Transport)`) or yields a
//! `Response` whose `Body` says what happened to the payload: decoded into a
//! value, decoded into nothing, rejected by its decoder, or left alone
//! because no format applied. HTTP error statuses are ordinary responses.
//!
//! REST endpoints this client talks to report their outcome in a top-level
//! `status` field valued `"OK"` or `"ERROR"`; the `is_*` helpers check that
//! convention.

use serde_json::Value;

use crate::error::{ApiError, DecodeError};
use crate::format::{Format, FormatRegistry};
use crate::http::HttpResponse;

/// What became of a response body.
#[derive(Debug)]
pub enum Body {
    /// Decoded into a value carrying data.
    Value { format: Format, value: Value },
    /// Decoded, but the payload was blank, null, or an empty collection.
    Empty { format: Format },
    /// The selected decoder rejected the payload.
    Malformed {
        format: Format,
        error: DecodeError,
        raw: Vec<u8>,
    },
    /// No format applied; the bytes are returned unchanged.
    Undecoded(Vec<u8>),
}

/// A response after formatting.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Body,
}

impl Response {
    /// Decode `response` with `active` when set, otherwise with the format
    /// the registry maps its content type to.
    pub fn from_http(
        response: HttpResponse,
        active: Option<Format>,
        registry: &FormatRegistry,
    ) -> Self {
        let content_type = response.content_type().map(str::to_string);
        let format = active.or_else(|| content_type.as_deref().and_then(|ct| registry.detect(ct)));

        let body = match format {
            Some(format) => decode_body(format, response.body),
            None => {
                tracing::debug!(
                    content_type = content_type.as_deref().unwrap_or(""),
                    "no format matched, returning raw body"
                );
                Body::Undecoded(response.body)
            }
        };

        Self {
            status: response.status,
            content_type,
            body,
        }
    }

    /// The decoded value, if the body decoded into one.
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            Body::Value { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Undecoded or rejected bytes.
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Undecoded(raw) | Body::Malformed { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Format the body was decoded with.
    pub fn format(&self) -> Option<Format> {
        match &self.body {
            Body::Value { format, .. } | Body::Empty { format } | Body::Malformed { format, .. } => {
                Some(*format)
            }
            Body::Undecoded(_) => None,
        }
    }

    pub fn is_http_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The top-level `status` field of an object body.
    pub fn status_field(&self) -> Option<&Value> {
        self.value()?.as_object()?.get("status")
    }

    /// Object body with a non-blank `status` field.
    pub fn is_valid(&self) -> bool {
        self.status_field().is_some_and(|status| !is_blank(status))
    }

    pub fn is_ok(&self) -> bool {
        self.status_is("OK")
    }

    pub fn is_error(&self) -> bool {
        self.status_is("ERROR")
    }

    fn status_is(&self, expected: &str) -> bool {
        self.is_valid() && self.status_field().and_then(Value::as_str) == Some(expected)
    }
}

/// False for transport failures, otherwise `Response::is_valid`.
pub fn is_valid(result: &Result<Response, ApiError>) -> bool {
    result.as_ref().is_ok_and(Response::is_valid)
}

/// False for transport failures, otherwise `Response::is_ok`.
pub fn is_ok(result: &Result<Response, ApiError>) -> bool {
    result.as_ref().is_ok_and(Response::is_ok)
}

/// False for transport failures, otherwise `Response::is_error`.
pub fn is_error(result: &Result<Response, ApiError>) -> bool {
    result.as_ref().is_ok_and(Response::is_error)
}

fn decode_body(format: Format, raw: Vec<u8>) -> Body {
    if raw.trim_ascii().is_empty() {
        return Body::Empty { format };
    }
    match format.decode(&raw) {
        Ok(value) if is_empty_value(&value) => Body::Empty { format },
        Ok(value) => Body::Value { format, value },
        Err(error) => {
            tracing::warn!(%format, %error, bytes = raw.len(), "response body did not decode");
            Body::Malformed { format, error, raw }
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Values a loosely-typed server uses to mean "nothing here".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Bool(true) => false,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}
