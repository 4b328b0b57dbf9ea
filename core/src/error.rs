//! Error types for the REST client.
//!
//! # Design
//! Only two things make a call fail outright: the client could not be built
//! from its configuration, or the transport never produced a response. HTTP
//! error statuses are not failures here; they come back as a decoded
//! `Response` and are inspected through its `status` field. Decoding problems
//! are carried inside the response body as `Body::Malformed`.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::AuthScheme;

/// Errors returned by `RestClient` construction and calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The client configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by a `Transport` implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A multipart file part could not be read.
    #[error("cannot read file part {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The response status was >= 400 and the request asked to fail on it.
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// The transport has no support for the requested auth scheme.
    #[error("unsupported auth scheme: {0}")]
    UnsupportedAuth(AuthScheme),
}

impl TransportError {
    /// Stable short code for diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Connection(_) => "connection",
            TransportError::File { .. } => "file",
            TransportError::HttpStatus(_) => "http_status",
            TransportError::UnsupportedAuth(_) => "unsupported_auth",
        }
    }
}

/// Errors raised while loading or applying `ClientConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown auth scheme '{0}' (expected basic, digest or any)")]
    UnknownAuthScheme(String),
}

/// Reasons a response body could not be decoded by its format.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid serialized payload at byte {offset}: {reason}")]
    Serialized { offset: usize, reason: String },
}
