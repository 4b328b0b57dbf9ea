//! Synchronous REST client with format negotiation.
//!
//! # Overview
//! `RestClient` exposes GET/POST/PUT/DELETE and multipart POST against a
//! configured base URL. It sets `Accept` from the selected format, sends
//! static headers (API key, language) and optional credentials, and decodes
//! each response as XML, JSON, CSV, serialized data or raw text.
//!
//! # Design
//! - The transport is injected. `RestClient` builds `HttpRequest` values and
//!   a `Transport` executes them, so the client runs against an in-memory
//!   transport in tests and against ureq (`ureq` feature) in production.
//! - Results are tagged: transport failure is `Err`, and the `Body` of a
//!   `Response` tells decoded, empty, malformed and undecoded apart.
//! - HTTP error statuses are ordinary responses. Endpoints report their
//!   outcome in a `status` field checked by `is_ok` / `is_error`.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod response;
#[cfg(feature = "ureq")]
pub mod transport;

pub use client::{Exchange, ExchangeOutcome, RestClient, DEFAULT_API_KEY_HEADER};
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, DecodeError, TransportError};
pub use format::{Format, FormatRegistry};
pub use http::{
    AuthScheme, Credentials, HttpMethod, HttpRequest, HttpResponse, Part, RequestBody, Transport,
};
pub use response::{is_error, is_ok, is_valid, Body, Response};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
