//! HTTP types shared between the client and its transport.
//!
//! # Design
//! Requests and responses are plain data. `RestClient` assembles a complete
//! `HttpRequest` (URL, headers, credentials, body) and hands it to a
//! `Transport`, which performs the round-trip and returns an `HttpResponse`.
//! Nothing in this module touches the network, so the client logic can be
//! tested against an in-memory transport.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{ConfigError, TransportError};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication mechanism requested by the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    /// Let the transport pick; transports without negotiation use Basic.
    Any,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthScheme::Basic => "basic",
            AuthScheme::Digest => "digest",
            AuthScheme::Any => "any",
        })
    }
}

impl FromStr for AuthScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "digest" => Ok(AuthScheme::Digest),
            "any" => Ok(AuthScheme::Any),
            _ => Err(ConfigError::UnknownAuthScheme(s.to_string())),
        }
    }
}

/// User credentials attached to every request of a configured client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub scheme: AuthScheme,
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Value for an `Authorization: Basic` header.
    pub fn basic_authorization(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password));
        format!("Basic {token}")
    }
}

// Keep passwords out of logs and debug dumps.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

impl Part {
    /// Build a part from a parameter pair. Values of the form `@<path>` are
    /// file markers.
    pub fn from_param(name: &str, value: &str) -> Self {
        match value.strip_prefix('@') {
            Some(path) if !path.is_empty() => Part::File {
                name: name.to_string(),
                path: PathBuf::from(path),
            },
            _ => Part::Text {
                name: name.to_string(),
                value: value.to_string(),
            },
        }
    }
}

/// Body parameters of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// `multipart/form-data` parts.
    Multipart(Vec<Part>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Form(pairs) => pairs.is_empty(),
            RequestBody::Multipart(parts) => parts.is_empty(),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by `RestClient::call`. The transport executes it and returns the
/// corresponding `HttpResponse`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub credentials: Option<Credentials>,
    pub body: RequestBody,
    /// When false, statuses >= 400 are returned as responses.
    pub fail_on_http_error: bool,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Declared `Content-Type`, parameters included.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// URL-encode pairs as `k=v&k2=v2`, keeping their order.
pub fn encode_pairs<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k.as_ref()),
                urlencoding::encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Executes one request and returns its response.
///
/// Implementations own connection handling, TLS and timeouts. A response
/// with any status is `Ok` unless `fail_on_http_error` is set; `Err` means
/// no usable response was received.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}
