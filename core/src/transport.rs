//! Blocking `Transport` backed by a ureq agent.
//!
//! # Design
//! The agent is built with `http_status_as_error(false)` so 4xx/5xx
//! responses come back as data. Form bodies are URL-encoded here, multipart
//! bodies are assembled in memory with a random boundary, and Basic
//! credentials become an `Authorization` header. ureq has no Digest support,
//! so a Digest-configured request fails before anything is sent.

use std::fmt;
use std::fs;
use std::path::Path;

use uuid::Uuid;

use crate::error::TransportError;
use crate::http::{
    encode_pairs, AuthScheme, HttpMethod, HttpRequest, HttpResponse, Part, RequestBody, Transport,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Executes requests with a shared ureq agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent (timeouts, proxy, TLS). It must not treat
    /// HTTP statuses as errors.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut headers = request.headers.clone();
        if let Some(credentials) = &request.credentials {
            match credentials.scheme {
                AuthScheme::Basic | AuthScheme::Any => {
                    headers.push(("Authorization".to_string(), credentials.basic_authorization()));
                }
                AuthScheme::Digest => {
                    return Err(TransportError::UnsupportedAuth(AuthScheme::Digest));
                }
            }
        }

        let payload = encode_body(&request.body)?;
        let url = request.url.as_str();

        let result = match (request.method, payload) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), &headers).call(),
            (HttpMethod::Delete, None) => with_headers(self.agent.delete(url), &headers).call(),
            (HttpMethod::Delete, Some((content_type, bytes))) => {
                with_headers(self.agent.delete(url).force_send_body(), &headers)
                    .content_type(content_type)
                    .send(&bytes[..])
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), &headers).send_empty(),
            (HttpMethod::Post, Some((content_type, bytes))) => {
                with_headers(self.agent.post(url), &headers)
                    .content_type(content_type)
                    .send(&bytes[..])
            }
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), &headers).send_empty(),
            (HttpMethod::Put, Some((content_type, bytes))) => {
                with_headers(self.agent.put(url), &headers)
                    .content_type(content_type)
                    .send(&bytes[..])
            }
        };

        let mut response = result.map_err(|e| TransportError::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        if request.fail_on_http_error && status >= 400 {
            return Err(TransportError::HttpStatus(status));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Content type and bytes for a request body, `None` when there is none.
fn encode_body(body: &RequestBody) -> Result<Option<(String, Vec<u8>)>, TransportError> {
    if body.is_empty() {
        return Ok(None);
    }
    match body {
        RequestBody::Empty => Ok(None),
        RequestBody::Form(pairs) => Ok(Some((
            FORM_CONTENT_TYPE.to_string(),
            encode_pairs(pairs).into_bytes(),
        ))),
        RequestBody::Multipart(parts) => {
            let boundary = format!("restclient-{}", Uuid::new_v4().simple());
            let bytes = encode_multipart(parts, &boundary)?;
            Ok(Some((format!("multipart/form-data; boundary={boundary}"), bytes)))
        }
    }
}

fn encode_multipart(parts: &[Part], boundary: &str) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                out.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", escape(name))
                        .as_bytes(),
                );
                out.extend_from_slice(value.as_bytes());
            }
            Part::File { name, path } => {
                let contents = fs::read(path).map_err(|source| TransportError::File {
                    path: path.clone(),
                    source,
                })?;
                out.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        escape(name),
                        escape(&file_name(path)),
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&contents);
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(out)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
