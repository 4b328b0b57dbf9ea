//! REST client: verb methods over a configured base URL.
//!
//! # Design
//! `RestClient` owns its configuration, a `Transport`, the format tables
//! and a little per-session state: static headers (API key, language) and
//! the active response format. Every verb builds one `HttpRequest`, hands
//! it to the transport, and formats whatever comes back. Nothing is retried
//! or cached. Configuration methods take `&mut self`, so one client serves
//! one logical session.

use std::fmt;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::format::{Format, FormatRegistry};
use crate::http::{
    encode_pairs, Credentials, HttpMethod, HttpRequest, HttpResponse, Part, RequestBody,
    Transport,
};
use crate::response::Response;

/// Header used by `set_api_key`.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-KEY";

/// The last request sent and what came back, kept for `debug_report`.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: HttpRequest,
    pub outcome: ExchangeOutcome,
}

#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    Response(HttpResponse),
    Failed { code: &'static str, message: String },
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(45);
        let request = &self.request;

        writeln!(f, "{rule}\nRequest\n{rule}")?;
        writeln!(f, "{} {}", request.method, request.url)?;
        for (name, value) in &request.headers {
            writeln!(f, "{name}: {value}")?;
        }
        if let Some(credentials) = &request.credentials {
            writeln!(f, "Auth: {} as {}", credentials.scheme, credentials.user)?;
        }

        writeln!(f, "{rule}\nResponse\n{rule}")?;
        match &self.outcome {
            ExchangeOutcome::Response(response) => {
                writeln!(f, "Status: {}", response.status)?;
                if let Some(content_type) = response.content_type() {
                    writeln!(f, "Content-Type: {content_type}")?;
                }
                if response.body.is_empty() {
                    writeln!(f, "No response")
                } else {
                    writeln!(f, "{}", String::from_utf8_lossy(&response.body))
                }
            }
            ExchangeOutcome::Failed { code, message } => {
                writeln!(f, "No response")?;
                writeln!(f, "{rule}\nErrors\n{rule}")?;
                writeln!(f, "Code: {code}")?;
                writeln!(f, "Message: {message}")
            }
        }
    }
}

/// Synchronous REST client bound to one base URL.
#[derive(Debug)]
pub struct RestClient<T> {
    config: ClientConfig,
    credentials: Option<Credentials>,
    transport: T,
    registry: FormatRegistry,
    headers: Vec<(String, String)>,
    format: Option<Format>,
    mime_type: Option<String>,
    last_exchange: Option<Exchange>,
}

impl<T: Transport> RestClient<T> {
    /// Fails only when credentials name an unknown auth scheme.
    pub fn new(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let config = config.normalized();
        let credentials = config.credentials()?;
        Ok(Self {
            config,
            credentials,
            transport,
            registry: FormatRegistry::default(),
            headers: Vec::new(),
            format: None,
            mime_type: None,
            last_exchange: None,
        })
    }

    pub fn with_registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Active response format, if a known one was selected.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    /// MIME type sent in `Accept`.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Headers sent with every request, `Accept` excluded.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.last_exchange.as_ref()
    }

    /// GET with `params` appended to `path` as a query string.
    pub fn get(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        let target = if params.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", encode_pairs(params))
        };
        self.call(HttpMethod::Get, &target, RequestBody::Empty, format)
    }

    pub fn post(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        self.call(HttpMethod::Post, path, form(params), format)
    }

    pub fn put(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        self.call(HttpMethod::Put, path, form(params), format)
    }

    pub fn delete(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        self.call(HttpMethod::Delete, path, form(params), format)
    }

    /// POST as multipart. Values written `@<path>` are uploaded as files.
    pub fn post_file(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        let parts = params
            .iter()
            .map(|(name, value)| Part::from_param(name, value))
            .collect();
        self.call(HttpMethod::Post, path, RequestBody::Multipart(parts), format)
    }

    pub fn set_api_key(&mut self, key: &str) -> &mut Self {
        self.set_api_key_header(DEFAULT_API_KEY_HEADER, key)
    }

    pub fn set_api_key_header(&mut self, header: &str, key: &str) -> &mut Self {
        self.set_header(header, key);
        self
    }

    /// Set `Accept-Language`, joining several languages with `, `.
    pub fn set_language<I, S>(&mut self, languages: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = languages
            .into_iter()
            .map(|lang| lang.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.set_header("Accept-Language", &joined);
        self
    }

    /// Select a response format by name, or request a literal MIME type.
    ///
    /// A MIME type that names no registered format clears the active
    /// format, so responses are decoded by their declared content type.
    pub fn set_format(&mut self, format_or_mime: &str) -> &mut Self {
        match self.registry.lookup(format_or_mime) {
            Some((format, mime)) => {
                self.mime_type = Some(mime.to_string());
                self.format = Some(format);
            }
            None => {
                self.mime_type = Some(format_or_mime.to_string());
                self.format = None;
            }
        }
        self
    }

    /// Send one request and format its response.
    ///
    /// `Accept` carries the active MIME type, or an empty value when no
    /// format was ever configured. HTTP error statuses are returned as
    /// responses; only a transport failure yields `Err`.
    pub fn call(
        &mut self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
        format: Option<&str>,
    ) -> Result<Response, ApiError> {
        if let Some(format) = format {
            self.set_format(format);
        }

        let mut headers = self.headers.clone();
        headers.push((
            "Accept".to_string(),
            self.mime_type.clone().unwrap_or_default(),
        ));

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.config.base_url, path),
            headers,
            credentials: self.credentials.clone(),
            body,
            fail_on_http_error: false,
        };

        tracing::debug!(%method, url = %request.url, format = ?self.format, "sending request");

        match self.transport.execute(&request) {
            Ok(response) => {
                tracing::debug!(
                    status = response.status,
                    content_type = response.content_type().unwrap_or(""),
                    bytes = response.body.len(),
                    "received response"
                );
                self.last_exchange = Some(Exchange {
                    request,
                    outcome: ExchangeOutcome::Response(response.clone()),
                });
                Ok(Response::from_http(response, self.format, &self.registry))
            }
            Err(error) => {
                tracing::warn!(%method, url = %request.url, %error, "request failed");
                self.last_exchange = Some(Exchange {
                    request,
                    outcome: ExchangeOutcome::Failed {
                        code: error.code(),
                        message: error.to_string(),
                    },
                });
                Err(error.into())
            }
        }
    }

    /// Plain-text dump of the last exchange.
    pub fn debug_report(&self) -> String {
        match &self.last_exchange {
            Some(exchange) => exchange.to_string(),
            None => "No request sent\n".to_string(),
        }
    }

    /// Replace any earlier value of the same header.
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }
}

fn form(params: &[(&str, &str)]) -> RequestBody {
    if params.is_empty() {
        return RequestBody::Empty;
    }
    RequestBody::Form(
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use serde_json::json;

    use super::*;
    use crate::error::TransportError;
    use crate::http::AuthScheme;
    use crate::response::{is_valid, Body};

    /// Records requests and replays canned outcomes.
    #[derive(Default)]
    struct StubTransport {
        requests: RefCell<Vec<HttpRequest>>,
        replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    }

    impl StubTransport {
        fn reply(self, content_type: &str, body: &str) -> Self {
            self.replies.borrow_mut().push_back(Ok(HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), content_type.to_string())],
                body: body.as_bytes().to_vec(),
            }));
            self
        }

        fn fail(self, error: TransportError) -> Self {
            self.replies.borrow_mut().push_back(Err(error));
            self
        }

        fn last(&self) -> HttpRequest {
            self.requests.borrow().last().cloned().expect("no request sent")
        }
    }

    impl Transport for StubTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 204,
                    headers: Vec::new(),
                    body: Vec::new(),
                })
            })
        }
    }

    fn client(transport: &StubTransport) -> RestClient<&StubTransport> {
        RestClient::new(ClientConfig::new("http://api.test"), transport).unwrap()
    }

    #[test]
    fn base_url_gets_trailing_separator() {
        let transport = StubTransport::default();
        assert_eq!(client(&transport).base_url(), "http://api.test/");
    }

    #[test]
    fn get_appends_query_string() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.get("items", &[("a", "1"), ("b", "2")], None).unwrap();

        let request = transport.last();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://api.test/items?a=1&b=2");
        assert_eq!(request.body, RequestBody::Empty);
        assert!(!request.fail_on_http_error);
    }

    #[test]
    fn get_without_params_has_no_query() {
        let transport = StubTransport::default();
        client(&transport).get("items", &[], None).unwrap();
        assert_eq!(transport.last().url, "http://api.test/items");
    }

    #[test]
    fn get_encodes_query_values() {
        let transport = StubTransport::default();
        client(&transport)
            .get("search", &[("q", "rust & php")], None)
            .unwrap();
        assert_eq!(transport.last().url, "http://api.test/search?q=rust%20%26%20php");
    }

    #[test]
    fn body_verbs_send_form_params() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        let params = [("title", "Why?")];

        c.post("questions", &params, None).unwrap();
        let post = transport.last();
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(
            post.body,
            RequestBody::Form(vec![("title".to_string(), "Why?".to_string())])
        );

        c.put("questions/1", &params, None).unwrap();
        assert_eq!(transport.last().method, HttpMethod::Put);

        c.delete("questions/1", &[], None).unwrap();
        let delete = transport.last();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.body, RequestBody::Empty);
    }

    #[test]
    fn post_file_sends_multipart_parts() {
        let transport = StubTransport::default();
        client(&transport)
            .post_file("uploads", &[("caption", "cat"), ("image", "@/tmp/cat.png")], None)
            .unwrap();

        let request = transport.last();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.body,
            RequestBody::Multipart(vec![
                Part::Text {
                    name: "caption".to_string(),
                    value: "cat".to_string(),
                },
                Part::File {
                    name: "image".to_string(),
                    path: "/tmp/cat.png".into(),
                },
            ])
        );
    }

    #[test]
    fn api_key_is_sent_on_later_calls() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.set_api_key("secret");
        c.get("a", &[], None).unwrap();
        c.post("b", &[], None).unwrap();
        assert_eq!(transport.last().header("X-API-KEY"), Some("secret"));
        assert_eq!(transport.requests.borrow()[0].header("x-api-key"), Some("secret"));
    }

    #[test]
    fn custom_api_key_header_replaces_previous_value() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.set_api_key_header("Authorization-Token", "one")
            .set_api_key_header("authorization-token", "two");
        c.get("a", &[], None).unwrap();

        let request = transport.last();
        let tokens: Vec<_> = request
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("authorization-token"))
            .collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(request.header("Authorization-Token"), Some("two"));
    }

    #[test]
    fn language_list_is_joined() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.set_language(["en-GB", "en", "es"]);
        c.get("a", &[], None).unwrap();
        assert_eq!(transport.last().header("Accept-Language"), Some("en-GB, en, es"));

        c.set_language(["fr"]);
        c.get("a", &[], None).unwrap();
        assert_eq!(transport.last().header("Accept-Language"), Some("fr"));
    }

    #[test]
    fn accept_header_follows_format() {
        let transport = StubTransport::default();
        let mut c = client(&transport);

        c.get("a", &[], None).unwrap();
        assert_eq!(transport.last().header("Accept"), Some(""));

        c.get("a", &[], Some("csv")).unwrap();
        assert_eq!(transport.last().header("Accept"), Some("text/csv"));
        assert_eq!(c.format(), Some(Format::Csv));

        // The override sticks for later calls.
        c.get("a", &[], None).unwrap();
        assert_eq!(transport.last().header("Accept"), Some("text/csv"));
    }

    #[test]
    fn accept_is_sent_empty_until_a_format_is_set() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.set_api_key("k");
        c.post("a", &[], None).unwrap();

        let accepts: Vec<_> = transport
            .last()
            .headers
            .into_iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("accept"))
            .collect();
        assert_eq!(accepts, [("Accept".to_string(), String::new())]);
        assert_eq!(c.mime_type(), None);
    }

    #[test]
    fn literal_mime_clears_format() {
        let transport = StubTransport::default().reply("application/json", r#"{"status":"OK"}"#);
        let mut c = client(&transport);
        c.set_format("xml").set_format("application/hal+json");
        assert_eq!(c.format(), None);
        assert_eq!(c.mime_type(), Some("application/hal+json"));

        let response = c.get("a", &[], None).unwrap();
        assert_eq!(transport.last().header("Accept"), Some("application/hal+json"));
        assert_eq!(response.format(), Some(Format::Json));
        assert!(response.is_ok());
    }

    #[test]
    fn explicit_json_format_decodes_status() {
        let transport = StubTransport::default().reply("text/html", r#"{"status":"OK","x":1}"#);
        let mut c = client(&transport);
        c.set_format("json");
        let result = c.get("a", &[], None);

        let response = result.as_ref().unwrap();
        assert_eq!(response.value(), Some(&json!({"status": "OK", "x": 1})));
        assert!(response.is_ok());
        assert!(!response.is_error());
        assert!(is_valid(&result));
    }

    #[test]
    fn csv_rows_with_wrong_width_are_dropped() {
        let transport = StubTransport::default().reply("text/plain", "h1,h2\n\"v1\",\"v2\"\n\"v3\"\n");
        let mut c = client(&transport);
        let response = c.get("a", &[], Some("csv")).unwrap();
        assert_eq!(response.value(), Some(&json!([{"h1": "v1", "h2": "v2"}])));
    }

    #[test]
    fn content_type_drives_decoding_without_format() {
        let transport = StubTransport::default()
            .reply("application/json; charset=utf-8", r#"{"status":"ERROR"}"#)
            .reply("application/octet-stream", "\u{0}bin");
        let mut c = client(&transport);

        let json = c.get("a", &[], None).unwrap();
        assert_eq!(json.format(), Some(Format::Json));
        assert!(json.is_error());

        let raw = c.get("b", &[], None).unwrap();
        assert!(matches!(&raw.body, Body::Undecoded(bytes) if bytes == b"\x00bin"));
    }

    #[test]
    fn transport_failure_is_an_error_not_a_body() {
        let transport =
            StubTransport::default().fail(TransportError::Connection("refused".to_string()));
        let mut c = client(&transport);
        let result = c.get("a", &[], None);

        assert!(matches!(result, Err(ApiError::Transport(TransportError::Connection(_)))));
        assert!(!is_valid(&result));
        let report = c.debug_report();
        assert!(report.contains("GET http://api.test/a"));
        assert!(report.contains("Code: connection"));
        assert!(report.contains("refused"));
    }

    #[test]
    fn credentials_attached_when_configured() {
        let transport = StubTransport::default();
        let config = ClientConfig::new("http://api.test/").with_auth("basic", "admin", "pw");
        let mut c = RestClient::new(config, &transport).unwrap();
        c.get("a", &[], None).unwrap();

        let creds = transport.last().credentials.expect("credentials");
        assert_eq!(creds.scheme, AuthScheme::Basic);
        assert_eq!(creds.user, "admin");
        assert_eq!(creds.password, "pw");
    }

    #[test]
    fn no_credentials_without_scheme() {
        let transport = StubTransport::default();
        let config = ClientConfig {
            auth_user: Some("admin".to_string()),
            auth_pass: Some("pw".to_string()),
            ..ClientConfig::new("http://api.test")
        };
        let mut c = RestClient::new(config, &transport).unwrap();
        c.get("a", &[], None).unwrap();
        assert!(transport.last().credentials.is_none());
    }

    #[test]
    fn unknown_auth_scheme_fails_construction() {
        let transport = StubTransport::default();
        let config = ClientConfig::new("http://api.test").with_auth("ntlm", "admin", "pw");
        assert!(matches!(
            RestClient::new(config, &transport),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn custom_registry_is_used() {
        let registry = FormatRegistry::default().with_inbound("application/hal+json", Format::Json);
        let transport =
            StubTransport::default().reply("application/hal+json", r#"{"status":"OK"}"#);
        let mut c = client(&transport).with_registry(registry);
        assert!(c.get("a", &[], None).unwrap().is_ok());
    }

    #[test]
    fn debug_report_shows_request_and_body() {
        let transport = StubTransport::default().reply("application/json", r#"{"status":"OK"}"#);
        let mut c = client(&transport);
        assert_eq!(c.debug_report(), "No request sent\n");

        c.set_api_key("k");
        c.get("items", &[], Some("json")).unwrap();
        let report = c.debug_report();
        assert!(report.contains("GET http://api.test/items"));
        assert!(report.contains("X-API-KEY: k"));
        assert!(report.contains("Accept: application/json"));
        assert!(report.contains("Status: 200"));
        assert!(report.contains(r#"{"status":"OK"}"#));
    }

    #[test]
    fn debug_report_of_empty_response_body() {
        let transport = StubTransport::default();
        let mut c = client(&transport);
        c.delete("items/1", &[], None).unwrap();

        let report = c.debug_report();
        assert!(report.starts_with(&"=".repeat(45)));
        assert!(report.contains("DELETE http://api.test/items/1"));
        assert!(report.contains("Status: 204\nNo response\n"));
        assert_eq!(report, c.last_exchange().unwrap().to_string());
    }
}
