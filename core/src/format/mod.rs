//! Body formats and the tables used to negotiate them.
//!
//! # Design
//! `Format` is a closed set of decoders. `FormatRegistry` holds two lookup
//! tables: format name to `(Format, MIME)` for the outbound `Accept` header,
//! and MIME to `Format` for sniffing a response's declared content type.
//! The tables are plain data and are deliberately not kept symmetric:
//! `text/xml` is recognized inbound but never requested, and `raw` is
//! requested as `text/plain` but `text/plain` responses are not decoded.

mod delimited;
mod serialized;
mod xml;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::DecodeError;

/// A named body encoding with its own decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Xml,
    Json,
    Csv,
    /// PHP-style serialized scalars and arrays.
    Serialize,
    /// Body passed through as a trimmed string.
    Raw,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Serialize => "serialize",
            Format::Raw => "raw",
        }
    }

    /// Decode a response body into a structured value.
    pub fn decode(self, body: &[u8]) -> Result<Value, DecodeError> {
        match self {
            Format::Xml => xml::decode(std::str::from_utf8(body)?),
            Format::Json => Ok(serde_json::from_slice(body.trim_ascii())?),
            Format::Csv => delimited::decode(std::str::from_utf8(body)?),
            Format::Serialize => serialized::decode(body.trim_ascii()),
            Format::Raw => Ok(Value::String(
                String::from_utf8_lossy(body.trim_ascii()).into_owned(),
            )),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outbound and inbound format tables.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    outbound: HashMap<String, (Format, String)>,
    inbound: HashMap<String, Format>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::empty()
            .with_outbound("xml", Format::Xml, "application/xml")
            .with_outbound("json", Format::Json, "application/json")
            .with_outbound("serialize", Format::Serialize, "application/vnd.php.serialized")
            .with_outbound("csv", Format::Csv, "text/csv")
            .with_outbound("raw", Format::Raw, "text/plain")
            // Older callers ask for "php"; it no longer evaluates anything.
            .with_outbound("php", Format::Raw, "text/plain")
            .with_inbound("application/xml", Format::Xml)
            .with_inbound("text/xml", Format::Xml)
            .with_inbound("application/json", Format::Json)
            .with_inbound("text/json", Format::Json)
            .with_inbound("text/csv", Format::Csv)
            .with_inbound("application/csv", Format::Csv)
            .with_inbound("application/vnd.php.serialized", Format::Serialize)
    }
}

impl FormatRegistry {
    /// A registry that knows no formats.
    pub fn empty() -> Self {
        Self {
            outbound: HashMap::new(),
            inbound: HashMap::new(),
        }
    }

    pub fn with_outbound(mut self, name: &str, format: Format, mime: &str) -> Self {
        self.outbound
            .insert(name.to_string(), (format, mime.to_string()));
        self
    }

    pub fn with_inbound(mut self, mime: &str, format: Format) -> Self {
        self.inbound.insert(mime.to_ascii_lowercase(), format);
        self
    }

    /// Format and MIME type registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<(Format, &str)> {
        self.outbound
            .get(name)
            .map(|(format, mime)| (*format, mime.as_str()))
    }

    /// Format for a declared content type. Parameters after the first `;`
    /// are ignored, as are surrounding whitespace and case.
    pub fn detect(&self, content_type: &str) -> Option<Format> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.inbound.get(&mime).copied()
    }
}
