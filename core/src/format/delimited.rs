//! CSV bodies: a header line followed by data rows.

use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Decode into an array of objects keyed by header. The body is split on
/// newlines; rows whose field count differs from the header, or that fail
/// to parse, are dropped.
pub(super) fn decode(body: &str) -> Result<Value, DecodeError> {
    let mut lines = body.trim().lines();
    let Some(headers) = lines.next().map(parse_line).transpose()?.flatten() else {
        return Ok(Value::Array(Vec::new()));
    };

    let mut rows = Vec::new();
    for (line, text) in lines.enumerate() {
        let record = match parse_line(text) {
            Ok(Some(record)) if record.len() == headers.len() => record,
            Ok(record) => {
                tracing::debug!(
                    row = line + 1,
                    fields = record.map_or(0, |r| r.len()),
                    expected = headers.len(),
                    "dropping CSV row with mismatched field count"
                );
                continue;
            }
            Err(error) => {
                tracing::debug!(row = line + 1, %error, "dropping unparseable CSV row");
                continue;
            }
        };
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(name, field)| (name.to_string(), Value::String(field.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

/// Parse one line as a single record. A quote left open stays inside the
/// line.
fn parse_line(line: &str) -> Result<Option<csv::StringRecord>, csv::Error> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes())
        .into_records()
        .next()
        .transpose()
}
