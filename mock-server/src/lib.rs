use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// API key accepted by `/private`.
pub const API_KEY: &str = "secret";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    pub answered: bool,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Question>>>;

/// Body encoding picked from the request's `Accept` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wire {
    Json,
    Xml,
    Csv,
}

impl Wire {
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if accept.contains("xml") {
            Wire::Xml
        } else if accept.contains("csv") {
            Wire::Csv
        } else {
            Wire::Json
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Wire::Json => "application/json; charset=utf-8",
            Wire::Xml => "application/xml; charset=utf-8",
            Wire::Csv => "text/csv; charset=utf-8",
        }
    }
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/{id}",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route("/private", get(private))
        .route("/echo", get(echo).post(echo).put(echo).delete(echo))
        .route("/upload", post(upload))
        .route("/blob", get(blob))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Encode `value` for `wire` and attach the matching content type.
pub fn render(wire: Wire, status: StatusCode, value: Value) -> Response {
    let body = match wire {
        Wire::Json => value.to_string(),
        Wire::Xml => to_xml(&value),
        Wire::Csv => to_csv(&value),
    };
    (status, [(header::CONTENT_TYPE, wire.content_type())], body).into_response()
}

fn ok(wire: Wire, status: StatusCode, mut fields: Map<String, Value>) -> Response {
    fields.insert("status".to_string(), json!("OK"));
    render(wire, status, Value::Object(fields))
}

fn error(wire: Wire, status: StatusCode, message: &str) -> Response {
    render(wire, status, json!({"status": "ERROR", "error": message}))
}

fn question_fields(question: &Question) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("question".to_string(), json!(question));
    fields
}

async fn list_questions(State(db): State<Db>, headers: HeaderMap) -> Response {
    let wire = Wire::negotiate(&headers);
    let questions = db.read().await;
    let mut list: Vec<&Question> = questions.values().collect();
    list.sort_by(|a, b| a.title.cmp(&b.title));
    let mut fields = Map::new();
    fields.insert("questions".to_string(), json!(list));
    ok(wire, StatusCode::OK, fields)
}

async fn create_question(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(input): Form<HashMap<String, String>>,
) -> Response {
    let wire = Wire::negotiate(&headers);
    let Some(title) = input.get("title").filter(|t| !t.is_empty()) else {
        return error(wire, StatusCode::BAD_REQUEST, "title is required");
    };
    let question = Question {
        id: Uuid::new_v4(),
        title: title.clone(),
        answered: input.get("answered").is_some_and(|v| v == "true" || v == "1"),
    };
    db.write().await.insert(question.id, question.clone());
    ok(wire, StatusCode::CREATED, question_fields(&question))
}

async fn get_question(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let wire = Wire::negotiate(&headers);
    match db.read().await.get(&id) {
        Some(question) => ok(wire, StatusCode::OK, question_fields(question)),
        None => error(wire, StatusCode::NOT_FOUND, "question not found"),
    }
}

async fn update_question(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Form(input): Form<HashMap<String, String>>,
) -> Response {
    let wire = Wire::negotiate(&headers);
    let mut questions = db.write().await;
    let Some(question) = questions.get_mut(&id) else {
        return error(wire, StatusCode::NOT_FOUND, "question not found");
    };
    if let Some(title) = input.get("title") {
        question.title = title.clone();
    }
    if let Some(answered) = input.get("answered") {
        question.answered = answered == "true" || answered == "1";
    }
    ok(wire, StatusCode::OK, question_fields(question))
}

async fn delete_question(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let wire = Wire::negotiate(&headers);
    match db.write().await.remove(&id) {
        Some(_) => ok(wire, StatusCode::OK, Map::new()),
        None => error(wire, StatusCode::NOT_FOUND, "question not found"),
    }
}

async fn private(headers: HeaderMap) -> Response {
    let wire = Wire::negotiate(&headers);
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        Some(API_KEY) => ok(wire, StatusCode::OK, Map::new()),
        _ => error(wire, StatusCode::UNAUTHORIZED, "invalid API key"),
    }
}

/// Reflects what the client sent, always as JSON.
async fn echo(
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let get_header = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ok(
        Wire::Json,
        StatusCode::OK,
        json!({
            "method": method.as_str(),
            "query": query,
            "accept": get_header(header::ACCEPT),
            "accept_language": get_header(header::ACCEPT_LANGUAGE),
            "authorization": get_header(header::AUTHORIZATION),
            "api_key": get_header(header::HeaderName::from_static("x-api-key")),
            "content_type": get_header(header::CONTENT_TYPE),
            "body": String::from_utf8_lossy(&body),
        })
        .as_object()
        .cloned()
        .unwrap_or_default(),
    )
}

async fn upload(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return error(Wire::Json, StatusCode::UNSUPPORTED_MEDIA_TYPE, "expected multipart body");
    }
    let mut fields = Map::new();
    fields.insert("bytes".to_string(), json!(body.len()));
    fields.insert(
        "has_file".to_string(),
        json!(String::from_utf8_lossy(&body).contains("filename=\"")),
    );
    ok(Wire::Json, StatusCode::OK, fields)
}

async fn blob() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        vec![0u8, 159, 146, 150],
    )
        .into_response()
}

fn to_xml(value: &Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<xml>");
    write_xml_children(&mut out, value);
    out.push_str("</xml>");
    out
}

fn write_xml_children(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                write_xml_element(out, key, child);
            }
        }
        Value::Array(items) => {
            for item in items {
                write_xml_element(out, "item", item);
            }
        }
        Value::Null => {}
        Value::String(s) => out.push_str(&escape_xml(s)),
        other => out.push_str(&other.to_string()),
    }
}

fn write_xml_element(out: &mut String, name: &str, value: &Value) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    write_xml_children(out, value);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Rows come from the first array-of-objects field, or the value itself.
/// Only scalar columns are written, in the first row's field order.
fn to_csv(value: &Value) -> String {
    let rows: Vec<&Map<String, Value>> = value
        .as_object()
        .and_then(|map| {
            map.values().find_map(|v| {
                v.as_array()
                    .map(|items| items.iter().filter_map(Value::as_object).collect())
            })
        })
        .or_else(|| value.as_object().map(|map| vec![map]))
        .unwrap_or_default();

    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns: Vec<&String> = first
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, _)| k)
        .collect();

    let mut out = columns
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| {
                let cell = match row.get(c.as_str()) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                format!("\"{}\"", cell.replace('"', "\"\""))
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn negotiate_picks_wire_from_accept() {
        assert_eq!(Wire::negotiate(&accept("application/xml")), Wire::Xml);
        assert_eq!(Wire::negotiate(&accept("text/csv")), Wire::Csv);
        assert_eq!(Wire::negotiate(&accept("application/json")), Wire::Json);
        assert_eq!(Wire::negotiate(&HeaderMap::new()), Wire::Json);
    }

    #[test]
    fn xml_nests_objects_and_arrays() {
        let xml = to_xml(&json!({"status": "OK", "questions": [{"title": "a<b"}]}));
        assert!(xml.contains("<status>OK</status>"));
        assert!(xml.contains("<questions><item><title>a&lt;b</title></item></questions>"));
    }

    #[test]
    fn csv_uses_first_list_field() {
        let csv = to_csv(&json!({
            "status": "OK",
            "questions": [
                {"title": "one", "answered": false},
                {"title": "say \"two\"", "answered": true}
            ]
        }));
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("title,answered"));
        assert_eq!(lines.next(), Some("\"one\",\"false\""));
        assert_eq!(lines.next(), Some("\"say \"\"two\"\"\",\"true\""));
    }

    #[test]
    fn csv_of_plain_object_is_one_row() {
        let csv = to_csv(&json!({"status": "ERROR", "error": "nope"}));
        assert_eq!(csv, "status,error\n\"ERROR\",\"nope\"\n");
    }

    #[test]
    fn csv_columns_follow_struct_field_order() {
        let question = Question {
            id: Uuid::nil(),
            title: "Test".to_string(),
            answered: true,
        };
        let csv = to_csv(&json!({"status": "OK", "questions": [question]}));
        assert_eq!(csv.lines().next(), Some("id,title,answered"));
    }

    #[test]
    fn question_serializes_to_json() {
        let question = Question {
            id: Uuid::nil(),
            title: "Test".to_string(),
            answered: false,
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["title"], "Test");
        assert_eq!(json["answered"], false);
    }
}
