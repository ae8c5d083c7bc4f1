//! Request router — validates a decoded JSON request and dispatches it
//! against the template store.
//!
//! Input is the raw `serde_json::Value` of the request line so that missing
//! or mistyped fields become structured errors rather than decode failures.
//! Validation order matters: for `RENDER_TEMPLATE` the title is checked
//! before `fields`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::protocol::{Payload, RequestError, Response};
use crate::render::render;
use crate::store::TemplateStore;

/// Serve one decoded request. Never panics on client input.
pub fn handle_request(request: &Value, store: &TemplateStore) -> Response {
    route(request, store).into()
}

fn route(request: &Value, store: &TemplateStore) -> Result<Payload, RequestError> {
    let request = request.as_object().ok_or(RequestError::NotAnObject)?;

    match request_type(request)?.as_str() {
        "LIST_BUTTONS" => Ok(Payload::ListButtons {
            buttons: store.titles(),
        }),
        "GET_TEMPLATE" => {
            let (title, body) = lookup(request, store)?;
            Ok(Payload::GetTemplate {
                title,
                body: body.to_string(),
            })
        }
        "RENDER_TEMPLATE" => {
            let (title, body) = lookup(request, store)?;
            let fields = decode_fields(request.get("fields"))?;
            Ok(Payload::RenderTemplate {
                title,
                body: render(body, &fields),
            })
        }
        other => Err(RequestError::UnknownType(other.to_string())),
    }
}

/// `type` as text. Absent and empty values (`null`, `false`, `0`, `""`,
/// `[]`, `{}`) all count as missing.
fn request_type(request: &Map<String, Value>) -> Result<String, RequestError> {
    match request.get("type") {
        None => Err(RequestError::MissingType),
        Some(value) if is_empty_value(value) => Err(RequestError::MissingType),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Find the requested title; an absent title is looked up as `""`.
fn lookup<'a>(
    request: &Map<String, Value>,
    store: &'a TemplateStore,
) -> Result<(String, &'a str), RequestError> {
    let title = match request.get("title") {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => return Err(RequestError::UnknownTitle(other.to_string())),
    };
    match store.get(&title) {
        Some(body) => Ok((title, body)),
        None => Err(RequestError::UnknownTitle(title)),
    }
}

/// `fields` must be an object when present. Non-string values are rendered
/// as their JSON text; `null` values count as absent.
fn decode_fields(fields: Option<&Value>) -> Result<BTreeMap<String, String>, RequestError> {
    let map = match fields {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(RequestError::InvalidFields),
    };

    Ok(map
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect())
}
