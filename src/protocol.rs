//! Wire types for the line-delimited JSON protocol.
//!
//! Every connection carries one request line and one response line. A
//! response is either `{"ok": true, "type": ..., <payload>}` or
//! `{"ok": false, "error": "<message>"}`; [`Response`] is a tagged enum so
//! exactly one of the two shapes can exist.

use std::collections::BTreeMap;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

/// A typed request, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    ListButtons,
    GetTemplate {
        title: String,
    },
    RenderTemplate {
        title: String,
        fields: BTreeMap<String, String>,
    },
}

/// Successful response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    ListButtons { buttons: Vec<String> },
    GetTemplate { title: String, body: String },
    RenderTemplate { title: String, body: String },
}

/// Why a request could not be served. `Display` is the wire message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Request must be a JSON object")]
    NotAnObject,

    #[error("Missing request field: type")]
    MissingType,

    #[error("Unknown request type: {0}")]
    UnknownType(String),

    #[error("Unknown title: {0}")]
    UnknownTitle(String),

    #[error("fields must be an object/dict")]
    InvalidFields,

    #[error("Request line exceeds {0} bytes")]
    LineTooLong(u64),
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(Payload),
    Error(RequestError),
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> crate::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| crate::RelayError::Protocol(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }
}

impl From<Result<Payload, RequestError>> for Response {
    fn from(result: Result<Payload, RequestError>) -> Self {
        match result {
            Ok(payload) => Response::Ok(payload),
            Err(e) => Response::Error(e),
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Success<'a> {
            ok: bool,
            #[serde(flatten)]
            payload: &'a Payload,
        }

        match self {
            Response::Ok(payload) => Success { ok: true, payload }.serialize(serializer),
            Response::Error(e) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", &e.to_string())?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_request_shape() {
        let value = serde_json::to_value(Request::ListButtons).unwrap();
        assert_eq!(value, json!({"type": "LIST_BUTTONS"}));
    }

    #[test]
    fn test_render_request_shape() {
        let mut fields = BTreeMap::new();
        fields.insert("DAY".to_string(), "MON".to_string());
        let value = serde_json::to_value(Request::RenderTemplate {
            title: "Eval".to_string(),
            fields,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "RENDER_TEMPLATE", "title": "Eval", "fields": {"DAY": "MON"}})
        );
    }

    #[test]
    fn test_success_response_shape() {
        let response = Response::Ok(Payload::GetTemplate {
            title: "A".to_string(),
            body: "b".to_string(),
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "type": "GET_TEMPLATE", "title": "A", "body": "b"})
        );
    }

    #[test]
    fn test_list_response_shape() {
        let response = Response::Ok(Payload::ListButtons {
            buttons: vec!["a".to_string(), "b".to_string()],
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"ok": true, "type": "LIST_BUTTONS", "buttons": ["a", "b"]})
        );
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::Error(RequestError::UnknownTitle("missing".to_string()));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "Unknown title: missing"}));
        assert!(!response.is_ok());
    }

    #[test]
    fn test_line_too_long_message() {
        let response = Response::Error(RequestError::LineTooLong(65536));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"ok": false, "error": "Request line exceeds 65536 bytes"})
        );
    }

    #[test]
    fn test_to_line_is_single_terminated_line() {
        let response = Response::Ok(Payload::GetTemplate {
            title: "T".to_string(),
            body: "line 1\nline 2".to_string(),
        });
        let line = response.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
    }
}
