//! Client side of the protocol: build a request, send it, show the reply.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::protocol::Request;

/// Default connect/read timeout for one request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Parse `KEY=VALUE` tokens into render fields.
///
/// Splits on the first `=`, so values may contain `=`. Keys are trimmed and
/// upper-cased (`day` → `DAY`), values trimmed. The first token without `=`
/// fails the whole parse.
pub fn parse_field_pairs<S: AsRef<str>>(pairs: &[S]) -> crate::Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| RelayError::InvalidField(pair.to_string()))?;
        fields.insert(key.trim().to_uppercase(), value.trim().to_string());
    }
    Ok(fields)
}

/// Send one request and return the decoded response line.
///
/// Connecting and reading the reply are each bounded by `timeout`. A server
/// that closes without replying yields an `ok: false` value, not an error.
pub async fn send_request(addr: &str, request: &Request, timeout: Duration) -> crate::Result<Value> {
    let transport = |e: String| RelayError::Transport(addr.to_string(), e);

    let mut payload = serde_json::to_vec(request).map_err(|e| RelayError::Protocol(e.to_string()))?;
    payload.push(b'\n');

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| transport(format!("connect timed out after {:?}", timeout)))?
        .map_err(|e| transport(e.to_string()))?;

    stream
        .write_all(&payload)
        .await
        .map_err(|e| transport(e.to_string()))?;

    let mut line = String::new();
    let mut reader = BufReader::new(&mut stream);
    tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| transport(format!("no reply within {:?}", timeout)))?
        .map_err(|e| transport(e.to_string()))?;

    if line.trim().is_empty() {
        return Ok(json!({"ok": false, "error": "No response from server"}));
    }

    serde_json::from_str(line.trim()).map_err(|e| RelayError::Protocol(e.to_string()))
}

/// Pretty JSON, plus the body between markers when the response carries one.
pub fn format_response(response: &Value) -> String {
    let mut out = serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string());
    if response.get("ok") == Some(&Value::Bool(true)) {
        if let Some(body) = response.get("body") {
            let body = match body {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str("\n\n--- BODY ---\n");
            out.push_str(&body);
            out.push_str("\n------------");
        }
    }
    out
}
