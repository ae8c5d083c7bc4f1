//! Per-connection request cycle: read one line, route it, write one line, close.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::protocol::{RequestError, Response};
use crate::router::handle_request;
use crate::store::TemplateStore;

/// What happened to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response line was written.
    Responded { ok: bool },
    /// Peer closed before sending anything.
    Closed,
    /// No request line arrived before the read deadline.
    TimedOut,
}

/// Turn one request line into a response. Invalid JSON becomes an error
/// response; nothing here fails.
pub fn respond_to_line(line: &[u8], store: &TemplateStore) -> Response {
    match serde_json::from_slice::<serde_json::Value>(line) {
        Ok(request) => handle_request(&request, store),
        Err(e) => Response::Error(RequestError::InvalidJson(e.to_string())),
    }
}

/// Serve exactly one request on `stream`.
///
/// Blocks on the first line for at most `read_timeout`. A line that reaches
/// `max_line_bytes` without a terminator is answered with
/// [`RequestError::LineTooLong`] and the rest of it is drained, so the peer
/// receives the reply instead of a reset.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: &TemplateStore,
    read_timeout: Duration,
    max_line_bytes: u64,
) -> crate::Result<Outcome> {
    let transport = |e: std::io::Error| RelayError::Transport(peer.to_string(), e.to_string());
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half.take(max_line_bytes));
    let mut line = Vec::new();

    let read = tokio::time::timeout(read_timeout, reader.read_until(b'\n', &mut line)).await;
    match read {
        Err(_elapsed) => {
            tracing::warn!(peer = %peer, timeout = ?read_timeout, "no request line before deadline, dropping connection");
            return Ok(Outcome::TimedOut);
        }
        Ok(Err(e)) => return Err(transport(e)),
        Ok(Ok(0)) => {
            tracing::debug!(peer = %peer, "peer closed without sending a request");
            return Ok(Outcome::Closed);
        }
        Ok(Ok(_)) => {}
    }

    let truncated = line.last() != Some(&b'\n') && line.len() as u64 >= max_line_bytes;
    let response = if truncated {
        Response::Error(RequestError::LineTooLong(max_line_bytes))
    } else {
        respond_to_line(&line, store)
    };
    let ok = response.is_ok();
    if let Response::Error(ref e) = response {
        tracing::debug!(peer = %peer, error = %e, "request rejected");
    }

    let payload = response.to_line()?;
    write_half.write_all(&payload).await.map_err(transport)?;
    write_half.shutdown().await.map_err(transport)?;

    if truncated {
        // Unread input would turn the close into a reset and lose the reply.
        let mut rest = reader.into_inner().into_inner();
        let mut sink = tokio::io::sink();
        let drain = tokio::io::copy(&mut rest, &mut sink);
        let drained = tokio::time::timeout(read_timeout, drain).await;
        if drained.is_err() {
            tracing::debug!(peer = %peer, "peer kept sending past the line limit, closing");
        }
    }

    Ok(Outcome::Responded { ok })
}
