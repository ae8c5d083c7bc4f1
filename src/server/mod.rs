//! TCP template server.
//!
//! One request per connection. The accept loop hands each connection to its
//! own task, holding a semaphore permit so at most `max_connections` are in
//! flight; further clients wait in the listen backlog. The store is shared
//! read-only behind an `Arc`.

pub mod connection;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::store::TemplateStore;

use self::connection::{handle_connection, Outcome};

/// Pause after a failed accept. Errors like EMFILE persist until some
/// connection closes, so retrying at once would spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection resource bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub read_timeout: Duration,
    pub max_connections: usize,
    pub max_line_bytes: u64,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            max_connections: 64,
            max_line_bytes: 64 * 1024,
        }
    }
}

/// Bind the listening socket.
pub async fn bind(host: &str, port: u16) -> crate::Result<TcpListener> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Bind(addr, e.to_string()))
}

/// Accept and serve connections until `cancel` fires.
///
/// Accept errors are logged and the loop continues after a short pause; a
/// failing client never stops the server. In-flight connections are left to finish on their own.
pub async fn serve(
    listener: TcpListener,
    store: Arc<TemplateStore>,
    limits: ConnectionLimits,
    cancel: CancellationToken,
) -> crate::Result<()> {
    let permits = Arc::new(Semaphore::new(limits.max_connections));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, templates = store.len(), "template server listening");
    }

    loop {
        let permit = tokio::select! {
            permit = permits.clone().acquire_owned() => permit
                .map_err(|e| RelayError::Protocol(format!("connection pool closed: {}", e)))?,
            _ = cancel.cancelled() => break,
        };

        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, backoff = ?ACCEPT_ERROR_BACKOFF, "accept failed");
                    if !pause(ACCEPT_ERROR_BACKOFF, &cancel).await {
                        break;
                    }
                    continue;
                }
            },
            _ = cancel.cancelled() => break,
        };

        tracing::debug!(peer = %peer, "connection accepted");
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let _permit = permit;
            match handle_connection(
                stream,
                peer,
                &store,
                limits.read_timeout,
                limits.max_line_bytes,
            )
            .await
            {
                Ok(Outcome::Responded { ok }) => {
                    tracing::debug!(peer = %peer, ok, "handled one request, closed connection");
                }
                Ok(outcome) => {
                    tracing::debug!(peer = %peer, ?outcome, "connection abandoned");
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "connection failed");
                }
            }
        });
    }

    tracing::info!("template server stopped");
    Ok(())
}

/// Sleep for `backoff`; returns false if cancelled first.
async fn pause(backoff: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => true,
        _ = cancel.cancelled() => false,
    }
}
