//! Template relay — serves named text templates over line-delimited JSON.
//! Templates are loaded once from a flat text file into an immutable store;
//! each TCP connection carries one request (list, get or render) and one reply.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod render;
pub mod router;
pub mod server;
pub mod store;
pub mod web;

pub use client::{format_response, parse_field_pairs, send_request, DEFAULT_TIMEOUT};
pub use config::{RelayConfig, TemplateFormat, DEFAULT_PORT};
pub use error::{RelayError, Result};
pub use protocol::{Payload, Request, RequestError, Response};
pub use render::{render, Placeholder};
pub use router::handle_request;
pub use server::{bind, serve, ConnectionLimits};
pub use store::{HeaderFormat, MarkerHeader, TemplateStore};
pub use web::ButtonPage;
