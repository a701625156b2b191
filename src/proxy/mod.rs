//! Choreographer prompt proxy
//!
//! `POST /api/choreographer` forwards a fixed prompt to the completion
//! service and answers `{ instruction }`, or `{ error }` with a status that
//! tells the caller which side failed.

pub mod client;
pub mod config;
pub mod error;
pub mod prompt;
pub mod server;

pub use client::CompletionClient;
pub use config::ProxyConfig;
pub use error::ProxyError;
pub use server::{router, run, serve_on};
