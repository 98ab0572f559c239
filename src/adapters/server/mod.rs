//! HTTP Server Adapter
//!
//! The file server that exposes published state to browser clients.

pub mod file_server;

pub use file_server::{FileServer, ServerState};
