//! HTTP API: server, routing, and request validation.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod server;
