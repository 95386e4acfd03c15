//! Panel One web server library.
//!
//! Serves the image download proxy and a health check. Exposes the
//! router, config and state so integration tests and the binary
//! entrypoint can both build the same app.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
