//! Panel One job client.
//!
//! Creates generation jobs on the backend, follows them through the
//! realtime channel and a watchdog poller, and keeps the active job id in
//! a session store so tracking survives restarts.

pub mod api;
pub mod channel;
pub mod config;
pub mod controller;
pub mod download;
pub mod messages;
pub mod poller;
pub mod processor;
pub mod session;

pub use controller::JobController;
