//! Panel One domain core.
//!
//! Job status model, upload validation, endpoint construction, download
//! naming, the job tracking state machine, and view derivation. No I/O
//! lives here; the client crate drives [`tracker::JobTracker`] and executes
//! the effects it returns.

pub mod download;
pub mod endpoints;
pub mod error;
pub mod job;
pub mod tracker;
pub mod types;
pub mod upload;
pub mod view;
