//! Command-line front end for Panel One.
//!
//! Picks images from disk, submits them as a generation job, and follows
//! the job until it finishes, printing the progress timeline along the
//! way.

pub mod args;
pub mod commands;
pub mod files;
pub mod render;
