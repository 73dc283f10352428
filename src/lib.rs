//! Grab core library
//!
//! Fetches HTTP resources to files or stdout, one URL at a time, with
//! resumable transfers and per-chunk read timeouts.
//!
//! # Architecture
//!
//! - [`download`] - request planning, range resume, filename resolution,
//!   the chunked transfer loop, progress estimation, and the HTTP transport
//!
//! The `grab` binary adds argument parsing and logging setup on top.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DownloadError, DownloadOptions, DownloadOutcome, DownloadRequest, Downloader, NullStatus,
    SecureProtocol, StatusReporter, TerminalStatus, TransportBuilder, run_batch, run_lines,
    select_transport,
};
