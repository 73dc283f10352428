//! Resumable, timeout-bounded HTTP downloads.
//!
//! One URL flows through these stages:
//!
//! - [`request`] turns process-wide [`DownloadOptions`] into a [`DownloadRequest`]
//! - [`resume`] decides whether to send a `Range` header and whether the answer honored it
//! - [`filename`] picks a collision-free destination from the final URL and Content-Type
//! - [`transfer`] copies the body chunk by chunk, racing each read against a deadline
//! - [`progress`] turns byte counts into the redrawn status line
//!
//! [`Downloader`] ties the stages together for one URL and [`batch`] runs
//! several in order. The HTTP client itself comes from a [`TransportBuilder`].
//!
//! # Example
//!
//! ```no_run
//! use grab_core::download::{DownloadOptions, Downloader, TransportBuilder, select_transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = select_transport("auto", false)?.build()?;
//! let mut downloader = Downloader::new(client);
//! let request = DownloadOptions::default().request_for("example.com/paper.pdf")?;
//! let outcome = downloader.download(&request).await?;
//! println!("wrote {} bytes", outcome.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod batch;
mod constants;
mod error;
pub mod filename;
mod orchestrator;
pub mod progress;
pub mod request;
pub mod resume;
mod sink;
mod status;
pub mod transfer;
mod transport;

pub use batch::{run_batch, run_lines};
pub use constants::{
    CHUNK_SIZE, DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_NAME, PIPE_OUTPUT_NAME,
};
pub use error::DownloadError;
pub use orchestrator::{DownloadOutcome, Downloader};
pub use request::{DownloadOptions, DownloadRequest, normalize_url};
pub use sink::{OpenMode, OutputSink};
pub use status::{NullStatus, RecordingStatus, StatusEvent, StatusReporter, TerminalStatus};
pub use transport::{
    DefaultTransport, PolicyTransport, SecureProtocol, TransportBuilder, select_transport,
};

// Note: no module-local Result alias; signatures spell out
// `Result<T, DownloadError>`.
