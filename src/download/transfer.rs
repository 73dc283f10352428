//! Bounded-time chunked copy from a response body to an output sink.
//!
//! Each chunk read is raced against a deadline with [`tokio::time::timeout`].
//! A timed-out read future is dropped before the next attempt is issued, and
//! `AsyncRead::read` consumes no bytes when cancelled, so a retry resumes at
//! the same body position and a stale result can never reach the sink. Only
//! timeouts are retried; read and write errors end the transfer at once.
//!
//! The sink is flushed and released exactly once on every exit path, before
//! the summary line is rendered.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::constants::{CHUNK_SIZE, DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_RETRIES, INDETERMINATE_TICK_INTERVAL};
use super::error::DownloadError;
use super::progress::{estimate, summary_line};
use super::request::DownloadRequest;
use super::sink::OutputSink;
use super::status::StatusReporter;

/// Timeout and retry budget for chunk reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    /// Deadline for a single read.
    pub timeout: Duration,
    /// Consecutive timeouts tolerated on one chunk before failing.
    pub max_retries: u32,
    /// Upper bound on bytes per read.
    pub chunk_size: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CHUNK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_size: CHUNK_SIZE,
        }
    }
}

impl From<&DownloadRequest> for ChunkPolicy {
    fn from(request: &DownloadRequest) -> Self {
        Self {
            timeout: request.chunk_timeout,
            max_retries: request.max_retries,
            chunk_size: CHUNK_SIZE,
        }
    }
}

/// Mutable state of one in-flight transfer.
#[derive(Debug, Clone)]
pub struct TransferContext {
    url: String,
    bytes_transferred: u64,
    chunks: u64,
    started: Instant,
    declared_length: Option<u64>,
    range_effective: bool,
}

impl TransferContext {
    /// Starts the clock for a transfer of `declared_length` bytes (if known).
    #[must_use]
    pub fn new(url: impl Into<String>, declared_length: Option<u64>, range_effective: bool) -> Self {
        Self {
            url: url.into(),
            bytes_transferred: 0,
            chunks: 0,
            started: Instant::now(),
            declared_length,
            range_effective,
        }
    }

    /// Bytes written to the sink so far.
    #[must_use]
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Length the server declared for this body, if any.
    #[must_use]
    pub fn declared_length(&self) -> Option<u64> {
        self.declared_length
    }

    /// Whether the body continues an existing file.
    #[must_use]
    pub fn range_effective(&self) -> bool {
        self.range_effective
    }

    fn record_chunk(&mut self, len: usize) {
        self.bytes_transferred = self.bytes_transferred.saturating_add(len as u64);
        self.chunks += 1;
    }

    fn has_known_length(&self) -> bool {
        self.declared_length.is_some_and(|len| len > 0)
    }
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Bytes written in this transfer.
    pub bytes_transferred: u64,
    /// Length the server declared for the body.
    pub declared_length: Option<u64>,
    /// Number of non-empty chunks written.
    pub chunks: u64,
    /// Timed-out reads that were retried.
    pub retries: u32,
    /// Wall time from context creation to sink release.
    pub elapsed: Duration,
    /// Whether the body was appended to an existing file.
    pub range_effective: bool,
}

/// Copies `body` into `sink` chunk by chunk, then releases the sink.
///
/// # Errors
///
/// - [`DownloadError::Timeout`] after `max_retries + 1` consecutive timeouts on one chunk
/// - [`DownloadError::TransferReadFailed`] on any other body error
/// - [`DownloadError::SinkWriteFailed`] when a write or the final flush fails
#[instrument(level = "debug", skip_all, fields(url = %context.url, sink = %sink.label()))]
pub async fn run_transfer<R>(
    body: &mut R,
    mut sink: OutputSink<'_>,
    mut context: TransferContext,
    policy: ChunkPolicy,
    status: &mut dyn StatusReporter,
) -> Result<TransferReport, DownloadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let label = sink.label();
    let copied = copy_chunks(body, &mut sink, &mut context, policy, status).await;
    let closed = sink.close().await;

    let elapsed = context.started.elapsed();
    let outcome = match (copied, closed) {
        (Ok(retries), Ok(())) => Ok(retries),
        (Err(e), closed) => {
            if let Err(close_error) = closed {
                warn!(error = %close_error, "flush after failed transfer also failed");
            }
            Err(e)
        }
        (Ok(_), Err(e)) => Err(e),
    };

    status.finish(&summary_line(
        &label,
        outcome.is_ok(),
        context.bytes_transferred,
        context.declared_length,
        elapsed,
    ));

    let retries = outcome?;
    if let Some(declared) = context.declared_length
        && declared != context.bytes_transferred
    {
        warn!(
            declared,
            received = context.bytes_transferred,
            "body length differs from declared Content-Length"
        );
    }
    debug!(
        bytes = context.bytes_transferred,
        chunks = context.chunks,
        retries,
        "transfer complete"
    );

    Ok(TransferReport {
        bytes_transferred: context.bytes_transferred,
        declared_length: context.declared_length,
        chunks: context.chunks,
        retries,
        elapsed,
        range_effective: context.range_effective,
    })
}

/// The read/write loop; returns the number of retried timeouts.
async fn copy_chunks<R>(
    body: &mut R,
    sink: &mut OutputSink<'_>,
    context: &mut TransferContext,
    policy: ChunkPolicy,
    status: &mut dyn StatusReporter,
) -> Result<u32, DownloadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; policy.chunk_size.max(1)];
    let mut consecutive_timeouts = 0u32;
    let mut retries = 0u32;

    loop {
        let read = tokio::time::timeout(policy.timeout, body.read(&mut buf)).await;

        let n = match read {
            Err(_elapsed) => {
                consecutive_timeouts += 1;
                if consecutive_timeouts > policy.max_retries {
                    return Err(DownloadError::timeout(&context.url, consecutive_timeouts));
                }
                retries += 1;
                warn!(
                    attempt = consecutive_timeouts,
                    max_retries = policy.max_retries,
                    offset = context.bytes_transferred,
                    "chunk read timed out, retrying"
                );
                status.line(&format!(
                    "time out reached, retrying... ({consecutive_timeouts}/{})",
                    policy.max_retries
                ));
                continue;
            }
            Ok(Err(e)) => {
                return Err(DownloadError::transfer_read(
                    &context.url,
                    context.bytes_transferred,
                    e,
                ));
            }
            Ok(Ok(0)) => return Ok(retries),
            Ok(Ok(n)) => n,
        };
        consecutive_timeouts = 0;

        sink.write_chunk(&buf[..n]).await?;
        context.record_chunk(n);
        report_progress(context, status);
    }
}

fn report_progress(context: &TransferContext, status: &mut dyn StatusReporter) {
    let sample = estimate(
        context.bytes_transferred,
        context.declared_length,
        context.started.elapsed(),
    );
    if context.has_known_length() {
        status.redraw(&sample.status_line(0));
    } else if context.chunks % INDETERMINATE_TICK_INTERVAL == 0 {
        status.redraw(&sample.status_line(context.chunks / INDETERMINATE_TICK_INTERVAL));
    }
}
