//! Single-URL download pipeline.
//!
//! [`Downloader`] owns the shared HTTP client, the status stream, and the
//! pass-through writer used for `-O -`. For each request it plans a resume,
//! sends one GET, classifies the response, picks the destination, and hands
//! the body to the transfer loop. The response is classified *before* any
//! file is opened, so a server that ignores the range can never have its
//! full body appended to a partial file.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::TryStreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RANGE};
use tokio::io::{AsyncWrite, Stdout};
use tokio::time::Instant;
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::PIPE_OUTPUT_NAME;
use super::error::DownloadError;
use super::filename::resolve_filename;
use super::request::DownloadRequest;
use super::resume::{self, ResumeOutcome};
use super::sink::OutputSink;
use super::status::{StatusReporter, TerminalStatus};
use super::transfer::{ChunkPolicy, TransferContext, run_transfer};

/// What a finished download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// URL after redirects.
    pub final_url: Url,
    /// File written, `None` for the pass-through sink.
    pub destination: Option<PathBuf>,
    /// Bytes written by this run.
    pub bytes_written: u64,
    /// Content-Length of the response, when present and numeric.
    pub declared_length: Option<u64>,
    /// Bytes already on disk when an effective resume started.
    pub resume_offset: u64,
    /// Whether the body was appended to existing data.
    pub resumed: bool,
    /// Whether the server reported there was nothing left to fetch.
    pub already_complete: bool,
    /// Time from planning to sink release.
    pub elapsed: Duration,
}

impl DownloadOutcome {
    /// Size of the destination after this run.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.resume_offset.saturating_add(self.bytes_written)
    }
}

/// Fetches URLs one at a time over a shared client.
pub struct Downloader<W = Stdout> {
    client: Client,
    status: Box<dyn StatusReporter>,
    pipe: W,
}

impl<W> std::fmt::Debug for Downloader<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Downloader<Stdout> {
    /// Creates a downloader writing `-O -` output to stdout and status to
    /// the terminal.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_pipe(client, tokio::io::stdout())
    }
}

impl<W> Downloader<W>
where
    W: AsyncWrite + Send + Unpin,
{
    /// Creates a downloader with a custom pass-through writer.
    #[must_use]
    pub fn with_pipe(client: Client, pipe: W) -> Self {
        Self {
            client,
            status: Box::new(TerminalStatus::new()),
            pipe,
        }
    }

    /// Replaces the status reporter.
    #[must_use]
    pub fn with_status(mut self, status: impl StatusReporter + 'static) -> Self {
        self.status = Box::new(status);
        self
    }

    /// The pass-through writer.
    #[must_use]
    pub fn pipe(&self) -> &W {
        &self.pipe
    }

    /// Consumes the downloader, returning the pass-through writer.
    #[must_use]
    pub fn into_pipe(self) -> W {
        self.pipe
    }

    /// Downloads one URL.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::UnsupportedResumeTarget`] for resume into the pipe, before any I/O
    /// - [`DownloadError::Network`] if the request cannot be sent
    /// - [`DownloadError::HttpStatus`] for non-2xx responses; no file is created
    /// - [`DownloadError::ExhaustedNameSpace`] or [`DownloadError::Io`] while choosing or opening the file
    /// - transfer loop errors ([`DownloadError::Timeout`], [`DownloadError::TransferReadFailed`], [`DownloadError::SinkWriteFailed`])
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn download(&mut self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let started = Instant::now();
        let url = request.url.as_str();
        let plan = resume::prepare(request).await?;

        let mut builder = self.client.get(request.url.clone());
        if let Some(range) = plan.range_header() {
            builder = builder.header(RANGE, range);
        }
        let http_request = builder.build().map_err(|e| DownloadError::network(url, e))?;
        if request.verbose {
            self.dump_headers("Request header", http_request.headers());
        }

        debug!(offset = plan.offset(), "sending request");
        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        self.status.line(&format!("HTTP response status: {status}"));
        if request.verbose {
            self.dump_headers("Response header", response.headers());
        }
        let headers = response.headers();
        let content_length = header_text(headers, &CONTENT_LENGTH);
        let content_type = header_text(headers, &CONTENT_TYPE);
        let content_range = header_text(headers, &CONTENT_RANGE);
        self.status.line(&format!(
            "Content-Length: {} Content-Type: {}",
            content_length.as_deref().unwrap_or("unknown"),
            content_type.as_deref().unwrap_or("unknown")
        ));
        let declared_length = parse_content_length(content_length.as_deref());

        let outcome = resume::classify(&plan, status, content_range.as_deref());
        if outcome == ResumeOutcome::AlreadyComplete {
            self.status
                .line("The file is already fully retrieved; nothing to do.");
            info!(offset = plan.offset(), "nothing left to fetch");
            return Ok(DownloadOutcome {
                final_url: response.url().clone(),
                destination: plan.path().cloned(),
                bytes_written: 0,
                declared_length,
                resume_offset: plan.offset(),
                resumed: false,
                already_complete: true,
                elapsed: started.elapsed(),
            });
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        if outcome == ResumeOutcome::Ignored {
            warn!(%status, offset = plan.offset(), "server ignored range request");
            self.status.line(
                "Range request did not produce a Content-Range response; restarting from byte 0",
            );
        }

        let destination = if request.is_pipe() {
            None
        } else if let Some(path) = plan.path() {
            Some(path.clone())
        } else {
            Some(resolve_filename(
                &request.output_dir,
                response.url(),
                request.output_name.as_deref(),
                &request.default_page,
                content_type.as_deref(),
            )?)
        };
        let label = destination
            .as_ref()
            .map_or_else(|| PIPE_OUTPUT_NAME.to_string(), |path| path.display().to_string());
        self.status.line(&format!("Saving to: '{label}'"));

        let final_url = response.url().clone();
        let sink = match &destination {
            Some(path) => OutputSink::open_file(path, outcome.open_mode()).await?,
            None => OutputSink::pipe(&mut self.pipe),
        };

        let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        tokio::pin!(body);
        let report = run_transfer(
            &mut body,
            sink,
            TransferContext::new(url, declared_length, outcome.is_effective()),
            ChunkPolicy::from(request),
            &mut *self.status,
        )
        .await?;

        let resume_offset = match outcome {
            ResumeOutcome::Effective { offset } => offset,
            _ => 0,
        };
        if outcome.is_effective() {
            self.status.line(&format!(
                "Resumed at byte {resume_offset}; '{label}' now holds {} bytes",
                resume_offset.saturating_add(report.bytes_transferred)
            ));
        }
        info!(
            destination = %label,
            bytes = report.bytes_transferred,
            resumed = outcome.is_effective(),
            "download complete"
        );

        Ok(DownloadOutcome {
            final_url,
            destination,
            bytes_written: report.bytes_transferred,
            declared_length,
            resume_offset,
            resumed: outcome.is_effective(),
            already_complete: false,
            elapsed: started.elapsed(),
        })
    }

    fn dump_headers(&mut self, prefix: &str, headers: &HeaderMap) {
        for (name, value) in headers {
            self.status
                .line(&format!("{prefix} {name}: {}", display_value(value)));
        }
    }
}

fn header_text(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers.get(name).map(display_value)
}

fn display_value(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

/// Numeric Content-Length; anything unparsable counts as unknown.
fn parse_content_length(value: Option<&str>) -> Option<u64> {
    let raw = value?;
    match raw.trim().parse::<u64>() {
        Ok(length) => Some(length),
        Err(e) => {
            debug!(value = raw, error = %e, "ignoring unparsable Content-Length");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::request::DownloadOptions;
    use crate::download::status::RecordingStatus;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader(status: &RecordingStatus) -> Downloader<Vec<u8>> {
        Downloader::with_pipe(Client::new(), Vec::new()).with_status(status.clone())
    }

    #[test]
    fn test_parse_content_length() {
        assert_eq!(parse_content_length(Some("1234")), Some(1234));
        assert_eq!(parse_content_length(Some(" 7 ")), Some(7));
        assert_eq!(parse_content_length(Some("lots")), None);
        assert_eq!(parse_content_length(Some("-1")), None);
        assert_eq!(parse_content_length(None), None);
    }

    #[test]
    fn test_display_value_tolerates_non_utf8() {
        let value = HeaderValue::from_bytes(b"caf\xe9").unwrap();
        assert_eq!(display_value(&value), "caf\u{fffd}");
    }

    #[tokio::test]
    async fn test_pipe_download_writes_to_pass_through_writer() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<feed/>".to_vec()))
            .mount(&mock_server)
            .await;

        let status = RecordingStatus::new();
        let mut downloader = downloader(&status);
        let request = DownloadOptions {
            output_name: Some("-".to_string()),
            ..DownloadOptions::default()
        }
        .request_for(&format!("{}/feed.xml", mock_server.uri()))
        .unwrap();

        let outcome = downloader.download(&request).await.unwrap();

        assert!(outcome.destination.is_none());
        assert_eq!(outcome.bytes_written, 7);
        assert_eq!(downloader.into_pipe(), b"<feed/>");
        let lines = status.lines();
        assert_eq!(lines[0], "HTTP response status: 200 OK");
        assert!(lines.contains(&"Saving to: '-'".to_string()), "lines: {lines:?}");
    }

    #[tokio::test]
    async fn test_verbose_dumps_response_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-served-by", "edge-7")
                    .set_body_string("ok"),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let status = RecordingStatus::new();
        let mut downloader = downloader(&status);
        let request = DownloadOptions {
            verbose: true,
            output_dir: temp_dir.path().to_path_buf(),
            ..DownloadOptions::default()
        }
        .request_for(&format!("{}/ok.txt", mock_server.uri()))
        .unwrap();

        downloader.download(&request).await.unwrap();

        assert!(
            status
                .lines()
                .contains(&"Response header x-served-by: edge-7".to_string()),
            "lines: {:?}",
            status.lines()
        );
    }

    #[tokio::test]
    async fn test_resume_into_pipe_fails_before_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let status = RecordingStatus::new();
        let mut downloader = downloader(&status);
        let request = DownloadOptions {
            output_name: Some("-".to_string()),
            resume: true,
            ..DownloadOptions::default()
        }
        .request_for(&mock_server.uri())
        .unwrap();

        let result = downloader.download(&request).await;
        assert!(matches!(result, Err(DownloadError::UnsupportedResumeTarget { .. })));
        assert!(status.events().is_empty());
    }
}
