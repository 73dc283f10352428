//! Sequential multi-URL driver.
//!
//! URLs are fetched strictly in order; the first failure stops the batch so
//! the process can report it and exit non-zero.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info};

use super::error::DownloadError;
use super::orchestrator::{DownloadOutcome, Downloader};
use super::request::DownloadOptions;

/// Name used in errors for the line-oriented input stream.
const STDIN_LABEL: &str = "<stdin>";

/// Downloads each URL in order, stopping at the first error.
///
/// # Errors
///
/// Returns the first URL's normalization or download error.
pub async fn run_batch<W, I, S>(
    downloader: &mut Downloader<W>,
    options: &DownloadOptions,
    urls: I,
) -> Result<Vec<DownloadOutcome>, DownloadError>
where
    W: AsyncWrite + Send + Unpin,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut outcomes = Vec::new();
    for raw in urls {
        let request = options.request_for(raw.as_ref())?;
        outcomes.push(downloader.download(&request).await?);
    }
    info!(count = outcomes.len(), "batch complete");
    Ok(outcomes)
}

/// Downloads one URL per non-blank line of `reader`, stopping at the first
/// error. Surrounding whitespace is trimmed.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the input cannot be read, otherwise the
/// first download error.
pub async fn run_lines<W, R>(
    downloader: &mut Downloader<W>,
    options: &DownloadOptions,
    reader: R,
) -> Result<Vec<DownloadOutcome>, DownloadError>
where
    W: AsyncWrite + Send + Unpin,
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut outcomes = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| DownloadError::io(STDIN_LABEL, e))?
    {
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        debug!(url = raw, "read URL from input");
        let request = options.request_for(raw)?;
        outcomes.push(downloader.download(&request).await?);
    }
    info!(count = outcomes.len(), "input exhausted");
    Ok(outcomes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::status::RecordingStatus;
    use reqwest::Client;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with(files: &[(&str, &str)]) -> MockServer {
        let mock_server = MockServer::start().await;
        for (name, body) in files {
            Mock::given(method("GET"))
                .and(path(format!("/{name}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(*body))
                .mount(&mock_server)
                .await;
        }
        mock_server
    }

    fn options(dir: &std::path::Path) -> DownloadOptions {
        DownloadOptions {
            output_dir: dir.to_path_buf(),
            ..DownloadOptions::default()
        }
    }

    #[tokio::test]
    async fn test_run_batch_downloads_in_order() {
        let mock_server = server_with(&[("a.txt", "first"), ("b.txt", "second")]).await;
        let temp_dir = TempDir::new().unwrap();
        let mut downloader =
            Downloader::with_pipe(Client::new(), Vec::new()).with_status(RecordingStatus::new());

        let urls = [
            format!("{}/a.txt", mock_server.uri()),
            format!("{}/b.txt", mock_server.uri()),
        ];
        let outcomes = run_batch(&mut downloader, &options(temp_dir.path()), &urls)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("a.txt")).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("b.txt")).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_run_batch_stops_at_first_failure() {
        let mock_server = server_with(&[("c.txt", "third")]).await;
        let temp_dir = TempDir::new().unwrap();
        let mut downloader =
            Downloader::with_pipe(Client::new(), Vec::new()).with_status(RecordingStatus::new());

        let urls = [
            format!("{}/missing.txt", mock_server.uri()),
            format!("{}/c.txt", mock_server.uri()),
        ];
        let result = run_batch(&mut downloader, &options(temp_dir.path()), &urls).await;

        assert!(matches!(result, Err(DownloadError::HttpStatus { status: 404, .. })));
        assert!(!temp_dir.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_run_lines_skips_blank_lines() {
        let mock_server = server_with(&[("one.txt", "1"), ("two.txt", "2")]).await;
        let temp_dir = TempDir::new().unwrap();
        let mut downloader =
            Downloader::with_pipe(Client::new(), Vec::new()).with_status(RecordingStatus::new());

        let input = format!(
            "\n  {uri}/one.txt  \n\n{uri}/two.txt\n",
            uri = mock_server.uri()
        );
        let outcomes = run_lines(&mut downloader, &options(temp_dir.path()), input.as_bytes())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(temp_dir.path().join("one.txt").exists());
        assert!(temp_dir.path().join("two.txt").exists());
    }

    #[tokio::test]
    async fn test_run_lines_rejects_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let mut downloader =
            Downloader::with_pipe(Client::new(), Vec::new()).with_status(RecordingStatus::new());

        let result = run_lines(
            &mut downloader,
            &options(temp_dir.path()),
            &b"ftp://example.test/file\n"[..],
        )
        .await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
