//! Per-URL request descriptors built from process-wide options.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::constants::{
    DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_NAME, PIPE_OUTPUT_NAME,
};
use super::error::DownloadError;

/// Process-wide download settings, shared read-only by every URL.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Explicit output name; `-` writes to the pipe sink.
    pub output_name: Option<String>,
    /// Continue a partially downloaded file.
    pub resume: bool,
    /// Name used when a URL path has no usable last segment.
    pub default_page: String,
    /// Directory derived names are placed in.
    pub output_dir: PathBuf,
    /// Deadline for a single chunk read.
    pub chunk_timeout: Duration,
    /// Retries allowed after consecutive chunk timeouts.
    pub max_retries: u32,
    /// Dump request and response headers to the status stream.
    pub verbose: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            output_name: None,
            resume: false,
            default_page: DEFAULT_PAGE_NAME.to_string(),
            output_dir: PathBuf::from("."),
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            verbose: false,
        }
    }
}

impl DownloadOptions {
    /// Builds the descriptor for one URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] if the URL cannot be normalized.
    pub fn request_for(&self, raw_url: &str) -> Result<DownloadRequest, DownloadError> {
        Ok(DownloadRequest {
            url: normalize_url(raw_url)?,
            output_name: self.output_name.clone().filter(|name| !name.is_empty()),
            resume: self.resume,
            default_page: self.default_page.clone(),
            output_dir: self.output_dir.clone(),
            chunk_timeout: self.chunk_timeout,
            max_retries: self.max_retries,
            verbose: self.verbose,
        })
    }
}

/// Immutable descriptor for fetching one URL.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Normalized target URL.
    pub url: Url,
    /// Explicit output name, never empty.
    pub output_name: Option<String>,
    /// Continue a partially downloaded file.
    pub resume: bool,
    /// Name used when a URL path has no usable last segment.
    pub default_page: String,
    /// Directory derived names are placed in.
    pub output_dir: PathBuf,
    /// Deadline for a single chunk read.
    pub chunk_timeout: Duration,
    /// Retries allowed after consecutive chunk timeouts.
    pub max_retries: u32,
    /// Dump request and response headers to the status stream.
    pub verbose: bool,
}

impl DownloadRequest {
    /// Whether output goes to the pass-through sink instead of a file.
    #[must_use]
    pub fn is_pipe(&self) -> bool {
        self.output_name.as_deref() == Some(PIPE_OUTPUT_NAME)
    }
}

/// Parses a user-supplied URL, assuming `http://` when no scheme is given.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] for unparsable input, schemes other
/// than http/https, or URLs without a host.
pub fn normalize_url(raw: &str) -> Result<Url, DownloadError> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|_| DownloadError::invalid_url(raw))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DownloadError::invalid_url(raw));
    }
    Ok(url)
}
