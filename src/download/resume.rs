//! HTTP range resume: deciding whether to ask for a byte range and whether
//! the server honored it.
//!
//! A resume is only *effective* when the response is `206 Partial Content`
//! with a `Content-Range` starting exactly at the local file size. Any other
//! answer means the body is the whole resource, so the caller must truncate
//! rather than append.

use std::path::PathBuf;

use reqwest::StatusCode;
use tracing::debug;

use super::error::DownloadError;
use super::filename::resume_target;
use super::request::DownloadRequest;
use super::sink::OpenMode;

/// What the request should ask for, decided before it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePlan {
    /// Resume not requested; the name is resolved from the response.
    Disabled,
    /// Resume requested but there is no local data yet.
    Fresh {
        /// File the download goes to.
        path: PathBuf,
    },
    /// Local data present; ask for the bytes after it.
    Continue {
        /// File to append to.
        path: PathBuf,
        /// Current size of the local file.
        offset: u64,
    },
}

impl ResumePlan {
    /// `Range` header value, present only for [`ResumePlan::Continue`].
    #[must_use]
    pub fn range_header(&self) -> Option<String> {
        match self {
            Self::Continue { offset, .. } => Some(format!("bytes={offset}-")),
            _ => None,
        }
    }

    /// Fixed output path, if resume decided it.
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Disabled => None,
            Self::Fresh { path } | Self::Continue { path, .. } => Some(path),
        }
    }

    /// Local bytes already held.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Continue { offset, .. } => *offset,
            _ => 0,
        }
    }
}

/// How the server answered a (possibly) ranged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No range was requested.
    NotRequested,
    /// The server sent the requested tail; append.
    Effective {
        /// First byte of the body within the resource.
        offset: u64,
    },
    /// The server ignored or mangled the range; restart from byte 0.
    Ignored,
    /// The local file already holds the whole resource.
    AlreadyComplete,
}

impl ResumeOutcome {
    /// Open mode for the sink.
    #[must_use]
    pub fn open_mode(self) -> OpenMode {
        match self {
            Self::Effective { .. } => OpenMode::Append,
            _ => OpenMode::Truncate,
        }
    }

    /// Whether the transfer appends to existing data.
    #[must_use]
    pub fn is_effective(self) -> bool {
        matches!(self, Self::Effective { .. })
    }
}

/// Parsed `Content-Range` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte position, `None` for the unsatisfied form `bytes */len`.
    pub range: Option<(u64, u64)>,
    /// Complete length, `None` when given as `*`.
    pub complete_length: Option<u64>,
}

/// Parses `bytes <start>-<end>/<len|*>` or `bytes */<len>`.
#[must_use]
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, length) = rest.split_once('/')?;
    let complete_length = match length.trim() {
        "*" => None,
        len => Some(len.parse::<u64>().ok()?),
    };
    let range = match range.trim() {
        "*" => None,
        span => {
            let (start, end) = span.split_once('-')?;
            let start = start.trim().parse::<u64>().ok()?;
            let end = end.trim().parse::<u64>().ok()?;
            if end < start {
                return None;
            }
            Some((start, end))
        }
    };
    if range.is_none() && complete_length.is_none() {
        return None;
    }
    Some(ContentRange {
        range,
        complete_length,
    })
}

/// Decides the plan for `request`, statting the resume target if needed.
///
/// # Errors
///
/// Returns [`DownloadError::UnsupportedResumeTarget`] when resume is combined
/// with the pipe sink, and [`DownloadError::Io`] when the stat fails for a
/// reason other than the file being absent.
pub async fn prepare(request: &DownloadRequest) -> Result<ResumePlan, DownloadError> {
    if !request.resume {
        return Ok(ResumePlan::Disabled);
    }
    if request.is_pipe() {
        return Err(DownloadError::unsupported_resume_target(request.url.as_str()));
    }

    let path = resume_target(
        &request.output_dir,
        &request.url,
        request.output_name.as_deref(),
        &request.default_page,
    );
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(path = %path.display(), offset = meta.len(), "resuming from existing file");
            Ok(ResumePlan::Continue {
                offset: meta.len(),
                path,
            })
        }
        Ok(_) => Ok(ResumePlan::Fresh { path }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no partial file, starting fresh");
            Ok(ResumePlan::Fresh { path })
        }
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

/// Classifies the response to a request made under `plan`.
#[must_use]
pub fn classify(plan: &ResumePlan, status: StatusCode, content_range: Option<&str>) -> ResumeOutcome {
    let ResumePlan::Continue { offset, .. } = plan else {
        return ResumeOutcome::NotRequested;
    };
    let parsed = content_range.and_then(parse_content_range);

    if status == StatusCode::RANGE_NOT_SATISFIABLE {
        // `bytes */len` with len == offset means nothing is left to fetch.
        // A header that is present but unparsable proves nothing.
        let complete = match content_range {
            None => true,
            Some(_) => parsed.is_some_and(|range| range.complete_length == Some(*offset)),
        };
        return if complete {
            ResumeOutcome::AlreadyComplete
        } else {
            ResumeOutcome::Ignored
        };
    }

    match parsed {
        Some(ContentRange {
            range: Some((start, _)),
            ..
        }) if status == StatusCode::PARTIAL_CONTENT && start == *offset => {
            ResumeOutcome::Effective { offset: start }
        }
        _ => {
            debug!(%status, ?content_range, offset, "range request not honored");
            ResumeOutcome::Ignored
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::request::DownloadOptions;
    use tempfile::TempDir;

    fn request(dir: &std::path::Path, output_name: Option<&str>, resume: bool) -> DownloadRequest {
        DownloadOptions {
            output_name: output_name.map(str::to_string),
            resume,
            output_dir: dir.to_path_buf(),
            ..DownloadOptions::default()
        }
        .request_for("http://example.test/archive.tar")
        .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_disabled_without_resume_flag() {
        let temp_dir = TempDir::new().unwrap();
        let plan = prepare(&request(temp_dir.path(), None, false)).await.unwrap();
        assert_eq!(plan, ResumePlan::Disabled);
        assert_eq!(plan.range_header(), None);
    }

    #[tokio::test]
    async fn test_prepare_rejects_pipe_target() {
        let temp_dir = TempDir::new().unwrap();
        let result = prepare(&request(temp_dir.path(), Some("-"), true)).await;
        assert!(matches!(
            result,
            Err(DownloadError::UnsupportedResumeTarget { .. })
        ));
    }

    #[tokio::test]
    async fn test_prepare_missing_file_is_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let plan = prepare(&request(temp_dir.path(), None, true)).await.unwrap();
        assert_eq!(
            plan,
            ResumePlan::Fresh {
                path: temp_dir.path().join("archive.tar")
            }
        );
        assert_eq!(plan.range_header(), None);
    }

    #[tokio::test]
    async fn test_prepare_existing_file_requests_open_range() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("archive.tar"), vec![7u8; 1234]).unwrap();

        let plan = prepare(&request(temp_dir.path(), None, true)).await.unwrap();
        assert_eq!(plan.offset(), 1234);
        assert_eq!(plan.range_header().as_deref(), Some("bytes=1234-"));
    }

    #[tokio::test]
    async fn test_prepare_empty_file_is_fresh() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("archive.tar"), b"").unwrap();
        let plan = prepare(&request(temp_dir.path(), None, true)).await.unwrap();
        assert!(matches!(plan, ResumePlan::Fresh { .. }));
    }

    #[tokio::test]
    async fn test_prepare_uses_explicit_name() {
        let temp_dir = TempDir::new().unwrap();
        let explicit = temp_dir.path().join("named.part");
        std::fs::write(&explicit, b"abc").unwrap();

        let plan = prepare(&request(temp_dir.path(), explicit.to_str(), true))
            .await
            .unwrap();
        assert_eq!(
            plan,
            ResumePlan::Continue {
                path: explicit,
                offset: 3
            }
        );
    }

    fn continue_plan(offset: u64) -> ResumePlan {
        ResumePlan::Continue {
            path: PathBuf::from("f"),
            offset,
        }
    }

    #[test]
    fn test_classify_effective_on_matching_content_range() {
        let outcome = classify(
            &continue_plan(100),
            StatusCode::PARTIAL_CONTENT,
            Some("bytes 100-199/200"),
        );
        assert_eq!(outcome, ResumeOutcome::Effective { offset: 100 });
        assert_eq!(outcome.open_mode(), OpenMode::Append);
    }

    #[test]
    fn test_classify_ignored_when_server_sends_full_body() {
        let outcome = classify(&continue_plan(100), StatusCode::OK, None);
        assert_eq!(outcome, ResumeOutcome::Ignored);
        assert_eq!(outcome.open_mode(), OpenMode::Truncate);
    }

    #[test]
    fn test_classify_ignored_on_mismatched_start() {
        let outcome = classify(
            &continue_plan(100),
            StatusCode::PARTIAL_CONTENT,
            Some("bytes 0-199/200"),
        );
        assert_eq!(outcome, ResumeOutcome::Ignored);
    }

    #[test]
    fn test_classify_not_requested_without_continue_plan() {
        assert_eq!(
            classify(&ResumePlan::Disabled, StatusCode::OK, Some("bytes 0-1/2")),
            ResumeOutcome::NotRequested
        );
        assert_eq!(
            classify(
                &ResumePlan::Fresh {
                    path: PathBuf::from("f")
                },
                StatusCode::OK,
                None
            ),
            ResumeOutcome::NotRequested
        );
    }

    #[test]
    fn test_classify_range_not_satisfiable_at_full_length_is_complete() {
        assert_eq!(
            classify(
                &continue_plan(200),
                StatusCode::RANGE_NOT_SATISFIABLE,
                Some("bytes */200")
            ),
            ResumeOutcome::AlreadyComplete
        );
        assert_eq!(
            classify(&continue_plan(200), StatusCode::RANGE_NOT_SATISFIABLE, None),
            ResumeOutcome::AlreadyComplete
        );
        assert_eq!(
            classify(
                &continue_plan(300),
                StatusCode::RANGE_NOT_SATISFIABLE,
                Some("bytes */200")
            ),
            ResumeOutcome::Ignored
        );
    }

    #[test]
    fn test_classify_range_not_satisfiable_with_malformed_header_is_ignored() {
        assert_eq!(
            classify(
                &continue_plan(5000),
                StatusCode::RANGE_NOT_SATISFIABLE,
                Some("garbage")
            ),
            ResumeOutcome::Ignored
        );
    }

    #[test]
    fn test_parse_content_range_forms() {
        assert_eq!(
            parse_content_range("bytes 5-9/10"),
            Some(ContentRange {
                range: Some((5, 9)),
                complete_length: Some(10)
            })
        );
        assert_eq!(
            parse_content_range("bytes 5-9/*"),
            Some(ContentRange {
                range: Some((5, 9)),
                complete_length: None
            })
        );
        assert_eq!(
            parse_content_range("bytes */10"),
            Some(ContentRange {
                range: None,
                complete_length: Some(10)
            })
        );
    }

    #[test]
    fn test_parse_content_range_rejects_malformed() {
        assert_eq!(parse_content_range("items 0-1/2"), None);
        assert_eq!(parse_content_range("bytes 9-5/10"), None);
        assert_eq!(parse_content_range("bytes */*"), None);
        assert_eq!(parse_content_range("bytes a-b/c"), None);
        assert_eq!(parse_content_range(""), None);
    }
}
