//! Output filename derivation, sanitization, and collision avoidance.
//!
//! Names come from, in order: an explicit name (used verbatim), the last
//! path segment of the final URL, or the configured default page. A name
//! without an extension gets one from the response Content-Type. Taken
//! names are probed as `name.1`, `name.2`, ... up to [`MAX_NAME_PROBES`].

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::constants::{FALLBACK_EXTENSION, MAX_NAME_PROBES, RESUME_TARGET_EXTENSION};
use super::error::DownloadError;

/// Resolves the output path for a response.
///
/// An explicit name (including `-`) is returned as-is with no collision
/// handling. Otherwise the name is derived from `final_url`, completed with
/// an extension inferred from `content_type` when it has none, and made
/// unique inside `dir`. Only stat calls are made; nothing is created.
///
/// # Errors
///
/// Returns [`DownloadError::ExhaustedNameSpace`] when the name and all its
/// suffixed variants exist, or [`DownloadError::Io`] when a stat fails for a
/// reason other than the entry being absent.
pub fn resolve_filename(
    dir: &Path,
    final_url: &Url,
    explicit_name: Option<&str>,
    default_page: &str,
    content_type: Option<&str>,
) -> Result<PathBuf, DownloadError> {
    if let Some(explicit) = explicit_name.filter(|name| !name.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }

    let mut name = base_name_from_url(final_url, default_page);
    if !name.contains('.') {
        let extension = extension_from_content_type(content_type);
        name = sanitize_filename(&format!("{name}.{extension}"));
    }
    unique_path(dir, &name)
}

/// Path a resume request appends to, decided before any response is seen.
///
/// Extensionless names get `.html`, since the Content-Type is not known yet.
#[must_use]
pub fn resume_target(
    dir: &Path,
    url: &Url,
    explicit_name: Option<&str>,
    default_page: &str,
) -> PathBuf {
    if let Some(explicit) = explicit_name.filter(|name| !name.is_empty()) {
        return PathBuf::from(explicit);
    }
    let mut name = base_name_from_url(url, default_page);
    if !name.contains('.') {
        name = format!("{name}.{RESUME_TARGET_EXTENSION}");
    }
    dir.join(name)
}

/// Last path segment of `url`, percent-decoded and made filesystem-safe,
/// or `default_page` when the segment is empty.
#[must_use]
pub fn base_name_from_url(url: &Url, default_page: &str) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = urlencoding::decode(segment).unwrap_or_else(|e| {
        debug!(segment = %segment, error = %e, "URL decoding failed, using raw segment");
        segment.into()
    });
    let tidied = tidy_filename(&decoded, default_page);
    sanitize_filename(&tidied)
}

/// Substitutes `default_page` for names that cannot name a file.
pub(crate) fn tidy_filename(name: &str, default_page: &str) -> String {
    if matches!(name, "" | "/" | "\\" | ".") {
        default_page.to_string()
    } else {
        name.to_string()
    }
}

/// Extension for a Content-Type header: the MIME subtype, or `htm` when the
/// header is absent or not a `type/subtype` media type.
#[must_use]
pub fn extension_from_content_type(content_type: Option<&str>) -> String {
    let Some(header) = content_type else {
        debug!("no Content-Type, using fallback extension");
        return FALLBACK_EXTENSION.to_string();
    };
    let media_type = header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match media_type.split_once('/') {
        Some((kind, subtype)) if is_token(kind) && is_token(subtype) => {
            debug!(media_type = %media_type, content_type = %header, "inferred extension from mime type");
            subtype.to_string()
        }
        _ => {
            debug!(content_type = %header, "unparsable Content-Type, using fallback extension");
            FALLBACK_EXTENSION.to_string()
        }
    }
}

// RFC 7230 token characters.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(
                    c,
                    '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
                )
        })
}

/// Returns `dir/name` if free, otherwise the first free `dir/name.N`.
///
/// # Errors
///
/// See [`resolve_filename`].
pub fn unique_path(dir: &Path, name: &str) -> Result<PathBuf, DownloadError> {
    let candidate = dir.join(name);
    if !entry_exists(&candidate)? {
        return Ok(candidate);
    }

    for suffix in 1..=MAX_NAME_PROBES {
        let probe = dir.join(format!("{name}.{suffix}"));
        if !entry_exists(&probe)? {
            debug!(name = %name, suffix, "filename taken, using suffixed variant");
            return Ok(probe);
        }
    }

    Err(DownloadError::exhausted_name_space(name, MAX_NAME_PROBES))
}

// Any entry counts, including dangling symlinks.
fn entry_exists(path: &Path) -> Result<bool, DownloadError> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
