//! Error types for the download module.
//!
//! Every variant carries the URL, path, or target it concerns so a single
//! error line is enough to tell which download failed and at which stage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching one URL.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A chunk read exceeded its deadline and the retry budget is spent.
    #[error("timeout downloading {url} after {attempts} attempts on the same chunk")]
    Timeout {
        /// The URL being transferred.
        url: String,
        /// Consecutive timed-out attempts on the failing chunk.
        attempts: u32,
    },

    /// The response body failed with something other than a timeout or clean EOF.
    #[error("read failed downloading {url} after {bytes_transferred} bytes: {source}")]
    TransferReadFailed {
        /// The URL being transferred.
        url: String,
        /// Bytes already written before the failure.
        bytes_transferred: u64,
        /// The underlying stream error.
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing the output sink failed.
    #[error("write failed to {target}: {source}")]
    SinkWriteFailed {
        /// File path or `-` for the pass-through sink.
        target: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Resume was requested for a destination that is not a persistent file.
    #[error("cannot resume {url}: output is a pipe, resume needs a file")]
    UnsupportedResumeTarget {
        /// The URL that was to be resumed.
        url: String,
    },

    /// Every collision-avoiding variant of a filename already exists.
    #[error("no free filename for {name} after {probes} variants")]
    ExhaustedNameSpace {
        /// The base candidate name.
        name: String,
        /// Number of suffixed variants tried.
        probes: u32,
    },

    /// The secure protocol setting is not one the transport understands.
    #[error("unrecognised secure protocol '{value}'")]
    UnknownSecureProtocol {
        /// The rejected setting.
        value: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Network-level error sending the request (DNS, connect, TLS, ...).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error outside the transfer loop (stat, open).
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP transport could not be constructed.
    #[error("failed to build HTTP transport: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Creates a chunk timeout error.
    pub fn timeout(url: impl Into<String>, attempts: u32) -> Self {
        Self::Timeout {
            url: url.into(),
            attempts,
        }
    }

    /// Creates a body read error.
    pub fn transfer_read(url: impl Into<String>, bytes_transferred: u64, source: std::io::Error) -> Self {
        Self::TransferReadFailed {
            url: url.into(),
            bytes_transferred,
            source,
        }
    }

    /// Creates a sink write error.
    pub fn sink_write(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::SinkWriteFailed {
            target: target.into(),
            source,
        }
    }

    /// Creates a resume-into-pipe error.
    pub fn unsupported_resume_target(url: impl Into<String>) -> Self {
        Self::UnsupportedResumeTarget { url: url.into() }
    }

    /// Creates a filename exhaustion error.
    pub fn exhausted_name_space(name: impl Into<String>, probes: u32) -> Self {
        Self::ExhaustedNameSpace {
            name: name.into(),
            probes,
        }
    }

    /// Creates an unknown secure protocol error.
    pub fn unknown_secure_protocol(value: impl Into<String>) -> Self {
        Self::UnknownSecureProtocol {
            value: value.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a transport construction error.
    pub fn client_build(source: reqwest::Error) -> Self {
        Self::ClientBuild { source }
    }

    /// Pipeline stage the error was raised in.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnknownSecureProtocol { .. } | Self::ClientBuild { .. } => "transport",
            Self::InvalidUrl { .. }
            | Self::UnsupportedResumeTarget { .. }
            | Self::Network { .. }
            | Self::HttpStatus { .. } => "request",
            Self::ExhaustedNameSpace { .. } | Self::Io { .. } => "resolve",
            Self::Timeout { .. } | Self::TransferReadFailed { .. } => "transfer",
            Self::SinkWriteFailed { .. } => "sink",
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: every variant needs the
// url or path the source error does not carry.
