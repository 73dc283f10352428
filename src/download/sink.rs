//! Write destinations for transferred bytes.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use super::constants::{OUTPUT_FILE_MODE, PIPE_OUTPUT_NAME};
use super::error::DownloadError;

/// How a file sink is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate.
    Truncate,
    /// Append to an existing file (effective resume).
    Append,
}

/// The single open destination of a transfer.
///
/// Consumed by [`OutputSink::close`], which flushes; a sink is closed exactly
/// once per transfer.
pub enum OutputSink<'a> {
    /// A file on disk.
    File {
        /// Where the file lives.
        path: PathBuf,
        /// Buffered handle.
        writer: BufWriter<File>,
    },
    /// A pass-through stream such as stdout.
    Pipe {
        /// Borrowed stream; it stays open after the transfer.
        writer: &'a mut (dyn AsyncWrite + Send + Unpin),
    },
}

impl std::fmt::Debug for OutputSink<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File { path, .. } => f.debug_struct("File").field("path", path).finish(),
            Self::Pipe { .. } => f.write_str("Pipe"),
        }
    }
}

impl<'a> OutputSink<'a> {
    /// Opens a file sink with mode 0o660 on creation.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the file cannot be opened.
    pub async fn open_file(path: &Path, mode: OpenMode) -> Result<Self, DownloadError> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Truncate => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true),
        };
        #[cfg(unix)]
        options.mode(OUTPUT_FILE_MODE);

        let file = options
            .open(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        debug!(path = %path.display(), ?mode, "opened output file");
        Ok(Self::File {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Wraps a pass-through stream.
    pub fn pipe(writer: &'a mut (dyn AsyncWrite + Send + Unpin)) -> Self {
        Self::Pipe { writer }
    }

    /// Whether this sink is the pass-through stream.
    #[must_use]
    pub fn is_pipe(&self) -> bool {
        matches!(self, Self::Pipe { .. })
    }

    /// Display name: the file path, or `-` for the pipe.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Pipe { .. } => PIPE_OUTPUT_NAME.to_string(),
        }
    }

    /// Writes all of `bytes`; a short write is an error.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SinkWriteFailed`] on any write error.
    pub async fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), DownloadError> {
        let result = match self {
            Self::File { writer, .. } => writer.write_all(bytes).await,
            Self::Pipe { writer } => writer.write_all(bytes).await,
        };
        result.map_err(|e| DownloadError::sink_write(self.label(), e))
    }

    /// Flushes and releases the sink.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SinkWriteFailed`] if buffered data cannot be
    /// flushed.
    pub async fn close(self) -> Result<(), DownloadError> {
        let label = self.label();
        let result = match self {
            Self::File { mut writer, .. } => writer.flush().await,
            Self::Pipe { writer } => writer.flush().await,
        };
        result.map_err(|e| DownloadError::sink_write(label, e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_truncate_replaces_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.bin");
        std::fs::write(&path, b"old content that is long").unwrap();

        let mut sink = OutputSink::open_file(&path, OpenMode::Truncate).await.unwrap();
        sink.write_chunk(b"new").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_append_keeps_existing_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.bin");
        std::fs::write(&path, b"head-").unwrap();

        let mut sink = OutputSink::open_file(&path, OpenMode::Append).await.unwrap();
        sink.write_chunk(b"tail").await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"head-tail");
    }

    #[tokio::test]
    async fn test_append_requires_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.bin");
        let result = OutputSink::open_file(&path, OpenMode::Append).await;
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_created_file_has_no_world_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("perm.bin");
        let sink = OutputSink::open_file(&path, OpenMode::Truncate).await.unwrap();
        sink.close().await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o007, 0, "mode was {mode:o}");
        assert_eq!(mode & 0o100, 0, "mode was {mode:o}");
    }

    #[tokio::test]
    async fn test_pipe_sink_writes_through_and_labels_dash() {
        let mut buffer: Vec<u8> = Vec::new();
        {
            let mut sink = OutputSink::pipe(&mut buffer);
            assert!(sink.is_pipe());
            assert_eq!(sink.label(), "-");
            sink.write_chunk(b"abc").await.unwrap();
            sink.close().await.unwrap();
        }
        assert_eq!(buffer, b"abc");
    }
}
