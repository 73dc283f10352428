//! Constants for the download module (chunking, timeouts, naming limits).

use std::time::Duration;

/// Size of one body read in the transfer loop.
pub const CHUNK_SIZE: usize = 4096;

/// Default per-chunk read timeout.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after a chunk read times out.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default name used when a URL path has no usable last segment.
pub const DEFAULT_PAGE_NAME: &str = "index.html";

/// Explicit output name that selects the pass-through (stdout) sink.
pub const PIPE_OUTPUT_NAME: &str = "-";

/// Permission bits for created output files (rw-rw----).
pub const OUTPUT_FILE_MODE: u32 = 0o660;

/// Number of cells in the progress bar.
pub const PROGRESS_BAR_WIDTH: u64 = 38;

/// Chunks between activity ticks when the total length is unknown.
pub const INDETERMINATE_TICK_INTERVAL: u64 = 20;

/// Maximum number of suffixed variants probed when a filename is taken.
pub const MAX_NAME_PROBES: u32 = 100;

/// Extension used when a Content-Type is missing or unparsable.
pub const FALLBACK_EXTENSION: &str = "htm";

/// Extension appended to an extensionless resume target before any response is seen.
pub const RESUME_TARGET_EXTENSION: &str = "html";

/// Connection establishment timeout for the HTTP transport.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
