//! Progress, throughput, and ETA estimation for the status stream.
//!
//! Everything here is a pure function of `(bytes, declared length, elapsed)`.
//! Throughput is reported in KB/s (1 KB = 1000 bytes). Values that would need
//! a division by zero come back as `None` and render as `-.--` / `?`.

use std::fmt;
use std::time::Duration;

use super::constants::PROGRESS_BAR_WIDTH;

/// Marker drawn when the total length is unknown.
const ACTIVITY_MARKER: &str = "<=>";

/// One progress sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Estimate {
    /// Total length known and non-zero.
    Determinate {
        /// `floor(100 * bytes / length)`; may exceed 100 if the server under-reports.
        percent: u64,
        /// Filled bar cells, clamped to `[0, PROGRESS_BAR_WIDTH]`.
        filled_cells: u64,
        /// Bytes transferred so far.
        bytes: u64,
        /// Average throughput in KB/s, `None` when no time has elapsed.
        throughput_kbps: Option<f64>,
        /// Seconds remaining, `None` when throughput is undefined or zero.
        eta_secs: Option<f64>,
    },
    /// Total length unknown or declared as zero.
    Indeterminate {
        /// Bytes transferred so far.
        bytes: u64,
        /// Average throughput in KB/s, `None` when no time has elapsed.
        throughput_kbps: Option<f64>,
    },
}

/// Builds a progress sample.
#[must_use]
pub fn estimate(bytes: u64, declared_length: Option<u64>, elapsed: Duration) -> Estimate {
    let throughput = throughput_kbps(bytes, elapsed);
    match declared_length {
        Some(length) if length > 0 => {
            let percent = percent(bytes, length);
            Estimate::Determinate {
                percent,
                filled_cells: filled_cells(percent),
                bytes,
                throughput_kbps: throughput,
                eta_secs: eta_secs(bytes, length, throughput),
            }
        }
        _ => Estimate::Indeterminate {
            bytes,
            throughput_kbps: throughput,
        },
    }
}

/// `floor(100 * bytes / length)`; `length` must be non-zero.
#[must_use]
pub fn percent(bytes: u64, length: u64) -> u64 {
    let scaled = u128::from(bytes) * 100 / u128::from(length.max(1));
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// `floor(PROGRESS_BAR_WIDTH * percent / 100)` clamped to the bar width.
#[must_use]
pub fn filled_cells(percent: u64) -> u64 {
    let cells = u128::from(percent) * u128::from(PROGRESS_BAR_WIDTH) / 100;
    u64::try_from(cells.min(u128::from(PROGRESS_BAR_WIDTH))).unwrap_or(PROGRESS_BAR_WIDTH)
}

/// `bytes / 1000 / elapsed_seconds`, or `None` when `elapsed` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput_kbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| bytes as f64 / 1000.0 / secs)
}

/// `(length - bytes) / 1000 / throughput`, or `None` when throughput is
/// undefined or zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn eta_secs(bytes: u64, length: u64, throughput_kbps: Option<f64>) -> Option<f64> {
    let rate = throughput_kbps.filter(|rate| *rate > 0.0)?;
    let remaining_kb = length.saturating_sub(bytes) as f64 / 1000.0;
    Some(remaining_kb / rate)
}

/// Bar body: `filled` `=` cells, a `>` head, then blanks to the bar width.
#[must_use]
pub fn render_bar(filled_cells: u64) -> String {
    let filled = filled_cells.min(PROGRESS_BAR_WIDTH);
    let blanks = PROGRESS_BAR_WIDTH - filled;
    format!(
        "{}>{}",
        "=".repeat(usize::try_from(filled).unwrap_or(0)),
        " ".repeat(usize::try_from(blanks).unwrap_or(0))
    )
}

/// Activity marker slid `tick` positions along the bar, wrapping around.
#[must_use]
pub fn render_activity(tick: u64) -> String {
    // Same outer width as render_bar: PROGRESS_BAR_WIDTH + 1 cells.
    let span = PROGRESS_BAR_WIDTH + 1 - ACTIVITY_MARKER.len() as u64;
    let offset = usize::try_from(tick % (span + 1)).unwrap_or(0);
    let trailing = usize::try_from(span).unwrap_or(0) - offset;
    format!("{}{ACTIVITY_MARKER}{}", " ".repeat(offset), " ".repeat(trailing))
}

fn fmt_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-.--".to_string(), |r| format!("{r:.2}"))
}

impl Estimate {
    /// Bytes transferred in this sample.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        match self {
            Self::Determinate { bytes, .. } | Self::Indeterminate { bytes, .. } => *bytes,
        }
    }

    /// Throughput in this sample.
    #[must_use]
    pub fn throughput_kbps(&self) -> Option<f64> {
        match self {
            Self::Determinate {
                throughput_kbps, ..
            }
            | Self::Indeterminate {
                throughput_kbps, ..
            } => *throughput_kbps,
        }
    }

    /// Single redrawable status line. `tick` positions the activity marker
    /// for indeterminate samples and is ignored otherwise.
    #[must_use]
    pub fn status_line(&self, tick: u64) -> String {
        match self {
            Self::Determinate {
                percent,
                filled_cells,
                bytes,
                throughput_kbps,
                eta_secs,
            } => {
                let eta = eta_secs.map_or_else(|| "?s".to_string(), |e| format!("{e:.1}s"));
                format!(
                    "{percent:>3}% [{}] {bytes}\t{}KB/s eta {eta}",
                    render_bar(*filled_cells),
                    fmt_rate(*throughput_kbps)
                )
            }
            Self::Indeterminate {
                bytes,
                throughput_kbps,
            } => format!(
                "     [{}] {bytes}\t{}KB/s",
                render_activity(tick),
                fmt_rate(*throughput_kbps)
            ),
        }
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line(0))
    }
}

/// Final line for a transfer: total bytes, elapsed time, and average throughput.
#[must_use]
pub fn summary_line(
    label: &str,
    completed: bool,
    bytes: u64,
    declared_length: Option<u64>,
    elapsed: Duration,
) -> String {
    let total = declared_length.map_or_else(|| "?".to_string(), |len| len.to_string());
    let verb = if completed { "saved" } else { "incomplete" };
    format!(
        "'{label}' {verb} [{bytes}/{total}] in {:.1}s ({}KB/s)",
        elapsed.as_secs_f64(),
        fmt_rate(throughput_kbps(bytes, elapsed))
    )
}
