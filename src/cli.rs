//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use grab_core::download::{DEFAULT_MAX_RETRIES, DEFAULT_PAGE_NAME};
use grab_core::DownloadOptions;

/// Fetch HTTP resources to files or stdout.
///
/// Downloads each URL in turn, naming files after the last path segment.
/// With no URL arguments, URLs are read one per line from stdin.
#[derive(Parser, Debug)]
#[command(name = "grab")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to download; `http://` is assumed when no scheme is given
    pub urls: Vec<String>,

    /// Write to FILE instead of a name derived from the URL ('-' for stdout)
    #[arg(short = 'O', long = "output-document", value_name = "FILE")]
    pub output_document: Option<String>,

    /// Continue a partially downloaded file
    #[arg(short = 'c', long = "continue")]
    pub resume: bool,

    /// Directory derived file names are saved in
    #[arg(short = 'P', long = "directory-prefix", value_name = "DIR", default_value = ".")]
    pub directory_prefix: PathBuf,

    /// File name used when the URL path ends in '/'
    #[arg(long, value_name = "NAME", default_value = DEFAULT_PAGE_NAME)]
    pub default_page: String,

    /// Seconds to wait for each chunk of the response body (1-3600)
    #[arg(short = 'T', long, value_name = "SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Retries after a chunk read times out (0-100)
    #[arg(short = 't', long, value_name = "N", default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=100))]
    pub tries: u32,

    /// Minimum TLS version: auto, TLSv1, TLSv1_1, TLSv1_2, TLSv1_3
    #[arg(long, value_name = "PROTOCOL", default_value = "auto")]
    pub secure_protocol: String,

    /// Do not verify server certificates
    #[arg(long)]
    pub no_check_certificate: bool,

    /// Increase output verbosity (-v headers, -vv debug logs, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress status output; only errors are printed
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Settings shared by every URL of this run.
    #[must_use]
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            output_name: self.output_document.clone(),
            resume: self.resume,
            default_page: self.default_page.clone(),
            output_dir: self.directory_prefix.clone(),
            chunk_timeout: Duration::from_secs(self.timeout),
            max_retries: self.tries,
            verbose: self.verbose > 0,
        }
    }
}
