//! CLI entry point for grab.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use grab_core::{Downloader, NullStatus, TerminalStatus, run_batch, run_lines, select_transport};
use tokio::io::BufReader;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Error messages already embed their source.
            eprintln!("grab: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Where URLs come from for one invocation.
#[derive(Debug, PartialEq, Eq)]
enum UrlSource {
    Args,
    Stdin,
}

fn url_source(urls: &[String], stdin_is_terminal: bool) -> Result<UrlSource> {
    if !urls.is_empty() {
        Ok(UrlSource::Args)
    } else if !stdin_is_terminal {
        Ok(UrlSource::Stdin)
    } else {
        eprintln!("No URLs given. Pass them as arguments or pipe them via stdin.");
        eprintln!("Example: echo 'https://example.com/file.pdf' | grab");
        bail!("not enough arguments")
    }
}

async fn run(args: &Args) -> Result<()> {
    let source = url_source(&args.urls, io::stdin().is_terminal())?;
    let transport = select_transport(&args.secure_protocol, args.no_check_certificate)?;
    let client = transport.build()?;

    let mut downloader = Downloader::new(client);
    if args.quiet {
        downloader = downloader.with_status(NullStatus);
    } else {
        downloader = downloader.with_status(TerminalStatus::new());
    }
    let options = args.download_options();

    let outcomes = match source {
        UrlSource::Args => run_batch(&mut downloader, &options, &args.urls).await?,
        UrlSource::Stdin => {
            run_lines(&mut downloader, &options, BufReader::new(tokio::io::stdin())).await?
        }
    };

    info!(downloads = outcomes.len(), "all downloads finished");
    Ok(())
}
