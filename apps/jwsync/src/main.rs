//! # jwsync - JW Library Backup Merger
//!
//! The main binary for jwsync.
//!
//! This application provides:
//! - CLI interface for merging, inspecting and verifying backups
//! - HTTP upload API (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/jwsync (THE BINARY)              │
//! │                                                      │
//! │   ┌─────────────┐    ┌─────────────┐                 │
//! │   │    CLI      │    │  HTTP API   │                 │
//! │   │   (clap)    │    │   (axum)    │                 │
//! │   └──────┬──────┘    └──────┬──────┘                 │
//! │          └─────────┬────────┘                        │
//! │                    ▼                                 │
//! │            ┌───────────────┐                         │
//! │            │  jwsync-core  │                         │
//! │            │  (THE LOGIC)  │                         │
//! │            └───────────────┘                         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Merge the tablet's backup into the phone's
//! jwsync merge -p phone.jwlibrary -s tablet.jwlibrary -o ~/Backups
//!
//! # Inspect and verify
//! jwsync inspect -f phone.jwlibrary
//! jwsync verify -f merged_2024-06-02_13-04-05.jwlibrary
//!
//! # Start the HTTP server
//! jwsync server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use jwsync::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status of `verify` when the hash does not match.
const EXIT_CHECK_FAILED: i32 = 2;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // JWSYNC_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("JWSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "jwsync=debug,jwsync_core=debug,tower_http=debug"
    } else {
        "jwsync=info,jwsync_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so that --json-mode output on stdout stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    match cli::execute(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_CHECK_FAILED),
        Err(e) => {
            tracing::error!(kind = %e.kind(), "Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the jwsync startup banner.
fn print_banner() {
    println!(
        r#"
       _                              
      (_)_      _____ _   _ _ __   ___ 
      | \ \ /\ / / __| | | | '_ \ / __|
      | |\ V  V /\__ \ |_| | | | | (__ 
     _/ | \_/\_/ |___/\__, |_| |_|\___|
    |__/              |___/            

  JW Library backup merger v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
