//! Logging initialization.
//!
//! Logs go to stderr so that command output on stdout stays parseable.
//! `RUST_LOG` overrides the level chosen from `--verbose`/`--quiet`.

use anyhow::{Result, anyhow};
use colored::control as color_control;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, LogFormat};

/// Install the global subscriber and apply color settings.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(cli.verbose, cli.quiet)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let installed = match cli.log_format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Text => builder.with_ansi(!no_color(cli)).try_init(),
    };
    installed.map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    if no_color(cli) {
        color_control::set_override(false);
    }
    Ok(())
}

fn no_color(cli: &Cli) -> bool {
    cli.no_color || std::env::var_os("NO_COLOR").is_some()
}

/// Our crates log at the requested level; dependencies stay at `warn`.
fn default_directives(verbose: bool, quiet: bool) -> String {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    format!("warn,kittydex={level},kittydex_core={level}")
}
