//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Filter priority:
//! 1. `--log-level` flag
//! 2. `RUST_LOG` environment variable
//! 3. `psexec=info,psexec_rs=info`
//!
//! Logs go to stderr so forwarded PsExec stdout stays untouched.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{LogFormat, LogLevel};

const DEFAULT_FILTER: &str = "psexec=info,psexec_rs=info";

/// Initialise the global subscriber. Call once at startup.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init(level: Option<LogLevel>, format: LogFormat) -> eyre::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::new(directive(level)),
        None => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

fn directive(level: LogLevel) -> String {
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    format!("psexec={level},psexec_rs={level}")
}
