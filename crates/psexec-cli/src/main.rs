//! psexec-rs
//!
//! Command-line front end for the psexec wrapper

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use psexec::{ExitReport, PsExecConfig, PsExecError, PsExecProcess};
use tracing::{info, warn};

mod cli;
mod logging;

use cli::Cli;

/// Exit code when `--wait-timeout` elapses, as with coreutils `timeout`
const TIMED_OUT: u8 = 124;
/// Exit code after Ctrl-C
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_level, cli.log_format)?;

    let config = match &cli.config {
        Some(path) => PsExecConfig::load(path)?,
        None => PsExecConfig::load_default()?,
    };

    let mut process = PsExecProcess::with_executable(cli.apply_executable(config.executable));
    let options = cli.apply_to(config.options);
    process.build(cli.target_list(), &cli.program, &options, cli.args.clone())?;

    if cli.dry_run {
        print_dry_run(&process, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    process.start()?;

    let outcome = tokio::select! {
        result = wait(&mut process, cli.wait_timeout) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let code = match outcome {
        Some(Ok(Some(report))) => {
            process.dispose().await?;
            print_report(&report, cli.json)?;
            exit_code(&report)
        }
        Some(Ok(None)) => {
            warn!(
                timeout_secs = ?cli.wait_timeout,
                "PsExec did not exit in time, killing it"
            );
            process.dispose().await?;
            ExitCode::from(TIMED_OUT)
        }
        Some(Err(e)) => {
            process.dispose().await?;
            return Err(e.into());
        }
        None => {
            warn!("interrupted, killing PsExec");
            process.dispose().await?;
            ExitCode::from(INTERRUPTED)
        }
    };

    Ok(code)
}

async fn wait(
    process: &mut PsExecProcess,
    limit_secs: Option<u64>,
) -> Result<Option<ExitReport>, PsExecError> {
    match limit_secs {
        Some(secs) => {
            process
                .wait_for_exit_timeout(Duration::from_secs(secs))
                .await
        }
        None => process.wait_for_exit().await.map(Some),
    }
}

fn print_dry_run(process: &PsExecProcess, json: bool) -> Result<()> {
    let executable = process.executable_path();
    let Some(launch) = process.launch_descriptor() else {
        return Err(PsExecError::NotBuilt.into());
    };

    if json {
        let value = serde_json::json!({
            "executable": executable.display().to_string(),
            "targets": launch.targets(),
            "program": launch.program(),
            "args": launch.args(),
            "command_line": launch.redacted_command_line(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{} {}", executable.display(), launch.redacted_command_line());
    }
    Ok(())
}

fn print_report(report: &ExitReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        info!(
            status = ?report.status,
            duration = ?report.duration,
            "PsExec finished"
        );
    }
    Ok(())
}

/// Child exit code as our own; codes outside `0..=255` map to 1
fn exit_code(report: &ExitReport) -> ExitCode {
    u8::try_from(report.code_or(1))
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
