//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use psexec::{CopyMode, ExecutableConfig, Options, Password, Priority};

#[derive(Parser, Debug)]
#[command(name = "psexec-rs")]
#[command(about = "Run a program on remote Windows hosts through PsExec", long_about = None)]
pub struct Cli {
    /// Comma-separated target hosts, e.g. `srv1,\\srv2`
    pub targets: String,

    /// Program to run on the targets
    pub program: String,

    /// Arguments for the program, each quoted separately
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// User name for the remote login (-u)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password for the remote login (-p), sent to PsExec in clear text
    #[arg(short, long, env = "PSEXEC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Run with the account's elevated token (-h)
    #[arg(long)]
    pub elevated: bool,

    /// Don't load the account's profile (-e)
    #[arg(long)]
    pub no_profile: bool,

    /// Interact with the remote desktop (-i)
    #[arg(long)]
    pub interactive: bool,

    /// Run as a limited user (-l)
    #[arg(long)]
    pub limited: bool,

    /// Display the UI on the Winlogon desktop (-x)
    #[arg(long)]
    pub winlogon: bool,

    /// Don't wait for the remote program to terminate (-d)
    #[arg(long)]
    pub no_wait: bool,

    /// Don't pass -accepteula
    #[arg(long)]
    pub no_accept_eula: bool,

    /// Seconds to wait when connecting to the remote computer (-n)
    #[arg(long, value_name = "SECONDS")]
    pub connect_timeout: Option<u32>,

    /// Working directory on the remote computer (-w)
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<String>,

    /// CPU priority of the remote process
    #[arg(long, value_enum)]
    pub priority: Option<PriorityArg>,

    /// Copy the program to the remote system
    #[arg(long, value_enum)]
    pub copy: Option<CopyArg>,

    /// Use PsExec.exe instead of PsExec64.exe
    #[arg(long)]
    pub x86: bool,

    /// Directory containing the PsExec binaries
    #[arg(long, value_name = "DIR")]
    pub psexec_dir: Option<PathBuf>,

    /// Explicit PsExec executable
    #[arg(long, value_name = "PATH", conflicts_with_all = ["psexec_dir", "x86"])]
    pub executable: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Kill PsExec if it hasn't exited after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub wait_timeout: Option<u64>,

    /// Print the command line (password masked) without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Print the exit report or dry run as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level (overrides RUST_LOG)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PriorityArg {
    Low,
    BelowNormal,
    AboveNormal,
    High,
    Realtime,
    Background,
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Priority::Low,
            PriorityArg::BelowNormal => Priority::BelowNormal,
            PriorityArg::AboveNormal => Priority::AboveNormal,
            PriorityArg::High => Priority::High,
            PriorityArg::Realtime => Priority::Realtime,
            PriorityArg::Background => Priority::Background,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CopyArg {
    /// -c
    Copy,
    /// -f -c
    Force,
    /// -v -c
    IfNewer,
}

impl From<CopyArg> for CopyMode {
    fn from(value: CopyArg) -> Self {
        match value {
            CopyArg::Copy => CopyMode::Copy,
            CopyArg::Force => CopyMode::Force,
            CopyArg::IfNewer => CopyMode::IfNewer,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Target hosts split on commas, blanks dropped
    #[must_use]
    pub fn target_list(&self) -> Vec<String> {
        self.targets
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Layer `--psexec-dir`, `--x86` and `--executable` over the configured
    /// executable location
    ///
    /// `--psexec-dir` and `--x86` both drop a configured explicit path so
    /// they take effect.
    #[must_use]
    pub fn apply_executable(&self, mut executable: ExecutableConfig) -> ExecutableConfig {
        if let Some(dir) = &self.psexec_dir {
            executable.dir = dir.clone();
            executable.path = None;
        }
        if self.x86 {
            executable.use_64bit = false;
            executable.path = None;
        }
        if let Some(path) = &self.executable {
            executable.path = Some(path.clone());
        }
        executable
    }

    /// Layer the command-line flags over options from the config file
    ///
    /// Switches only ever turn flags on; `--no-accept-eula` is the one way to
    /// turn a configured flag off.
    #[must_use]
    pub fn apply_to(&self, mut options: Options) -> Options {
        if let Some(username) = &self.username {
            options.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            options.password = Some(Password::new(password.clone()));
        }

        options.elevated |= self.elevated;
        options.dont_load_profile |= self.no_profile;
        options.interactive |= self.interactive;
        options.limited |= self.limited;
        options.display_on_winlogon |= self.winlogon;
        options.no_wait |= self.no_wait;
        if self.no_accept_eula {
            options.accept_eula = false;
        }

        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(dir) = &self.workdir {
            options.working_directory = Some(dir.clone());
        }
        if let Some(priority) = self.priority {
            options.priority = Some(priority.into());
        }
        if let Some(copy) = self.copy {
            options.copy = Some(copy.into());
        }

        options
    }
}
