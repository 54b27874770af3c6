//! psexec: Sysinternals PsExec wrapper
//!
//! Builds PsExec command lines from typed options, launches the binary as a
//! child process, forwards its output and manages its lifetime. Remote
//! execution itself is left entirely to PsExec.

pub mod config;
pub mod error;
pub mod launch;
pub mod options;
pub mod process;
pub mod result;
pub mod sink;

pub use config::{ExecutableConfig, PsExecConfig};
pub use error::PsExecError;
pub use launch::LaunchDescriptor;
pub use options::{CopyMode, Options, Password, Priority};
pub use process::{PsExecBuilder, PsExecProcess};
pub use result::ExitReport;
pub use sink::{ChannelSink, ConsoleSink, OutputLine, OutputSink, StreamKind};
