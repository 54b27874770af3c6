//! PsExec child process wrapper using `tokio::process`

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::config::ExecutableConfig;
use crate::error::PsExecError;
use crate::launch::LaunchDescriptor;
use crate::options::Options;
use crate::result::ExitReport;
use crate::sink::{ConsoleSink, OutputLine, OutputSink, StreamKind};

/// A single PsExec invocation
///
/// Created unbuilt, then built with targets, program, options and arguments,
/// then started. The wrapper owns the child exclusively: `dispose` kills it
/// if it is still running, and dropping an undisposed wrapper does the same
/// on a best-effort basis.
pub struct PsExecProcess {
    executable: ExecutableConfig,
    sink: Arc<dyn OutputSink>,
    launch: Option<LaunchDescriptor>,
    child: Option<Child>,
    /// Output forwarder tasks, one per piped stream
    forwarders: Vec<JoinHandle<()>>,
    started_at: Option<Instant>,
    disposed: bool,
}

impl fmt::Debug for PsExecProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsExecProcess")
            .field("executable", &self.executable)
            .field("launch", &self.launch)
            .field("pid", &self.id())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Default for PsExecProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl PsExecProcess {
    /// Create an unbuilt process using `./PsExec64.exe` and console output
    #[must_use]
    pub fn new() -> Self {
        Self::with_executable(ExecutableConfig::default())
    }

    #[must_use]
    pub fn with_executable(executable: ExecutableConfig) -> Self {
        Self {
            executable,
            sink: Arc::new(ConsoleSink),
            launch: None,
            child: None,
            forwarders: Vec::new(),
            started_at: None,
            disposed: false,
        }
    }

    /// Choose between `PsExec64.exe` and `PsExec.exe`
    pub fn set_use_64bit(&mut self, use_64bit: bool) {
        self.executable.use_64bit = use_64bit;
    }

    #[must_use]
    pub fn use_64bit(&self) -> bool {
        self.executable.use_64bit
    }

    /// Directory the PsExec binary is looked up in
    pub fn set_binary_dir(&mut self, dir: impl Into<PathBuf>) {
        self.executable.dir = dir.into();
    }

    /// Spawn this executable instead of the PsExec binary in the binary dir
    pub fn set_executable_path(&mut self, path: impl Into<PathBuf>) {
        self.executable.path = Some(path.into());
    }

    /// Where forwarded output goes, the console by default
    pub fn set_sink(&mut self, sink: Arc<dyn OutputSink>) {
        self.sink = sink;
    }

    /// Path of the binary `start` will spawn
    #[must_use]
    pub fn executable_path(&self) -> PathBuf {
        self.executable.resolve()
    }

    #[must_use]
    pub fn launch_descriptor(&self) -> Option<&LaunchDescriptor> {
        self.launch.as_ref()
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.launch.is_some()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// OS process id, while the child is held and has not been reaped
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Assemble the launch descriptor; nothing is spawned yet
    ///
    /// Each target is prefixed with `\\` unless it already is, and each
    /// argument is quoted on its own.
    ///
    /// # Errors
    /// Returns `PsExecError::InvalidLaunch` for empty targets or program,
    /// `AlreadyStarted` once started and `Disposed` after disposal
    pub fn build<T, A>(
        &mut self,
        targets: T,
        program: &str,
        options: &Options,
        args: A,
    ) -> Result<(), PsExecError>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        if self.disposed {
            return Err(PsExecError::Disposed);
        }
        if self.is_started() {
            return Err(PsExecError::AlreadyStarted);
        }

        let launch = LaunchDescriptor::new(targets, program, options, args)?;
        debug!(command_line = %launch, "built PsExec launch");

        self.launch = Some(launch);
        Ok(())
    }

    /// Spawn PsExec and begin forwarding its stdout and stderr
    ///
    /// Returns as soon as the child is running. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns `NotBuilt`, `AlreadyStarted` or `Disposed` when called in the
    /// wrong state, and `SpawnError` if the executable cannot be launched
    #[instrument(skip(self), level = "debug")]
    pub fn start(&mut self) -> Result<(), PsExecError> {
        let launch = self.launch.as_ref().ok_or(PsExecError::NotBuilt)?;
        if self.disposed {
            return Err(PsExecError::Disposed);
        }
        if self.is_started() {
            return Err(PsExecError::AlreadyStarted);
        }

        let path = self.executable.resolve();
        debug!(
            executable = %path.display(),
            command_line = %launch,
            "spawning PsExec"
        );

        let mut cmd = Command::new(&path);
        apply_arguments(&mut cmd, launch);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| PsExecError::SpawnError(format!("{}: {e}", path.display())))?;

        info!(
            pid = ?child.id(),
            executable = %path.display(),
            "PsExec started"
        );

        if let Some(stdout) = child.stdout.take() {
            self.forwarders.push(spawn_forwarder(
                stdout,
                StreamKind::Stdout,
                Arc::clone(&self.sink),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            self.forwarders.push(spawn_forwarder(
                stderr,
                StreamKind::Stderr,
                Arc::clone(&self.sink),
            ));
        }

        self.child = Some(child);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// Wait until the child exits and its output has been forwarded
    ///
    /// # Errors
    /// Returns `NotBuilt`, `NotStarted` or `Disposed` when called in the
    /// wrong state, `IoError` if waiting on the child fails
    #[instrument(skip(self), level = "debug")]
    pub async fn wait_for_exit(&mut self) -> Result<ExitReport, PsExecError> {
        let child = self.running_child()?;
        let status = child
            .wait()
            .await
            .map_err(|e| PsExecError::IoError(e.to_string()))?;

        let report = self.exit_report(status);
        self.drain_forwarders().await;
        Ok(report)
    }

    /// Wait up to `limit` for the child to exit
    ///
    /// Returns `Ok(None)` if the child is still running when the limit
    /// elapses; the child is left running. Once the child has exited its
    /// report is returned even if forwarding output outlasts the limit, in
    /// which case the unfinished forwarders are left for `dispose` to abort.
    ///
    /// # Errors
    /// Same as [`PsExecProcess::wait_for_exit`]
    #[instrument(skip(self), level = "debug")]
    pub async fn wait_for_exit_timeout(
        &mut self,
        limit: Duration,
    ) -> Result<Option<ExitReport>, PsExecError> {
        let deadline = Instant::now() + limit;
        let child = self.running_child()?;

        let status = match timeout(limit, child.wait()).await {
            Ok(status) => status.map_err(|e| PsExecError::IoError(e.to_string()))?,
            Err(_) => {
                debug!(limit = ?limit, "PsExec still running after wait limit");
                return Ok(None);
            }
        };

        let report = self.exit_report(status);
        let remaining = deadline.saturating_duration_since(Instant::now());
        if timeout(remaining, self.drain_forwarders()).await.is_err() {
            debug!(
                pending = self.forwarders.len(),
                "output still forwarding after wait limit"
            );
        }
        Ok(Some(report))
    }

    /// Tear down the child and the output forwarders
    ///
    /// The first call aborts forwarding, kills the child if it has not
    /// exited, reaps and releases it. Later calls do nothing. The wrapper
    /// counts as disposed even when this returns an error.
    ///
    /// # Errors
    /// Returns `KillFailed` if the child could not be killed and `IoError`
    /// if its state could not be queried
    #[instrument(skip(self), level = "debug")]
    pub async fn dispose(&mut self) -> Result<(), PsExecError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.abort_forwarders();

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(status = ?status.code(), "PsExec already exited");
                Ok(())
            }
            Ok(None) => {
                info!(pid = ?child.id(), "killing PsExec");
                child
                    .kill()
                    .await
                    .map_err(|e| PsExecError::KillFailed(e.to_string()))
            }
            Err(e) => Err(PsExecError::IoError(e.to_string())),
        }
    }

    fn exit_report(&self, status: ExitStatus) -> ExitReport {
        let duration = self
            .started_at
            .map(|started| started.elapsed())
            .unwrap_or_default();

        let report = ExitReport::from_status(status, duration);
        info!(
            status = ?report.status,
            duration = ?report.duration,
            "PsExec exited"
        );
        report
    }

    fn running_child(&mut self) -> Result<&mut Child, PsExecError> {
        if self.launch.is_none() {
            return Err(PsExecError::NotBuilt);
        }
        if self.disposed {
            return Err(PsExecError::Disposed);
        }
        self.child.as_mut().ok_or(PsExecError::NotStarted)
    }

    async fn drain_forwarders(&mut self) {
        // Pop only after completion so a cancelled wait keeps the handles
        // for dispose to abort.
        while let Some(handle) = self.forwarders.last_mut() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "output forwarder panicked");
                }
            }
            self.forwarders.pop();
        }
    }

    fn abort_forwarders(&mut self) {
        for handle in self.forwarders.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for PsExecProcess {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.abort_forwarders();

        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => match child.start_kill() {
                Ok(()) => debug!(pid = ?child.id(), "killed PsExec on drop"),
                Err(e) => warn!(error = %e, "failed to kill PsExec on drop"),
            },
            Err(e) => warn!(error = %e, "failed to query PsExec state on drop"),
        }
    }
}

#[cfg(windows)]
fn apply_arguments(cmd: &mut Command, launch: &LaunchDescriptor) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    cmd.raw_arg(launch.command_line());
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn apply_arguments(cmd: &mut Command, launch: &LaunchDescriptor) {
    cmd.args(launch.argv());
}

/// Read `reader` line by line into `sink` until EOF
///
/// Lines are decoded lossily since PsExec and remote programs write in the
/// console code page. A failing sink is reported once; the stream is still
/// drained so the child never blocks on a full pipe.
fn spawn_forwarder<R>(reader: R, stream: StreamKind, sink: Arc<dyn OutputSink>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut sink_failed = false;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if sink_failed {
                        continue;
                    }
                    let line = OutputLine {
                        stream,
                        line: decode_line(&buf),
                    };
                    if let Err(e) = sink.write_line(line).await {
                        warn!(%stream, error = %e, "failed to forward output, discarding the rest");
                        sink_failed = true;
                    }
                }
                Err(e) => {
                    warn!(%stream, error = %e, "failed to read PsExec output");
                    break;
                }
            }
        }

        debug!(%stream, "output forwarder finished");
    })
}

fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Builder for `PsExecProcess`
///
/// ```no_run
/// # async fn run() -> Result<(), psexec::PsExecError> {
/// use psexec::{CopyMode, Options, PsExecBuilder};
///
/// let mut process = PsExecBuilder::new("fileserver", "ipconfig.exe")
///     .options(Options::new().with_copy(CopyMode::Copy))
///     .arg("/all")
///     .build()?;
/// process.start()?;
/// let report = process.wait_for_exit().await?;
/// process.dispose().await?;
/// # let _ = report;
/// # Ok(())
/// # }
/// ```
pub struct PsExecBuilder {
    targets: Vec<String>,
    program: String,
    options: Options,
    args: Vec<String>,
    executable: ExecutableConfig,
    sink: Option<Arc<dyn OutputSink>>,
}

impl PsExecBuilder {
    /// Create builder for running `program` on a single host
    pub fn new(target: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            targets: vec![target.into()],
            program: program.into(),
            options: Options::default(),
            args: Vec::new(),
            executable: ExecutableConfig::default(),
            sink: None,
        }
    }

    /// Create builder for running `program` on several hosts
    pub fn for_targets<I, S>(targets: I, program: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::new(String::new(), program)
        }
    }

    /// Add another target host
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    #[must_use]
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn use_64bit(mut self, use_64bit: bool) -> Self {
        self.executable.use_64bit = use_64bit;
        self
    }

    #[must_use]
    pub fn binary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.executable.dir = dir.into();
        self
    }

    #[must_use]
    pub fn executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable.path = Some(path.into());
        self
    }

    /// Replace the whole executable location, e.g. from a config file
    #[must_use]
    pub fn executable(mut self, executable: ExecutableConfig) -> Self {
        self.executable = executable;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the process, ready to start
    ///
    /// # Errors
    /// Returns `PsExecError::InvalidLaunch` for empty targets or program
    pub fn build(self) -> Result<PsExecProcess, PsExecError> {
        let mut process = PsExecProcess::with_executable(self.executable);
        if let Some(sink) = self.sink {
            process.set_sink(sink);
        }
        process.build(&self.targets, &self.program, &self.options, self.args)?;
        Ok(process)
    }
}
