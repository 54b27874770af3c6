//! PsExec command-line options and their serialization

use std::fmt;

use serde::{Deserialize, Serialize};

/// Password passed to PsExec with `-p`
///
/// PsExec only accepts the password in clear text, so the value is kept as
/// is. The wrapper only hides it from `Debug` output and logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Clear-text value handed to PsExec
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(********)")
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// When PsExec copies the program to the remote system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyMode {
    /// `-c`: copy the program to the remote system for execution
    Copy,
    /// `-f -c`: copy even if the file already exists on the remote system
    #[serde(alias = "copy-if-missing")]
    Force,
    /// `-v -c`: copy only if the file is a higher version or newer than the
    /// remote copy
    IfNewer,
}

impl CopyMode {
    /// Flags for this mode, in the order PsExec expects them
    #[must_use]
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            CopyMode::Copy => &["-c"],
            CopyMode::Force => &["-f", "-c"],
            CopyMode::IfNewer => &["-v", "-c"],
        }
    }
}

/// CPU priority of the remote process
///
/// `Background` also lowers memory and I/O priority (Vista and above).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    BelowNormal,
    AboveNormal,
    High,
    Realtime,
    Background,
}

impl Priority {
    #[must_use]
    pub fn flag(self) -> &'static str {
        match self {
            Priority::Low => "-low",
            Priority::BelowNormal => "-belownormal",
            Priority::AboveNormal => "-abovenormal",
            Priority::High => "-high",
            Priority::Realtime => "-realtime",
            Priority::Background => "-background",
        }
    }
}

/// Remote execution flags understood by PsExec
///
/// Every optional field that is unset produces no flag at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// `-u`: user name for login to the remote computer
    pub username: Option<String>,
    /// `-p`: password for `username`, only sent together with it
    pub password: Option<Password>,
    /// `-accepteula`: suppress the license dialog
    pub accept_eula: bool,
    /// `-d`: don't wait for the application to terminate
    pub no_wait: bool,
    /// `-e`: don't load the account's profile
    pub dont_load_profile: bool,
    /// `-h`: run with the account's elevated token, if available
    pub elevated: bool,
    /// `-i`: interact with the desktop of the remote system
    pub interactive: bool,
    /// `-l`: run as a limited user (low integrity)
    pub limited: bool,
    /// `-x`: display the UI on the Winlogon desktop (local system only)
    pub display_on_winlogon: bool,
    /// `-n`: timeout in seconds for connecting to the remote computer
    pub connect_timeout: Option<u32>,
    /// `-w`: working directory of the process, relative to the remote computer
    pub working_directory: Option<String>,
    pub copy: Option<CopyMode>,
    pub priority: Option<Priority>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            accept_eula: true,
            no_wait: false,
            dont_load_profile: false,
            elevated: false,
            interactive: false,
            limited: false,
            display_on_winlogon: false,
            connect_timeout: None,
            working_directory: None,
            copy: None,
            priority: None,
        }
    }
}

impl Options {
    /// Create options with PsExec defaults (EULA accepted, nothing else set)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both halves of the login credentials
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<Password>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_copy(mut self, copy: CopyMode) -> Self {
        self.copy = Some(copy);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, seconds: u32) -> Self {
        self.connect_timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Credentials to send, present only when both user name and password
    /// are set
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &Password)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.as_str(), password)),
            _ => None,
        }
    }

    /// Serialize into PsExec argument tokens
    ///
    /// The order is fixed: credentials, boolean switches, `-accepteula`,
    /// connect timeout, working directory, priority, copy mode. User name and
    /// password are passed through without validation.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some((user, password)) = self.credentials() {
            args.extend([
                "-u".to_string(),
                user.to_string(),
                "-p".to_string(),
                password.expose().to_string(),
            ]);
        }

        let switches = [
            (self.elevated, "-h"),
            (self.dont_load_profile, "-e"),
            (self.interactive, "-i"),
            (self.limited, "-l"),
            (self.display_on_winlogon, "-x"),
            (self.no_wait, "-d"),
            (self.accept_eula, "-accepteula"),
        ];
        args.extend(
            switches
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| (*flag).to_string()),
        );

        if let Some(timeout) = self.connect_timeout {
            args.push("-n".to_string());
            args.push(timeout.to_string());
        }

        if let Some(dir) = self.working_directory.as_deref().filter(|d| !d.is_empty()) {
            args.push("-w".to_string());
            args.push(dir.to_string());
        }

        if let Some(priority) = self.priority {
            args.push(priority.flag().to_string());
        }

        if let Some(copy) = self.copy {
            args.extend(copy.flags().iter().map(|f| (*f).to_string()));
        }

        args
    }

    /// Serialize into a single argument fragment, tokens separated by one
    /// space
    #[must_use]
    pub fn to_args_string(&self) -> String {
        self.to_args().join(" ")
    }
}
