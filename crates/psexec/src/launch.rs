//! Launch descriptor: the full PsExec command line

use std::fmt;

use crate::error::PsExecError;
use crate::options::Options;

/// Prefix PsExec expects in front of every computer name
pub const UNC_PREFIX: &str = r"\\";

const REDACTED: &str = "********";

/// Prefix `host` with `\\` unless it already starts with it
#[must_use]
pub fn normalize_target(host: &str) -> String {
    if host.starts_with(UNC_PREFIX) {
        host.to_string()
    } else {
        format!("{UNC_PREFIX}{host}")
    }
}

/// Wrap a program argument in double quotes
#[must_use]
pub fn quote_arg(arg: &str) -> String {
    format!("\"{arg}\"")
}

/// Everything needed to launch PsExec, derived from targets, options,
/// program and program arguments
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    targets: Vec<String>,
    options: Vec<String>,
    password_index: Option<usize>,
    program: String,
    args: Vec<String>,
}

impl LaunchDescriptor {
    /// Assemble a descriptor
    ///
    /// # Errors
    /// Returns `PsExecError::InvalidLaunch` if there are no targets, a target
    /// is blank, or the program is blank
    pub fn new<T, A>(
        targets: T,
        program: &str,
        options: &Options,
        args: A,
    ) -> Result<Self, PsExecError>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let targets = targets
            .into_iter()
            .map(|t| {
                let host = t.as_ref();
                if host.trim().is_empty() || host == UNC_PREFIX {
                    Err(PsExecError::InvalidLaunch("blank target host".to_string()))
                } else {
                    Ok(normalize_target(host))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if targets.is_empty() {
            return Err(PsExecError::InvalidLaunch(
                "at least one target host is required".to_string(),
            ));
        }

        if program.trim().is_empty() {
            return Err(PsExecError::InvalidLaunch(
                "program must not be empty".to_string(),
            ));
        }

        // -p is always directly followed by the password
        let password_index = options.credentials().map(|_| 3);

        Ok(Self {
            targets,
            options: options.to_args(),
            password_index,
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Normalized target hosts
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Program arguments, unquoted
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Comma-joined target segment, e.g. `\\host1,\\host2`
    #[must_use]
    pub fn target_segment(&self) -> String {
        self.targets.join(",")
    }

    /// Program arguments, each quoted, space-joined
    #[must_use]
    pub fn argument_segment(&self) -> String {
        self.args
            .iter()
            .map(|a| quote_arg(a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The command line handed to PsExec
    #[must_use]
    pub fn command_line(&self) -> String {
        self.render(&self.options)
    }

    /// The command line with the password masked, safe for logs
    #[must_use]
    pub fn redacted_command_line(&self) -> String {
        match self.password_index {
            Some(idx) => {
                let mut options = self.options.clone();
                options[idx] = REDACTED.to_string();
                self.render(&options)
            }
            None => self.command_line(),
        }
    }

    /// Separate argv tokens for platforms without raw command lines
    ///
    /// Program arguments are passed unquoted since each one is already its
    /// own token.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(2 + self.options.len() + self.args.len());
        argv.push(self.target_segment());
        argv.extend(self.options.iter().cloned());
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn render(&self, options: &[String]) -> String {
        let options = options.join(" ");
        let args = self.argument_segment();

        [
            self.target_segment().as_str(),
            options.as_str(),
            self.program.as_str(),
            args.as_str(),
        ]
        .into_iter()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl fmt::Debug for LaunchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchDescriptor")
            .field("command_line", &self.redacted_command_line())
            .finish()
    }
}

impl fmt::Display for LaunchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted_command_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CopyMode;

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("host1"), r"\\host1");
        assert_eq!(normalize_target(r"\\host2"), r"\\host2");
        assert_eq!(normalize_target(r"\host3"), r"\\\host3");
    }

    #[test]
    fn test_targets_and_quoted_args() {
        let launch = LaunchDescriptor::new(
            ["host1", r"\\host2"],
            "app.exe",
            &Options::default(),
            ["a b", "c"],
        )
        .unwrap();

        assert_eq!(launch.target_segment(), r"\\host1,\\host2");
        assert_eq!(launch.argument_segment(), r#""a b" "c""#);
        assert_eq!(
            launch.command_line(),
            r#"\\host1,\\host2 -accepteula app.exe "a b" "c""#
        );
    }

    #[test]
    fn test_argument_count_and_order_preserved() {
        let args: Vec<String> = (0..7).map(|i| format!("arg {i}")).collect();
        let launch =
            LaunchDescriptor::new(["h"], "p.exe", &Options::default(), args.clone()).unwrap();

        let segment = launch.argument_segment();
        let expected: Vec<String> = args.iter().map(|a| quote_arg(a)).collect();
        assert_eq!(segment, expected.join(" "));
        assert_eq!(launch.args().len(), 7);
    }

    #[test]
    fn test_no_args_and_no_options() {
        let options = Options {
            accept_eula: false,
            ..Options::default()
        };
        let launch =
            LaunchDescriptor::new(["h"], "cmd.exe", &options, Vec::<String>::new()).unwrap();
        assert_eq!(launch.command_line(), r"\\h cmd.exe");
    }

    #[test]
    fn test_rejects_empty_inputs() {
        let no_targets =
            LaunchDescriptor::new(Vec::<String>::new(), "p", &Options::default(), ["x"]);
        assert!(matches!(no_targets, Err(PsExecError::InvalidLaunch(_))));

        let blank_target = LaunchDescriptor::new(["  "], "p", &Options::default(), ["x"]);
        assert!(matches!(blank_target, Err(PsExecError::InvalidLaunch(_))));

        let blank_program = LaunchDescriptor::new(["h"], " ", &Options::default(), ["x"]);
        assert!(matches!(blank_program, Err(PsExecError::InvalidLaunch(_))));
    }

    #[test]
    fn test_redacted_command_line_hides_password() {
        let options = Options::new()
            .with_credentials("admin", "hunter2")
            .with_copy(CopyMode::Copy);
        let launch = LaunchDescriptor::new(["srv"], "setup.exe", &options, ["/q"]).unwrap();

        assert!(launch.command_line().contains("-p hunter2"));
        let redacted = launch.redacted_command_line();
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("-u admin -p ********"));
        assert!(!format!("{launch:?}").contains("hunter2"));
        assert!(!launch.to_string().contains("hunter2"));
    }

    #[test]
    fn test_argv_tokens() {
        let launch =
            LaunchDescriptor::new(["a", "b"], "run.exe", &Options::default(), ["x y"]).unwrap();
        assert_eq!(
            launch.argv(),
            vec![r"\\a,\\b", "-accepteula", "run.exe", "x y"]
        );
    }
}
