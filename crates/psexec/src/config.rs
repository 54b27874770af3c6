//! Configuration loading and types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PsExecError;
use crate::options::Options;

/// File name of the 64-bit PsExec binary
pub const PSEXEC_64: &str = "PsExec64.exe";
/// File name of the 32-bit PsExec binary
pub const PSEXEC_32: &str = "PsExec.exe";

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "PSEXEC_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsExecConfig {
    /// Where to find the PsExec binary
    #[serde(default)]
    pub executable: ExecutableConfig,
    /// Options used when the caller doesn't override them
    #[serde(default)]
    pub options: Options,
}

/// Location of the PsExec binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableConfig {
    /// Directory holding `PsExec64.exe` / `PsExec.exe`
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Pick `PsExec64.exe` over `PsExec.exe`
    #[serde(default = "default_use_64bit")]
    pub use_64bit: bool,
    /// Explicit executable, overrides `dir` and `use_64bit`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for ExecutableConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            use_64bit: default_use_64bit(),
            path: None,
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_use_64bit() -> bool {
    true
}

impl ExecutableConfig {
    /// Path of the binary that will be spawned
    #[must_use]
    pub fn resolve(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None if self.use_64bit => self.dir.join(PSEXEC_64),
            None => self.dir.join(PSEXEC_32),
        }
    }
}

impl PsExecConfig {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns `PsExecError::ConfigError` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, PsExecError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PsExecError::ConfigError(format!("{}: {e}", path.display())))?;
        let config: PsExecConfig = toml::from_str(&content)
            .map_err(|e| PsExecError::ConfigError(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// Checks `PSEXEC_CONFIG`, then `psexec.toml` in the working directory,
    /// then `psexec/psexec.toml` in the user config directory.
    ///
    /// # Errors
    /// Returns `PsExecError::ConfigError` if a found file is invalid
    pub fn load_default() -> Result<Self, PsExecError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![PathBuf::from("psexec.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("psexec").join("psexec.toml"));
        }

        Self::load_first(&paths)
    }

    fn load_first(paths: &[PathBuf]) -> Result<Self, PsExecError> {
        for path in paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        warn!("no config file found, using defaults");
        Ok(PsExecConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::options::{CopyMode, Priority};

    #[test]
    fn test_resolve_executable() {
        let mut exe = ExecutableConfig::default();
        assert_eq!(exe.resolve(), Path::new(".").join("PsExec64.exe"));

        exe.use_64bit = false;
        assert_eq!(exe.resolve(), Path::new(".").join("PsExec.exe"));

        exe.dir = PathBuf::from("tools");
        assert_eq!(exe.resolve(), Path::new("tools").join("PsExec.exe"));

        exe.path = Some(PathBuf::from("/opt/psexec"));
        assert_eq!(exe.resolve(), PathBuf::from("/opt/psexec"));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[executable]
dir = "sysinternals"
use_64bit = false

[options]
accept_eula = false
elevated = true
priority = "background"
copy = "if-newer"
"#
        )
        .unwrap();

        let config = PsExecConfig::load(file.path()).unwrap();
        assert_eq!(config.executable.dir, PathBuf::from("sysinternals"));
        assert!(!config.executable.use_64bit);
        assert!(!config.options.accept_eula);
        assert!(config.options.elevated);
        assert_eq!(config.options.priority, Some(Priority::Background));
        assert_eq!(config.options.copy, Some(CopyMode::IfNewer));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = PsExecConfig::load(file.path()).unwrap();
        assert_eq!(config, PsExecConfig::default());
        assert!(config.options.accept_eula);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[options]\npriority = \"idle\"").unwrap();

        let err = PsExecConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PsExecError::ConfigError(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PsExecConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, PsExecError::ConfigError(_)));
    }

    #[test]
    fn test_load_first_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PsExecConfig::load_first(&[dir.path().join("absent.toml")]).unwrap();
        assert_eq!(config, PsExecConfig::default());
    }

    #[test]
    fn test_load_first_picks_existing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("psexec.toml");
        std::fs::write(&present, "[executable]\nuse_64bit = false\n").unwrap();

        let config =
            PsExecConfig::load_first(&[dir.path().join("absent.toml"), present]).unwrap();
        assert!(!config.executable.use_64bit);
    }
}
