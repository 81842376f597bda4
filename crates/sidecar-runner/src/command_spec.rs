use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use tokio::process::Command as TokioCommand;

// ============================================================================
// CommandSpec - argv-style launch description
// ============================================================================

/// Description of a child process to launch.
///
/// Arguments are discrete `OsString` elements and are never passed through a
/// shell, so a configured command line such as `python -m flask run` cannot be
/// widened by metacharacters in the entry point or the admin key.
///
/// The environment is an *overlay*: variables listed here are added on top of
/// the supervisor's own environment when the command is built.
///
/// # Example
///
/// ```rust
/// use sidecar_runner::CommandSpec;
/// use std::ffi::OsString;
///
/// let cmd = CommandSpec::new("python")
///     .args(["-m", "flask", "run"])
///     .env("FLASK_RUN_PORT", "5000");
///
/// assert_eq!(cmd.program, OsString::from("python"));
/// assert_eq!(cmd.args.len(), 3);
/// assert_eq!(cmd.env_value("FLASK_RUN_PORT"), Some(OsString::from("5000").as_os_str()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute
    pub program: OsString,
    /// Arguments as discrete elements (NOT shell strings)
    pub args: Vec<OsString>,
    /// Optional working directory
    pub cwd: Option<PathBuf>,
    /// Environment overlay, applied on top of the inherited environment
    pub env: BTreeMap<OsString, OsString>,
}

impl CommandSpec {
    /// Create a new `CommandSpec` for the given program.
    #[must_use]
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build a spec from a configured argv (`["python", "-m", "flask", "run"]`).
    ///
    /// Returns `None` when the argv is empty or its program is blank.
    #[must_use]
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        if program.as_ref().trim().is_empty() {
            return None;
        }
        Some(Self::new(program.as_ref()).args(rest.iter().map(AsRef::as_ref)))
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set one environment variable in the overlay.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables in the overlay.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        for (key, value) in envs {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    /// Look up a variable in the overlay.
    #[must_use]
    pub fn env_value(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.env.get(key.as_ref()).map(OsString::as_os_str)
    }

    /// Program name for logs and error messages.
    #[must_use]
    pub fn program_display(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Convert into a `tokio::process::Command` with the overlay applied.
    ///
    /// Stdio and process-group settings are left to the launcher.
    #[must_use]
    pub fn to_tokio_command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.envs(&self.env);
        cmd
    }
}
