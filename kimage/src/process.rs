use std::{ffi::OsStr, fmt, io, num::NonZeroI32, process};

use log::{debug, log_enabled, Level};

/// A [`process::Command`] that keeps its invocation around so errors can show what was run.
pub struct Command(process::Command);

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Command {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self(process::Command::new(program))
    }

    pub fn args<'a, I>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = &'a OsStr>,
    {
        self.0.args(args);
        self
    }

    pub fn program(&self) -> String {
        self.0.get_program().to_string_lossy().into_owned()
    }

    fn spawn_with<T>(
        mut self,
        verb: &str,
        f: impl FnOnce(&mut process::Command) -> io::Result<T>,
    ) -> Result<(Self, T), Error> {
        if log_enabled!(Level::Debug) {
            debug!("{verb} `{command:?}`...", command = &self.0);
        }
        match f(&mut self.0) {
            Ok(value) => Ok((self, value)),
            Err(error) => Err(Error {
                command: self,
                kind: error.into(),
            }),
        }
    }

    /// Runs the command with inherited stdio, so its progress is visible, and requires it to
    /// succeed.
    pub fn status(self) -> Result<(), Error> {
        let (command, status) = self.spawn_with("running", process::Command::status)?;
        if status.success() {
            return Ok(());
        }
        Err(Error {
            command,
            kind: ErrorKind::Exited {
                code: status.code().and_then(NonZeroI32::new),
                stderr: None,
            },
        })
    }

    /// Runs the command capturing its output, whatever its exit status.
    pub fn try_output(self) -> Result<Output, Error> {
        let (command, output) = self.spawn_with("capturing", process::Command::output)?;
        Ok(Output { command, output })
    }

    /// Runs the command capturing its output and requires it to succeed.
    pub fn output(self) -> Result<Output, Error> {
        self.try_output()?.require_success()
    }
}

#[derive(Debug)]
pub struct Output {
    pub command: Command,
    pub output: process::Output,
}

impl Output {
    pub fn require_success(self) -> Result<Output, Error> {
        if self.output.status.success() {
            return Ok(self);
        }
        let code = self.output.status.code().and_then(NonZeroI32::new);
        let stderr = self.stderr_lossy().trim().to_owned();
        Err(Error {
            command: self.command,
            kind: ErrorKind::Exited {
                code,
                stderr: Some(stderr),
            },
        })
    }

    /// Stdout as UTF-8 with surrounding whitespace removed.
    pub fn stdout_trimmed(&self) -> Result<&str, std::str::Utf8Error> {
        Ok(std::str::from_utf8(&self.output.stdout)?.trim())
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }
}

impl std::ops::Deref for Output {
    type Target = process::Output;

    fn deref(&self) -> &Self::Target {
        &self.output
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    NotInstalled,
    NotExecutable,
    Io(io::ErrorKind),
    /// The program ran but did not succeed. `stderr` is only known when the output was captured.
    Exited {
        code: Option<NonZeroI32>,
        stderr: Option<String>,
    },
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotInstalled,
            io::ErrorKind::PermissionDenied => ErrorKind::NotExecutable,
            other => ErrorKind::Io(other),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{command:?}` failed: ", command = &self.command.0)?;
        let program = self.command.program();
        match &self.kind {
            ErrorKind::NotInstalled => write!(
                f,
                "`{program}` is required but was not found on your PATH, please install it"
            ),
            ErrorKind::NotExecutable => write!(
                f,
                "`{program}` was found but is not executable, please check its permissions"
            ),
            ErrorKind::Io(kind) => write!(f, "{kind}"),
            ErrorKind::Exited { code, stderr } => {
                match code {
                    Some(code) => write!(f, "exit code {code}")?,
                    None => f.write_str("terminated by a signal")?,
                }
                match stderr.as_deref() {
                    Some(stderr) if !stderr.is_empty() => write!(f, ": {stderr}"),
                    _ => Ok(()),
                }
            }
        }
    }
}

impl std::error::Error for Error {}

/// Creates a [`Command`] for `$program` with the given arguments, each converted with
/// [`AsRef<OsStr>`].
macro_rules! command {
    ($program:expr, $($arg:expr),* $(,)?) => {
        $crate::process::args!($crate::process::Command::new($program), $($arg,)*)
    };
}

/// Appends arguments to a [`Command`], each converted with [`AsRef<OsStr>`].
macro_rules! args {
    ($command:expr, $($arg:expr),+ $(,)?) => {
        $command.args([
            $(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$arg),)*
        ])
    }
}

pub(crate) use args;
pub(crate) use command;
