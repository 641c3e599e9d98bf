use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    fmt,
    process::{Command, ExitStatus, Stdio},
};

use anyhow::{Context, Error};

/// An external program and its arguments. Always run directly, never through a shell.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.arguments());
        command
    }
}

impl fmt::Display for ToolCommand {
    /// Renders the command the way it would have to be typed into a POSIX shell.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in self.args.iter() {
            write!(f, " {}", quote(arg))?;
        }

        Ok(())
    }
}

fn quote(word: &OsStr) -> Cow<'_, str> {
    let word = word.to_string_lossy();

    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));

    if is_plain {
        word
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// What became of a single external tool invocation.
#[derive(Debug)]
pub enum StepOutcome {
    /// The tool ran to completion. `None` means the platform reported no exit code.
    Exited(Option<i32>),

    /// The tool was terminated by this signal.
    Signaled(i32),

    /// The tool could not be started or waited on.
    Failed(Error),
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        matches!(self, StepOutcome::Exited(Some(0)))
    }

    /// The code this process should report if this was the last tool to run.
    /// Signals and tools that never started are reported the way a POSIX shell reports them.
    pub fn exit_code(&self) -> i32 {
        match self {
            StepOutcome::Exited(Some(code)) => *code,
            StepOutcome::Exited(None) => 1,
            StepOutcome::Signaled(signal) => 128 + signal,
            StepOutcome::Failed(_) => 127,
        }
    }
}

pub trait CommandRunner {
    fn run(&mut self, command: &ToolCommand) -> StepOutcome;
}

/// Runs tools as child processes that share this process's terminal.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &ToolCommand) -> StepOutcome {
        let program = command.program().to_string_lossy();

        let result = command
            .to_command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .stdin(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn `{program}`."))
            .and_then(|mut child| {
                child
                    .wait()
                    .with_context(|| format!("Failed to wait for `{program}` to complete."))
            });

        match result {
            Ok(status) => outcome_of(status),
            Err(error) => StepOutcome::Failed(error),
        }
    }
}

#[cfg(unix)]
fn outcome_of(status: ExitStatus) -> StepOutcome {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => StepOutcome::Signaled(signal),
        None => StepOutcome::Exited(status.code()),
    }
}

#[cfg(not(unix))]
fn outcome_of(status: ExitStatus) -> StepOutcome {
    StepOutcome::Exited(status.code())
}
