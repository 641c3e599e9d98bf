use std::{
    ffi::OsString,
    fmt,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{
    command::{CommandRunner, StepOutcome, ToolCommand},
    config::RunnerConfig,
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StepKind {
    Strip,
    Convert,
    Upload,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepKind::Strip => "strip",
            StepKind::Convert => "convert",
            StepKind::Upload => "upload",
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Step {
    pub kind: StepKind,

    /// The file this step reads.
    pub input: PathBuf,

    pub command: ToolCommand,
}

impl Step {
    fn progress(&self) -> String {
        match self.kind {
            StepKind::Strip => format!("stripping symbols from {}", self.input.display()),
            StepKind::Convert => format!("converting {} to binary", self.input.display()),
            StepKind::Upload => format!("uploading {}", self.input.display()),
        }
    }
}

/// The ordered tool invocations that turn a built artifact into a program on the brain.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(artifact: &Path, config: &RunnerConfig) -> Self {
        let stripped = with_suffix(artifact, ".stripped");
        let binary = with_suffix(artifact, ".bin");

        let mut steps = Vec::with_capacity(3);

        // Without any symbols to strip there is nothing to gain from the intermediate file.
        let convert_input = if config.strip_symbols.is_empty() {
            artifact.to_path_buf()
        } else {
            steps.push(Step {
                kind: StepKind::Strip,
                input: artifact.to_path_buf(),
                command: ToolCommand::new(&config.objcopy)
                    .args(
                        config
                            .strip_symbols
                            .iter()
                            .map(|symbol| format!("--strip-symbol={symbol}")),
                    )
                    .arg(artifact)
                    .arg(&stripped),
            });

            stripped
        };

        steps.push(Step {
            kind: StepKind::Convert,
            command: ToolCommand::new(&config.objcopy)
                .args(["-O", "binary", "-R"])
                .arg(&config.excluded_section)
                .arg(&convert_input)
                .arg(&binary),
            input: convert_input,
        });

        steps.push(Step {
            kind: StepKind::Upload,
            command: ToolCommand::new(&config.uploader)
                .args(["upload", "--target"])
                .arg(&config.target)
                .arg("--slot")
                .arg(config.slot.to_string())
                .arg(&binary),
            input: binary,
        });

        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step in order, whether or not the previous one succeeded.
    /// Returns the outcome of the last step, or `None` if there were no steps.
    pub fn run(
        &self,
        runner: &mut impl CommandRunner,
        out: &mut impl Write,
        verbose: bool,
    ) -> Result<Option<StepOutcome>> {
        let mut last_outcome = None;

        for step in self.steps.iter() {
            writeln!(out, "{}", step.progress()).context("Failed to write progress.")?;
            if verbose {
                writeln!(out, "{}", step.command).context("Failed to write command.")?;
            }

            // Tool output shares the terminal, so ours has to land first.
            out.flush().context("Failed to flush output.")?;

            log::debug!("Running {} step: {:?}", step.kind, step.command);
            let outcome = runner.run(&step.command);

            match &outcome {
                StepOutcome::Exited(Some(0)) => log::debug!("{} step successful.", step.kind),
                StepOutcome::Exited(Some(code)) => {
                    log::warn!("{} step exited with status {code}.", step.kind)
                }
                StepOutcome::Exited(None) => {
                    log::warn!("{} step exited without a status code.", step.kind)
                }
                StepOutcome::Signaled(signal) => {
                    log::warn!("{} step was terminated by signal {signal}.", step.kind)
                }
                StepOutcome::Failed(error) => log::error!("{} step failed: {error:?}", step.kind),
            }

            last_outcome = Some(outcome);
        }

        Ok(last_outcome)
    }
}

/// Appends to the final path component as-is, so `out.elf` becomes `out.elf.bin`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(path);
    path.push(suffix);
    path.into()
}
