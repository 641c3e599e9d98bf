use anyhow::{Context, Result};

use crate::{command::SystemRunner, config::RunnerConfig, pipeline::Pipeline};

mod arguments;
mod command;
mod config;
mod pipeline;

fn main() {
    let args = arguments::ProsRunner::from_env();

    colog::init();

    let exit_code = match application(args) {
        Ok(exit_code) => exit_code,
        Err(error) => {
            log::error!("Fatal error: {:?}", error);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Returns the exit code of the last tool that ran.
fn application(args: arguments::ProsRunner) -> Result<i32> {
    log::info!("PROS Runner v{}", std::env!("CARGO_PKG_VERSION"));

    let verbose = args.verbose();

    let config = match args.config.as_ref() {
        Some(path) => {
            log::info!("Runner configuration: {:?}", path);
            RunnerConfig::load(path).context("Failed to load runner configuration")?
        }
        None => RunnerConfig::default(),
    };

    let pipeline = Pipeline::new(&args.artifact, &config);
    log::debug!(
        "Artifact {:?} needs {} steps.",
        args.artifact,
        pipeline.steps().len()
    );

    let stdout = std::io::stdout();
    let outcome = pipeline
        .run(&mut SystemRunner, &mut stdout.lock(), verbose)
        .context("Failed to run pipeline")?;

    match outcome {
        Some(outcome) => {
            if outcome.success() {
                log::info!("Upload successful.");
            } else {
                log::error!("Upload unsuccessful.");
            }

            Ok(outcome.exit_code())
        }
        None => Ok(0),
    }
}
