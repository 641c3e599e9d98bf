use std::path::PathBuf;

use argh::{EarlyExit, FromArgs};

#[derive(FromArgs, PartialEq, Debug)]
/// Strips and converts a PROS program built by cargo, then uploads it to a V5 brain.
/// Intended to be used as the cargo `runner` for the armv7a-vexos-eabi target.
pub struct ProsRunner {
    #[argh(option)]
    /// load tool names, stripped symbols, the excluded section, target and slot from a JSON file.
    /// Must be given before the artifact path.
    pub config: Option<PathBuf>,

    #[argh(positional)]
    /// path to the executable image produced by the build
    pub artifact: PathBuf,

    #[argh(positional, greedy)]
    /// pass `-v` right after the artifact to print every command before it is run.
    /// Anything else is ignored.
    pub flags: Vec<String>,
}

impl ProsRunner {
    /// Only a literal `-v` in the position right after the artifact turns on verbose output.
    pub fn verbose(&self) -> bool {
        self.flags.first().map(String::as_str) == Some("-v")
    }

    /// Parses `args`, passing everything after the artifact through to `flags` untouched,
    /// even when it looks like an option.
    pub fn parse(command_name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[command_name], &end_options_after_artifact(args))
    }

    /// Like `argh::from_env`, but with the artifact handling of [`ProsRunner::parse`].
    pub fn from_env() -> Self {
        let strings: Vec<String> = std::env::args_os()
            .map(|arg| arg.into_string())
            .collect::<Result<_, _>>()
            .unwrap_or_else(|arg| {
                eprintln!("Invalid utf8: {}", arg.to_string_lossy());
                std::process::exit(1)
            });

        let command_name = strings
            .first()
            .and_then(|path| {
                std::path::Path::new(path)
                    .file_name()
                    .and_then(|name| name.to_str())
            })
            .unwrap_or("pros-runner");
        let args: Vec<&str> = strings.iter().skip(1).map(String::as_str).collect();

        Self::parse(command_name, &args).unwrap_or_else(|early_exit| {
            std::process::exit(match early_exit.status {
                Ok(()) => {
                    println!("{}", early_exit.output);
                    0
                }
                Err(()) => {
                    eprintln!(
                        "{}\nRun {command_name} --help for more information.",
                        early_exit.output
                    );
                    1
                }
            })
        })
    }
}

/// Inserts `--` right after the artifact so argh stops looking for options there.
fn end_options_after_artifact<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut index = 0;
    while index < args.len() {
        match args[index] {
            "--" => break,
            "--config" => index += 2,
            option if option.starts_with('-') => index += 1,
            _ => {
                let mut args = args.to_vec();
                if args.get(index + 1) != Some(&"--") {
                    args.insert(index + 1, "--");
                }
                return args;
            }
        }
    }

    args.to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> ProsRunner {
        ProsRunner::parse("pros-runner", args).unwrap()
    }

    #[test]
    fn artifact_only() {
        let args = parse(&["build/out.elf"]);

        assert_eq!(
            args,
            ProsRunner {
                config: None,
                artifact: PathBuf::from("build/out.elf"),
                flags: vec![],
            }
        );
        assert!(!args.verbose());
    }

    #[test]
    fn verbose_flag() {
        let args = parse(&["build/out.elf", "-v"]);

        assert_eq!(args.flags, ["-v"]);
        assert!(args.verbose());
    }

    #[test]
    fn other_second_argument_is_quiet() {
        assert!(!parse(&["build/out.elf", "--verbose"]).verbose());
        assert!(!parse(&["build/out.elf", "v"]).verbose());
        assert!(!parse(&["build/out.elf", "-x", "-v"]).verbose());
        assert!(!parse(&["build/out.elf", "-h"]).verbose());
    }

    #[test]
    fn config_before_artifact() {
        let args = parse(&["--config", "runner.json", "build/out.elf", "-v"]);

        assert_eq!(args.config, Some(PathBuf::from("runner.json")));
        assert_eq!(args.artifact, PathBuf::from("build/out.elf"));
        assert!(args.verbose());
    }

    #[test]
    fn explicit_separator_is_not_doubled() {
        let args = parse(&["build/out.elf", "--", "-v"]);

        assert_eq!(args.flags, ["-v"]);
        assert!(args.verbose());
    }

    #[test]
    fn separator_placement() {
        assert_eq!(
            end_options_after_artifact(&["--config", "a.json", "out", "-v"]),
            ["--config", "a.json", "out", "--", "-v"]
        );
        assert_eq!(end_options_after_artifact(&["out"]), ["out", "--"]);
        assert_eq!(end_options_after_artifact(&["--help"]), ["--help"]);
    }

    #[test]
    fn help_before_artifact_still_works() {
        let early_exit = ProsRunner::parse("pros-runner", &["--help"]).unwrap_err();

        assert_eq!(early_exit.status, Ok(()));
    }

    #[test]
    fn missing_artifact() {
        assert!(ProsRunner::parse("pros-runner", &[]).is_err());
    }

    #[test]
    fn unknown_option_before_artifact() {
        assert!(ProsRunner::parse("pros-runner", &["-x", "build/out.elf"]).is_err());
    }
}
