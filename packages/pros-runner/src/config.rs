use std::{ops::RangeInclusive, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Symbols that would otherwise be linked into the hot section and break the cold image.
pub const DEFAULT_STRIP_SYMBOLS: [&str; 5] = [
    "install_hot_table",
    "__libc_init_array",
    "_PROS_COMPILE_DIRECTORY",
    "_PROS_COMPILE_TIMESTAMP",
    "_PROS_COMPILE_TIMESTAMP_INT",
];

/// Program slots available on a V5 brain.
pub const SLOT_RANGE: RangeInclusive<u8> = 1..=8;

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// The binary manipulation tool used for both stripping and conversion.
    pub objcopy: String,

    /// The utility that performs the upload to the brain.
    pub uploader: String,

    /// Symbols removed before conversion. When empty, the artifact is converted directly.
    pub strip_symbols: Vec<String>,

    /// Section left out of the raw binary.
    pub excluded_section: String,

    /// Device type passed to the uploader.
    pub target: String,

    /// Program slot the binary is uploaded to.
    pub slot: u8,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            objcopy: "arm-none-eabi-objcopy".into(),
            uploader: "pros".into(),
            strip_symbols: DEFAULT_STRIP_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            excluded_section: ".hot_init".into(),
            target: "v5".into(),
            slot: 1,
        }
    }
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read(path).with_context(|| format!("Failed to read {path:?}."))?;

        let config: Self = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to decode {path:?}."))?;

        config
            .validate()
            .with_context(|| format!("{path:?} is not a valid runner configuration."))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("objcopy", &self.objcopy),
            ("uploader", &self.uploader),
            ("excluded_section", &self.excluded_section),
            ("target", &self.target),
        ] {
            if value.is_empty() {
                bail!("`{name}` must not be empty.");
            }
        }

        if self.strip_symbols.iter().any(|symbol| symbol.is_empty()) {
            bail!("`strip_symbols` must not contain empty names.");
        }

        if !SLOT_RANGE.contains(&self.slot) {
            bail!(
                "Slot {} is out of range, expected {} to {}.",
                self.slot,
                SLOT_RANGE.start(),
                SLOT_RANGE.end()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();

        assert_eq!(config.objcopy, "arm-none-eabi-objcopy");
        assert_eq!(config.uploader, "pros");
        assert_eq!(config.strip_symbols, DEFAULT_STRIP_SYMBOLS);
        assert_eq!(config.excluded_section, ".hot_init");
        assert_eq!(config.target, "v5");
        assert_eq!(config.slot, 1);
        config.validate().unwrap();
    }

    #[test]
    fn empty_file_object_is_default() {
        let file = write_config("{}");

        assert_eq!(
            RunnerConfig::load(file.path()).unwrap(),
            RunnerConfig::default()
        );
    }

    #[test]
    fn partial_override() {
        let file = write_config(r#"{ "slot": 4, "objcopy": "llvm-objcopy" }"#);
        let config = RunnerConfig::load(file.path()).unwrap();

        assert_eq!(
            config,
            RunnerConfig {
                objcopy: "llvm-objcopy".into(),
                slot: 4,
                ..RunnerConfig::default()
            }
        );
    }

    #[test]
    fn unknown_field() {
        let file = write_config(r#"{ "slots": 4 }"#);

        assert!(RunnerConfig::load(file.path()).is_err());
    }

    #[test]
    fn slot_out_of_range() {
        for slot in [0, 9] {
            let file = write_config(&format!(r#"{{ "slot": {slot} }}"#));

            assert!(RunnerConfig::load(file.path()).is_err());
        }
    }

    #[test]
    fn empty_values() {
        let file = write_config(r#"{ "uploader": "" }"#);
        assert!(RunnerConfig::load(file.path()).is_err());

        let file = write_config(r#"{ "strip_symbols": ["install_hot_table", ""] }"#);
        assert!(RunnerConfig::load(file.path()).is_err());
    }

    #[test]
    fn no_strip_symbols_is_valid() {
        let file = write_config(r#"{ "strip_symbols": [] }"#);

        assert!(RunnerConfig::load(file.path())
            .unwrap()
            .strip_symbols
            .is_empty());
    }

    #[test]
    fn missing_file() {
        let directory = tempfile::tempdir().unwrap();

        assert!(RunnerConfig::load(&directory.path().join("runner.json")).is_err());
    }
}
