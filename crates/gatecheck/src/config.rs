use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gatecheck_core::contract::DEFAULT_GENERATED_AT;
use gatecheck_engine::driver::{RunContext, DEFAULT_OUTPUT_ROOT};
use serde::Deserialize;

/// Workspace config location relative to the project root.
pub const CONFIG_PATH: &str = ".gatecheck/config.json";
pub const PYTHON_ENV: &str = "GATECHECK_PYTHON";
pub const DEFAULT_PYTHON: &str = "python";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub python: Option<String>,
    pub output_root: Option<String>,
    pub generated_at: Option<String>,
    pub generator_timeout_seconds: Option<u64>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub python: Option<String>,
    pub generated_at: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub python: String,
    pub output_root: PathBuf,
    pub generated_at: String,
    pub timeout: Option<Duration>,
}

impl Settings {
    pub fn run_context(&self, root: &Path) -> RunContext {
        RunContext {
            root: root.to_path_buf(),
            output_root: self.output_root.clone(),
            generated_at: self.generated_at.clone(),
        }
    }
}

/// Read the config file. A missing default file yields defaults; an explicit
/// `--config` path must exist.
pub fn load_file_config(root: &Path, explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = root.join(CONFIG_PATH);
            if !path.exists() {
                return Ok(FileConfig::default());
            }
            path
        }
    };
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{}: invalid config", path.display()))
}

/// Flag > environment > file > default.
pub fn resolve(file: FileConfig, env_python: Option<String>, overrides: &Overrides) -> Settings {
    let python = overrides
        .python
        .clone()
        .or(env_python.filter(|p| !p.trim().is_empty()))
        .or(file.python)
        .unwrap_or_else(|| DEFAULT_PYTHON.to_string());
    let generated_at = overrides
        .generated_at
        .clone()
        .or(file.generated_at)
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    let timeout = overrides
        .timeout_seconds
        .or(file.generator_timeout_seconds)
        .map(Duration::from_secs);

    Settings {
        python,
        output_root: PathBuf::from(
            file.output_root
                .unwrap_or_else(|| DEFAULT_OUTPUT_ROOT.to_string()),
        ),
        generated_at,
        timeout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_file_config(dir.path(), None).unwrap();
        let settings = resolve(file, None, &Overrides::default());
        assert_eq!(settings.python, "python");
        assert_eq!(settings.output_root, PathBuf::from("tmp/quality_gate_automation"));
        assert_eq!(settings.generated_at, "2026-02-23T22:00:00Z");
        assert_eq!(settings.timeout, None);
    }

    #[test]
    fn file_values_are_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".gatecheck")).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_PATH),
            r#"{ "python": "python3", "output_root": "out", "generator_timeout_seconds": 30 }"#,
        )
        .unwrap();
        let settings = resolve(
            load_file_config(dir.path(), None).unwrap(),
            None,
            &Overrides::default(),
        );
        assert_eq!(settings.python, "python3");
        assert_eq!(settings.output_root, PathBuf::from("out"));
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let file = FileConfig {
            python: Some("from-file".into()),
            ..FileConfig::default()
        };
        let env = Some("from-env".to_string());
        assert_eq!(
            resolve(file.clone(), env.clone(), &Overrides::default()).python,
            "from-env"
        );
        let flag = Overrides {
            python: Some("from-flag".into()),
            ..Overrides::default()
        };
        assert_eq!(resolve(file.clone(), env, &flag).python, "from-flag");
        assert_eq!(
            resolve(file, Some("  ".into()), &Overrides::default()).python,
            "from-file"
        );
    }

    #[test]
    fn malformed_or_unknown_keys_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(load_file_config(dir.path(), Some(&path)).is_err());
        std::fs::write(&path, r#"{ "pyton": "x" }"#).unwrap();
        assert!(load_file_config(dir.path(), Some(&path)).is_err());
    }

    #[test]
    fn explicit_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(load_file_config(dir.path(), Some(&missing)).is_err());
    }
}
