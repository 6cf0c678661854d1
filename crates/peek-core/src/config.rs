//! Runtime configuration for the diagnostic primitives.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "PEEK_CONFIG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeekConfig {
    /// Emit lines at all; disabled primitives still evaluate their arguments
    pub enabled: bool,

    /// Stream receiving diagnostic lines
    pub sink: SinkKind,

    /// Print the file path as recorded by the compiler instead of just the file name
    pub full_paths: bool,

    /// Extra directories searched for caller source files
    pub source_roots: Vec<PathBuf>,

    /// Lines read past the call line while a call's parentheses stay open
    pub max_call_lines: usize,

    /// Substitute index sub-expressions with their values in `pv` output
    pub resolve_indices: bool,
}

impl Default for PeekConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: SinkKind::Stdout,
            full_paths: false,
            source_roots: Vec::new(),
            max_call_lines: 16,
            resolve_indices: true,
        }
    }
}

impl PeekConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the file named by `PEEK_CONFIG`, then `PEEK_*` overrides.
    pub fn from_env() -> Self {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from_file(Path::new(&path)).unwrap_or_else(|err| {
                warn!("ignoring {}: {}", CONFIG_ENV, err);
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `PEEK_*` overrides read through `lookup`. Unparseable values are skipped.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("PEEK_ENABLED") {
            apply_flag("PEEK_ENABLED", &value, &mut self.enabled);
        }
        if let Some(value) = lookup("PEEK_FULL_PATHS") {
            apply_flag("PEEK_FULL_PATHS", &value, &mut self.full_paths);
        }
        if let Some(value) = lookup("PEEK_RESOLVE_INDICES") {
            apply_flag("PEEK_RESOLVE_INDICES", &value, &mut self.resolve_indices);
        }
        if let Some(value) = lookup("PEEK_SINK") {
            match value.trim().to_ascii_lowercase().as_str() {
                "stdout" => self.sink = SinkKind::Stdout,
                "stderr" => self.sink = SinkKind::Stderr,
                other => warn!("PEEK_SINK: unknown sink '{}'", other),
            }
        }
        if let Some(value) = lookup("PEEK_MAX_CALL_LINES") {
            match value.trim().parse() {
                Ok(lines) => self.max_call_lines = lines,
                Err(err) => warn!("PEEK_MAX_CALL_LINES: {}", err),
            }
        }
        if let Some(value) = lookup("PEEK_SOURCE_ROOTS") {
            self.source_roots.extend(std::env::split_paths(&value));
        }
    }

    /// Process-wide configuration, read once from the environment.
    pub fn global() -> &'static PeekConfig {
        &GLOBAL_CONFIG
    }
}

static GLOBAL_CONFIG: Lazy<PeekConfig> = Lazy::new(PeekConfig::from_env);

fn apply_flag(key: &str, value: &str, slot: &mut bool) {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        other => warn!("{}: expected a boolean, got '{}'", key, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_apply_on_top_of_defaults() {
        let env: HashMap<&str, &str> = [
            ("PEEK_ENABLED", "off"),
            ("PEEK_SINK", "stderr"),
            ("PEEK_MAX_CALL_LINES", "4"),
            ("PEEK_FULL_PATHS", "maybe"),
        ]
        .into_iter()
        .collect();
        let mut config = PeekConfig::default();
        config.apply_env(|key| env.get(key).map(|value| value.to_string()));
        assert!(!config.enabled);
        assert_eq!(config.sink, SinkKind::Stderr);
        assert_eq!(config.max_call_lines, 4);
        assert!(!config.full_paths);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peek.toml");
        std::fs::write(&path, "full_paths = true\nsource_roots = [\"/src\"]\n").unwrap();
        let config = PeekConfig::load_from_file(&path).unwrap();
        assert!(config.full_paths);
        assert!(config.enabled);
        assert_eq!(config.source_roots, vec![PathBuf::from("/src")]);
        assert_eq!(config.max_call_lines, 16);
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peek.toml");
        std::fs::write(&path, "enabled = \"sometimes\"").unwrap();
        let err = PeekConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("peek.toml"));
    }
}
