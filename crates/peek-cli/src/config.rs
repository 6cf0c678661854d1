//! Locating the configuration the CLI runs with.

use std::path::{Path, PathBuf};

use peek_core::PeekConfig;
use tracing::debug;

use crate::Result;

pub const LOCAL_CONFIG: &str = "peek.toml";

/// An explicit path must load; otherwise `./peek.toml`, then the user config file, then
/// defaults. `PEEK_*` environment overrides apply on top in every case.
pub fn load(config_path: Option<&Path>) -> Result<PeekConfig> {
    let mut config = match config_path {
        Some(path) => PeekConfig::load_from_file(path)?,
        None => search_paths()
            .into_iter()
            .find(|path| path.is_file())
            .map(|path| {
                debug!("using config {}", path.display());
                PeekConfig::load_from_file(&path)
            })
            .transpose()?
            .unwrap_or_default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    paths.extend(default_config_path());
    paths
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("peek").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peek.toml");
        std::fs::write(&path, "max_call_lines = 3\n").unwrap();
        assert_eq!(load(Some(&path)).unwrap().max_call_lines, 3);
    }
}
