//! Path Utilities
//!
//! Functions for resolving the application's per-user directory
//! (`~/.proposal-forge/`) and the config files searched at startup.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Name of the project-local config file searched in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "proposal-forge.toml";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Proposal Forge directory (~/.proposal-forge/)
pub fn proposal_forge_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".proposal-forge"))
}

/// Get the user config file path (~/.proposal-forge/config.toml)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(proposal_forge_dir()?.join("config.toml"))
}

/// Project-local config file in the current working directory
pub fn local_config_path() -> PathBuf {
    PathBuf::from(LOCAL_CONFIG_FILE)
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure the parent directory of a file path exists
pub fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_forge_dir() {
        let dir = proposal_forge_dir();
        assert!(dir.is_ok());
        let path = dir.unwrap();
        assert!(path.to_string_lossy().contains(".proposal-forge"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path().unwrap();
        assert!(path.ends_with(".proposal-forge/config.toml"));
        assert_eq!(local_config_path(), PathBuf::from("proposal-forge.toml"));
    }

    #[test]
    fn test_ensure_parent_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("logs").join("agent.log");
        ensure_parent_dir(&file).unwrap();
        assert!(tmp.path().join("logs").is_dir());

        // bare file names have no parent to create
        ensure_parent_dir(Path::new("agent.log")).unwrap();
    }
}
