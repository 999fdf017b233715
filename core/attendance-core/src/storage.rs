//! Storage configuration and path management.
//!
//! `StorageConfig` centralizes every on-disk location the client uses.
//! Production code uses `StorageConfig::default()` (`~/.attendance/`); tests
//! use `StorageConfig::with_root(temp_dir)` for isolation.

use std::path::{Path, PathBuf};

use fs_err as fs;

/// Store key for the pending approval queue.
pub const QUEUE_KEY: &str = "pending-actions";
/// Store key for last-known session statuses, by actor.
pub const STATUS_KEY: &str = "session-status";
/// Store key for per-day attendance history.
pub const RECORDS_KEY: &str = "attendance-records";

#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            root: home.join(".attendance"),
        }
    }
}

impl StorageConfig {
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json (shift, session and sync policies).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Directory backing the durable [`FileStore`](crate::local_store::FileStore).
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Directory for rolling log files.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Ensures the root directory and standard subdirectories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.data_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_root_is_attendance() {
        let config = StorageConfig::default();
        assert!(config.root().ends_with(".attendance"));
    }

    #[test]
    fn test_paths_hang_off_root() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/attendance"));
        assert_eq!(
            config.config_file(),
            PathBuf::from("/tmp/attendance/config.json")
        );
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/attendance/data"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/attendance/logs"));
    }

    #[test]
    fn test_ensure_dirs_creates_structure() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig::with_root(temp.path().join("root"));

        config.ensure_dirs().unwrap();

        assert!(config.root().exists());
        assert!(config.data_dir().exists());
        assert!(config.logs_dir().exists());
    }

    #[test]
    fn test_ensure_dirs_error_names_the_path() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("occupied");
        fs::write(&blocker, b"not a directory").unwrap();
        let config = StorageConfig::with_root(blocker.join("root"));

        let err = config.ensure_dirs().unwrap_err();
        assert!(err.to_string().contains("occupied"));
    }
}
