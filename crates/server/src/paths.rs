//! Path resolution for threadrelay data files.
//!
//! Resolved once at startup from: CLI `--data-dir` / `THREADRELAY_DATA_DIR` > `~/.threadrelay`.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let root = match explicit {
            Some(path) => path.to_path_buf(),
            None => dirs::home_dir()
                .context("HOME directory not found; pass --data-dir")?
                .join(".threadrelay"),
        };
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join("server.log")
    }

    /// Create the data dir and its subdirectories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}
