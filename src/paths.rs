use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("letras-offline"))
}

pub fn cache_database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("cache.db")
}

pub fn state_file_path(data_dir: &Path) -> PathBuf {
    data_dir.join("state.json")
}
