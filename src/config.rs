use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::http::Origin;
use crate::paths::{cache_database_path, default_data_dir, state_file_path};

const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_CACHE_VERSION: &str = "v1";

const ORIGIN_VAR: &str = "LETRAS_ORIGIN";
const DATA_DIR_VAR: &str = "LETRAS_DATA_DIR";
const CACHE_VERSION_VAR: &str = "LETRAS_CACHE_VERSION";

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) origin: Origin,
    pub(crate) data_dir: PathBuf,
    pub(crate) cache_version: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) ready_timeout: Duration,
}

impl Config {
    pub(crate) fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli.origin.as_deref(), cli.data_dir.clone(), |key| {
            env::var(key).ok()
        })
    }

    /// Flags win over environment, environment over defaults.
    fn resolve_with(
        origin_flag: Option<&str>,
        data_dir_flag: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let raw_origin = origin_flag
            .map(str::to_string)
            .or_else(|| non_empty(ORIGIN_VAR))
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let origin =
            Origin::parse(&raw_origin).with_context(|| format!("invalid origin `{raw_origin}`"))?;

        let data_dir = match data_dir_flag.or_else(|| non_empty(DATA_DIR_VAR).map(PathBuf::from)) {
            Some(dir) => dir,
            None => default_data_dir()?,
        };

        let cache_version = non_empty(CACHE_VERSION_VAR)
            .map(|version| version.trim().to_string())
            .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string());

        Ok(Self {
            origin,
            data_dir,
            cache_version,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(20),
            ready_timeout: Duration::from_secs(5),
        })
    }

    pub(crate) fn cache_database(&self) -> PathBuf {
        cache_database_path(&self.data_dir)
    }

    pub(crate) fn state_file(&self) -> PathBuf {
        state_file_path(&self.data_dir)
    }
}
