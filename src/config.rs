// Configuration for pdfmeta: defaults, TOML file, env overrides
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::types::{MetaError, Result};

// Worker pool bounds
pub const MAX_WORKERS: usize = 64;
pub const WORKERS_PER_CORE: usize = 2;
pub const DEFAULT_APPLY_WORKERS: usize = 4;

pub const CONFIG_ENV: &str = "PDFMETA_CONFIG";
pub const WORKERS_ENV: &str = "PDFMETA_WORKERS";
const CONFIG_DIR: &str = "pdfmeta";
const CONFIG_FILE: &str = "config.toml";

/// How filename-derived and embedded values are compared before flagging a mismatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Byte-for-byte comparison
    Exact,
    /// Surrounding whitespace ignored
    Trim,
    /// Surrounding whitespace and letter case ignored
    #[default]
    TrimIgnoreCase,
}

impl Normalization {
    pub fn normalize(self, value: &str) -> String {
        match self {
            Normalization::Exact => value.to_string(),
            Normalization::Trim => value.trim().to_string(),
            Normalization::TrimIgnoreCase => value.trim().to_lowercase(),
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Normalization::Exact),
            "trim" => Ok(Normalization::Trim),
            "trim-ignore-case" => Ok(Normalization::TrimIgnoreCase),
            other => Err(format!(
                "unknown normalization '{}' (expected exact, trim or trim-ignore-case)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default, rename = "match")]
    pub matching: MatchConfig,
    #[serde(default)]
    pub apply: ApplyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanConfig {
    #[serde(default = "default_scan_workers")]
    pub workers: usize,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_true")]
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_scan_workers(),
            follow_symlinks: false,
            include_hidden: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplyConfig {
    #[serde(default = "default_apply_workers")]
    pub workers: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            workers: default_apply_workers(),
        }
    }
}

fn default_true() -> bool { true }
fn default_apply_workers() -> usize { DEFAULT_APPLY_WORKERS }

/// A small multiple of the available cores; reads are I/O bound
pub fn default_scan_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    clamp_workers(cores * WORKERS_PER_CORE)
}

pub fn clamp_workers(workers: usize) -> usize {
    workers.clamp(1, MAX_WORKERS)
}

impl Config {
    /// Load from `$PDFMETA_CONFIG` or the user config dir, then apply env overrides.
    /// A missing file is not an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| MetaError::Config(format!("{}: {}", path.display(), e)))?;
        config.scan.workers = clamp_workers(config.scan.workers);
        config.apply.workers = clamp_workers(config.apply.workers);
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = env::var(WORKERS_ENV) {
            let workers: usize = raw
                .trim()
                .parse()
                .map_err(|_| MetaError::Config(format!("{}={} is not a number", WORKERS_ENV, raw)))?;
            self.scan.workers = clamp_workers(workers);
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
