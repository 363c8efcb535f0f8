use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fingerprint::full::DEFAULT_BUFFER_CAP;
use crate::fingerprint::{FullFingerprinter, SamplingParams};

const CONFIG_DIR: &str = ".fileprint";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub full: FullConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Bytes read per sampled window
    pub window_size: usize,
    /// Upper bound on the number of windows per file
    pub max_windows: u64,
    /// Smallest distance between window starts, in bytes
    pub minimum_stride: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullConfig {
    /// Largest read buffer for full checksums (smaller files get a smaller one)
    pub buffer_size: usize,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Threads for directory walking (0 = half available cores)
    pub max_threads: usize,
    /// Skip files larger than this many bytes (0 = no limit)
    pub max_file_size: u64,
    /// Include hidden files and directories
    pub hidden: bool,
    /// Honor .gitignore / .ignore files
    pub respect_gitignore: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        let params = SamplingParams::DEFAULT;
        Self {
            window_size: params.window_size(),
            max_windows: params.max_windows(),
            minimum_stride: params.minimum_stride(),
        }
    }
}

impl Default for FullConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_CAP,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            max_file_size: 0,
            hidden: false,
            respect_gitignore: true,
        }
    }
}

impl Config {
    /// Load config from a .fileprint/config.toml file, falling back to defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = Self::path(root);
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading config from {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("parsing config from {}", config_path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Validated sampling parameters.
    pub fn sampling_params(&self) -> Result<SamplingParams> {
        let s = &self.sampling;
        SamplingParams::new(s.window_size, s.max_windows, s.minimum_stride)
            .context("invalid [sampling] section")
    }

    pub fn full_fingerprinter(&self) -> FullFingerprinter {
        FullFingerprinter::new().buffer_cap(self.full.buffer_size)
    }

    /// Effective thread count, resolving 0 to a sensible default.
    pub fn effective_threads(&self) -> usize {
        if self.scan.max_threads == 0 {
            let num_cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4);
            (num_cpus / 2).max(1)
        } else {
            self.scan.max_threads
        }
    }

    /// Write current config to disk (for `fileprint init`).
    pub fn save(&self, root: &Path) -> Result<PathBuf> {
        let config_path = Self::path(root);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("writing config to {}", config_path.display()))?;
        Ok(config_path)
    }
}
