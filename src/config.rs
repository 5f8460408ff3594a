use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::locator::PackagingContext;
use crate::session::DEFAULT_PROGRESS_BUFFER;

/// Overrides the packaged-resources directory searched for yt-dlp.
pub const RESOURCES_DIR_ENV: &str = "CLIPFETCH_RESOURCES_DIR";
/// Set to `1` for installed builds.
pub const PACKAGED_ENV: &str = "CLIPFETCH_PACKAGED";

/// The structure of the configuration file (config.toml)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub download_directory: String,
    /// Extra directories searched for yt-dlp after the bundled locations.
    #[serde(default)]
    pub binary_dirs: Vec<PathBuf>,
    /// Unset means metadata queries never time out.
    #[serde(default)]
    pub metadata_timeout_secs: Option<u64>,
    #[serde(default = "default_progress_buffer")]
    pub progress_buffer: usize,
}

fn default_progress_buffer() -> usize {
    DEFAULT_PROGRESS_BUFFER
}

impl Default for Config {
    fn default() -> Self {
        let default_dir = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(|p| p.to_string_lossy().to_string()))
            .unwrap_or_else(|| "downloads".to_string());

        Config {
            download_directory: default_dir,
            binary_dirs: Vec::new(),
            metadata_timeout_secs: None,
            progress_buffer: DEFAULT_PROGRESS_BUFFER,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn metadata_timeout(&self) -> Option<Duration> {
        self.metadata_timeout_secs.map(Duration::from_secs)
    }

    /// Where to look for yt-dlp: the running executable's directory, the
    /// resources directory from the environment, then `binary_dirs`.
    pub fn packaging_context(&self) -> PackagingContext {
        let mut context = PackagingContext::current();
        context.packaged = std::env::var(PACKAGED_ENV).map_or(false, |v| v == "1");
        context.resources_dir = std::env::var_os(RESOURCES_DIR_ENV).map(PathBuf::from);
        context.extra_dirs = self.binary_dirs.clone();
        context
    }
}

/// `config.toml` inside the per-user config directory for clipfetch. The
/// directory itself is created on first use.
async fn config_file() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "Clipfetch", "clipfetch")
        .context("no per-user config directory on this system")?;
    let dir = dirs.config_dir();
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;
    Ok(dir.join("config.toml"))
}

/// Reads the user's settings. A missing file is written out with defaults
/// first, so the user has something to edit.
pub async fn load_config() -> Result<Config> {
    let path = config_file().await?;
    if !path.exists() {
        let config = Config::default();
        write_config(&path, &config).await?;
        tracing::info!("Wrote default settings to {}", path.display());
        return Ok(config);
    }
    read_config(&path).await
}

pub async fn save_config(config: &Config) -> Result<()> {
    write_config(&config_file().await?, config).await
}

async fn read_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    Config::from_toml(&content).with_context(|| format!("invalid settings in {}", path.display()))
}

async fn write_config(path: &Path, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)
        .await
        .with_context(|| format!("cannot write {}", path.display()))
}
