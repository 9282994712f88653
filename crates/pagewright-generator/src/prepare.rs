//! Build preparation.
//!
//! Derives the web app manifest from configuration and writes it next to
//! the generated sources before the bundler runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use pagewright_core::{Config, config::ManifestSettings};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Preparation errors.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Writing a generated file failed.
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest serialization failed.
    #[error("failed to serialize manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for preparation.
pub type Result<T> = std::result::Result<T, PrepareError>;

/// Web app manifest fields handed to the favicon plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfig {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub start_url: String,
    pub display: String,
    pub background_color: String,
    pub theme_color: String,
    pub icon: String,
}

impl From<&ManifestSettings> for ManifestConfig {
    fn from(settings: &ManifestSettings) -> Self {
        Self {
            name: settings.name.clone(),
            short_name: settings
                .short_name
                .clone()
                .unwrap_or_else(|| settings.name.clone()),
            description: settings.description.clone().unwrap_or_default(),
            start_url: settings.start_url.clone(),
            display: settings.display.clone(),
            background_color: settings.background_color.clone(),
            theme_color: settings.theme_color.clone(),
            icon: settings.icon.to_string_lossy().replace('\\', "/"),
        }
    }
}

/// Write the manifest for this configuration and return it.
pub fn prepare(config: &Config) -> Result<ManifestConfig> {
    let manifest = ManifestConfig::from(&config.manifest);
    let json = serde_json::to_string_pretty(&manifest)?;
    write_output(&config.resolve(&config.output.manifest), &json)?;
    Ok(manifest)
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: &str) -> Result<()> {
    let io_err = |source| PrepareError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)?;

    debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
