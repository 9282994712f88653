//! Project configuration management.
//!
//! Every field has a default, so a project without `pagewright.toml` builds
//! with the conventional layout (`content/`, `images/`, `gen/`, `dist/`).

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for pagewright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where content is read from.
    #[serde(default)]
    pub content: ContentConfig,

    /// Where generated sources are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// External content compiler.
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// External bundler.
    #[serde(default)]
    pub bundler: BundlerSettings,

    /// Watch mode settings.
    #[serde(default)]
    pub watch: WatchConfig,

    /// Web app manifest fields.
    #[serde(default)]
    pub manifest: ManifestSettings,
}

/// Content ingestion settings. Globs are relative to `root`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Project root every relative path is resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Raw content files, passed through with their text.
    #[serde(default = "default_raw_glob")]
    pub raw_glob: String,

    /// Markdown files, split into front matter and body.
    #[serde(default = "default_markdown_glob")]
    pub markdown_glob: String,

    /// Image assets, passed as paths only.
    #[serde(default = "default_image_glob")]
    pub image_glob: String,
}

/// Fixed output locations, relative to the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Generated content module.
    #[serde(default = "default_raw_content_path")]
    pub raw_content: PathBuf,

    /// Generated UI module with route and asset records.
    #[serde(default = "default_ui_source_path")]
    pub ui_source: PathBuf,

    /// Generated image asset mapping script.
    #[serde(default = "default_image_assets_path")]
    pub image_assets: PathBuf,

    /// Web app manifest written during build preparation.
    #[serde(default = "default_manifest_path")]
    pub manifest: PathBuf,
}

/// External content compiler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_compiler_program")]
    pub program: String,

    #[serde(default = "default_compiler_args")]
    pub args: Vec<String>,
}

/// External bundler invocation and pipeline inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlerSettings {
    #[serde(default = "default_bundler_program")]
    pub program: String,

    #[serde(default = "default_bundler_args")]
    pub args: Vec<String>,

    /// Script entry point.
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Directory the bundle and prerendered pages land in.
    #[serde(default = "default_dist_dir")]
    pub output_dir: PathBuf,

    /// HTML template the bundle is injected into.
    #[serde(default = "default_template")]
    pub template: PathBuf,

    /// Static files copied verbatim into the output.
    #[serde(default = "default_static_glob")]
    pub static_glob: String,

    /// Service worker file name inside the output directory.
    #[serde(default = "default_service_worker")]
    pub service_worker: String,

    /// Where the pipeline descriptor handed to the bundler is written.
    #[serde(default = "default_bundler_config_path")]
    pub config_path: PathBuf,

    /// Bundler's own rebuild aggregation delay in development.
    #[serde(default = "default_aggregate_timeout_ms")]
    pub aggregate_timeout_ms: u64,
}

/// Watch mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiescence window a file must stay unchanged before a rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

/// Web app manifest fields consumed by the favicon plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default = "default_manifest_name")]
    pub name: String,

    #[serde(default)]
    pub short_name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_start_url")]
    pub start_url: String,

    #[serde(default = "default_display")]
    pub display: String,

    #[serde(default = "default_color")]
    pub background_color: String,

    #[serde(default = "default_color")]
    pub theme_color: String,

    /// Source image the icon set is generated from.
    #[serde(default = "default_icon")]
    pub icon: PathBuf,
}

// Default value functions
fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_raw_glob() -> String {
    "content/**/*.emu".to_string()
}

fn default_markdown_glob() -> String {
    "content/**/*.md".to_string()
}

fn default_image_glob() -> String {
    "images/**/*".to_string()
}

fn default_raw_content_path() -> PathBuf {
    PathBuf::from("gen/RawContent.elm")
}

fn default_ui_source_path() -> PathBuf {
    PathBuf::from("gen/PagesNew.elm")
}

fn default_image_assets_path() -> PathBuf {
    PathBuf::from("src/js/image-assets.js")
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("gen/manifest.json")
}

fn default_compiler_program() -> String {
    "node".to_string()
}

fn default_compiler_args() -> Vec<String> {
    vec!["elm-stuff/pagewright/compiler.js".to_string()]
}

fn default_bundler_program() -> String {
    "npx".to_string()
}

fn default_bundler_args() -> Vec<String> {
    vec!["pagewright-bundle".to_string()]
}

fn default_entry() -> String {
    "./index.js".to_string()
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_template() -> PathBuf {
    PathBuf::from("template.html")
}

fn default_static_glob() -> String {
    "static/**/*".to_string()
}

fn default_service_worker() -> String {
    "service-worker.js".to_string()
}

fn default_bundler_config_path() -> PathBuf {
    PathBuf::from("gen/bundler.config.json")
}

fn default_aggregate_timeout_ms() -> u64 {
    300
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_manifest_name() -> String {
    "pagewright site".to_string()
}

fn default_start_url() -> String {
    "/".to_string()
}

fn default_display() -> String {
    "standalone".to_string()
}

fn default_color() -> String {
    "#ffffff".to_string()
}

fn default_icon() -> PathBuf {
    PathBuf::from("images/icon.png")
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            raw_glob: default_raw_glob(),
            markdown_glob: default_markdown_glob(),
            image_glob: default_image_glob(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw_content: default_raw_content_path(),
            ui_source: default_ui_source_path(),
            image_assets: default_image_assets_path(),
            manifest: default_manifest_path(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_compiler_program(),
            args: default_compiler_args(),
        }
    }
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            program: default_bundler_program(),
            args: default_bundler_args(),
            entry: default_entry(),
            output_dir: default_dist_dir(),
            template: default_template(),
            static_glob: default_static_glob(),
            service_worker: default_service_worker(),
            config_path: default_bundler_config_path(),
            aggregate_timeout_ms: default_aggregate_timeout_ms(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            name: default_manifest_name(),
            short_name: None,
            description: None,
            start_url: default_start_url(),
            display: default_display(),
            background_color: default_color(),
            theme_color: default_color(),
            icon: default_icon(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with `PAGEWRIGHT__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("PAGEWRIGHT").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        for (name, glob) in [
            ("content.raw_glob", &self.content.raw_glob),
            ("content.markdown_glob", &self.content.markdown_glob),
            ("content.image_glob", &self.content.image_glob),
        ] {
            if glob.trim().is_empty() {
                return Err(CoreError::config(format!("{name} cannot be empty")));
            }
        }

        if self.compiler.program.trim().is_empty() {
            return Err(CoreError::config("compiler.program cannot be empty"));
        }

        if self.bundler.program.trim().is_empty() {
            return Err(CoreError::config("bundler.program cannot be empty"));
        }

        if self.watch.debounce_ms == 0 {
            return Err(CoreError::config("watch.debounce_ms must be positive"));
        }

        if self.content.raw_glob.starts_with('/') || self.content.markdown_glob.starts_with('/') {
            tracing::warn!("content globs are resolved against content.root; leading '/' is unusual");
        }

        Ok(())
    }

    /// Resolve a project-relative path against the content root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.content.root.join(path)
    }

    /// Globs whose changes trigger a rebuild in watch mode.
    pub fn watched_globs(&self) -> [&str; 2] {
        [&self.content.raw_glob, &self.content.markdown_glob]
    }
}
