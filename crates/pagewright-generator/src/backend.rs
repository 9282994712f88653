//! Build backend adapter.
//!
//! The bundler pipeline is fixed: the same ordered plugin list is handed to
//! the bundler in both modes, only the mode, the Elm loader options and the
//! watch settings differ. The descriptor is written as JSON and the bundler
//! program reads it through `--config`.

use std::{
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
};

use pagewright_core::config::BundlerSettings;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::Mutex,
};
use tracing::{debug, error, info, instrument};

use crate::prepare::{ManifestConfig, PrepareError, write_output};

/// Event the prerenderer waits for before snapshotting a page.
pub const PRERENDER_EVENT: &str = "prerender-trigger";

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The bundler process could not be started.
    #[error("failed to start bundler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A one-shot build exited unsuccessfully.
    #[error("bundler failed ({status})")]
    Failed { status: String },

    /// The descriptor could not be written.
    #[error(transparent)]
    Descriptor(#[from] PrepareError),

    /// The descriptor could not be encoded.
    #[error("failed to encode bundler config: {0}")]
    Encode(#[from] serde_json::Error),

    /// Waiting on the bundler failed.
    #[error("bundler I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Production,
    Development,
}

/// Where the bundle is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTarget {
    pub path: String,
    pub public_path: String,
}

/// Where the HTML template injects its script tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Inject {
    Head,
    Body,
}

/// A file emitted verbatim into the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedFile {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheHandler {
    CacheFirst,
    NetworkFirst,
}

/// Service worker runtime caching rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCache {
    /// Regular expression source matched against request URLs.
    pub url_pattern: String,
    pub handler: CacheHandler,
    pub cache_name: String,
}

/// One bundler plugin, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "plugin",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Plugin {
    AddFiles {
        files: Vec<AddedFile>,
    },
    HtmlTemplate {
        template: String,
        inject: Inject,
    },
    CopyAssets {
        from: String,
        strip_leading_component: bool,
    },
    Prerender {
        static_dir: String,
        routes: Vec<String>,
        render_after_document_event: String,
    },
    ServiceWorker {
        include: Vec<String>,
        navigate_fallback: String,
        sw_dest: String,
        runtime_caching: Vec<RuntimeCache>,
    },
    Favicons {
        logo: String,
        manifest: Option<ManifestConfig>,
    },
}

/// Options for the Elm loader rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElmLoader {
    pub optimize: bool,
    pub hot_reload: bool,
    pub debug: bool,
    pub force_watch: bool,
}

impl ElmLoader {
    fn for_mode(production: bool, debug: bool) -> Self {
        if production {
            Self {
                optimize: true,
                hot_reload: false,
                debug: false,
                force_watch: false,
            }
        } else {
            Self {
                optimize: false,
                hot_reload: true,
                debug,
                force_watch: true,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    pub aggregate_timeout_ms: u64,
}

/// Complete bundler pipeline descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlerConfig {
    pub mode: Mode,
    pub entry: String,
    pub output: OutputTarget,
    pub plugins: Vec<Plugin>,
    pub elm_loader: ElmLoader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<WatchOptions>,
}

impl BundlerConfig {
    /// Build the descriptor for one mode.
    pub fn new(
        production: bool,
        routes: Vec<String>,
        debug: bool,
        settings: &BundlerSettings,
        manifest: Option<ManifestConfig>,
    ) -> Self {
        let output_dir = slash_path(&settings.output_dir);

        let plugins = vec![
            Plugin::AddFiles {
                files: vec![AddedFile {
                    name: "about/content.txt".to_string(),
                    content: format!("Built with pagewright {}", env!("CARGO_PKG_VERSION")),
                }],
            },
            Plugin::HtmlTemplate {
                template: slash_path(&settings.template),
                inject: Inject::Head,
            },
            Plugin::CopyAssets {
                from: settings.static_glob.clone(),
                strip_leading_component: true,
            },
            Plugin::Prerender {
                static_dir: output_dir.clone(),
                routes,
                render_after_document_event: PRERENDER_EVENT.to_string(),
            },
            Plugin::ServiceWorker {
                include: vec![r"^index\.html$".to_string(), r"\.js$".to_string()],
                navigate_fallback: "index.html".to_string(),
                sw_dest: settings.service_worker.clone(),
                runtime_caching: vec![
                    RuntimeCache {
                        url_pattern: r"^https://fonts\.gstatic\.com".to_string(),
                        handler: CacheHandler::CacheFirst,
                        cache_name: "fonts".to_string(),
                    },
                    RuntimeCache {
                        url_pattern: r"\.(?:png|gif|jpg|jpeg|svg)$".to_string(),
                        handler: CacheHandler::CacheFirst,
                        cache_name: "images".to_string(),
                    },
                ],
            },
            Plugin::Favicons {
                logo: manifest
                    .as_ref()
                    .map(|m| m.icon.clone())
                    .unwrap_or_else(|| "icon.svg".to_string()),
                manifest,
            },
        ];

        Self {
            mode: if production {
                Mode::Production
            } else {
                Mode::Development
            },
            entry: settings.entry.clone(),
            output: OutputTarget {
                path: output_dir,
                public_path: "/".to_string(),
            },
            plugins,
            elm_loader: ElmLoader::for_mode(production, debug),
            watch: (!production).then_some(WatchOptions {
                aggregate_timeout_ms: settings.aggregate_timeout_ms,
            }),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// A bundler that can build once or keep rebuilding in the background.
pub trait BuildBackend {
    /// Run a one-shot build and wait for it to finish.
    fn build(&self, config: &BundlerConfig) -> impl Future<Output = Result<()>> + Send;

    /// Start the development bundler. Returns once it is running. The
    /// descriptor is rewritten on every call; a running bundler is not
    /// spawned again.
    fn start(&self, config: &BundlerConfig) -> impl Future<Output = Result<()>> + Send;
}

/// Bundler run as an external program.
#[derive(Debug)]
pub struct ProcessBackend {
    program: String,
    args: Vec<String>,
    config_path: PathBuf,
    working_dir: PathBuf,
    dev: Mutex<Option<Child>>,
}

impl ProcessBackend {
    #[must_use]
    pub fn new(settings: &BundlerSettings, working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            program: settings.program.clone(),
            args: settings.args.clone(),
            config_path: working_dir.join(&settings.config_path),
            working_dir,
            dev: Mutex::new(None),
        }
    }

    /// Path the descriptor is written to.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn write_descriptor(&self, config: &BundlerConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        write_output(&self.config_path, &json)?;
        Ok(())
    }

    fn command(&self, config: &BundlerConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--config")
            .arg(&self.config_path)
            .current_dir(&self.working_dir)
            .kill_on_drop(true);
        if !config.is_production() {
            cmd.arg("--watch");
        }
        cmd
    }

    fn spawn_err(&self) -> impl FnOnce(std::io::Error) -> BackendError + '_ {
        |source| BackendError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl BuildBackend for ProcessBackend {
    #[instrument(skip_all, fields(program = %self.program))]
    async fn build(&self, config: &BundlerConfig) -> Result<()> {
        self.write_descriptor(config)?;
        info!(config = %self.config_path.display(), "running production build");

        let status = self
            .command(config)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(self.spawn_err())?;

        if !status.success() {
            return Err(BackendError::Failed {
                status: status.to_string(),
            });
        }

        info!("production build complete");
        Ok(())
    }

    #[instrument(skip_all, fields(program = %self.program))]
    async fn start(&self, config: &BundlerConfig) -> Result<()> {
        let mut dev = self.dev.lock().await;
        self.write_descriptor(config)?;

        if let Some(child) = dev.as_mut() {
            match child.try_wait()? {
                None => {
                    debug!("development bundler already running");
                    return Ok(());
                }
                Some(status) => {
                    error!(%status, "development bundler exited, restarting");
                }
            }
        }

        let mut child = self
            .command(config)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(self.spawn_err())?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    error!(line = %line, "bundler");
                }
            });
        }

        info!(pid = ?child.id(), "development bundler started");
        *dev = Some(child);
        Ok(())
    }
}
