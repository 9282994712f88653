//! Generation driver.
//!
//! One cycle: collect content, hand it to the compiler, and act on the
//! single message it answers with.

use pagewright_core::{CompilerFlags, CompilerMessage, Config, ContentBundle, GenerationResult};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    backend::{BackendError, BuildBackend, BundlerConfig},
    collector::{CollectorError, ContentCollector},
    compiler::{Compiler, CompilerError},
    prepare::{self, PrepareError, write_output},
    routes::StaticRoutes,
};

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("content collection failed: {0}")]
    Collect(#[from] CollectorError),

    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Write(#[from] PrepareError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// The compiler asked the process to print a message and exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitRequest {
    pub code: u8,
    pub message: String,
}

impl ExitRequest {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
        }
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Print and exit; nothing was written.
    Exit(ExitRequest),
    /// Files written and the production build finished.
    Built,
    /// Files written and the development bundler is running.
    Watching,
}

/// Drives cycles against a compiler and a bundler.
#[derive(Debug)]
pub struct Driver<C, B> {
    config: Config,
    collector: ContentCollector,
    compiler: C,
    backend: B,
    argv: Vec<String>,
}

impl<C: Compiler, B: BuildBackend> Driver<C, B> {
    /// `argv` is forwarded to the compiler untouched.
    pub fn new(config: Config, compiler: C, backend: B, argv: Vec<String>) -> Self {
        Self {
            collector: ContentCollector::new(config.clone()),
            config,
            compiler,
            backend,
            argv,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Collect fresh content and run one cycle on it.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        println!("Running pagewright...");
        let bundle = self.collector.collect()?;
        self.run(bundle).await
    }

    /// Run one cycle on an already collected bundle.
    #[instrument(skip_all, fields(files = bundle.len()))]
    pub async fn run(&self, bundle: ContentBundle) -> Result<CycleOutcome> {
        let routes = StaticRoutes::from_bundle(&bundle, &self.config);
        let flags = CompilerFlags::new(self.argv.clone(), env!("CARGO_PKG_VERSION"), bundle);

        match self.compiler.compile(&flags).await? {
            CompilerMessage::PrintAndExitSuccess { message } => {
                Ok(CycleOutcome::Exit(ExitRequest::success(message)))
            }
            CompilerMessage::PrintAndExitFailure { message } => {
                Ok(CycleOutcome::Exit(ExitRequest::failure(message)))
            }
            CompilerMessage::WriteFiles(result) => self.write_and_bundle(result, &routes).await,
        }
    }

    async fn write_and_bundle(
        &self,
        result: GenerationResult,
        routes: &StaticRoutes,
    ) -> Result<CycleOutcome> {
        let output = &self.config.output;
        write_output(&self.config.resolve(&output.raw_content), &result.raw_content)?;
        write_output(&self.config.resolve(&output.ui_source), &routes.ui_source())?;
        write_output(&self.config.resolve(&output.image_assets), &result.image_assets)?;
        println!("pagewright DONE");

        let manifest = prepare::prepare(&self.config)?;

        let route_paths = if result.routes.is_empty() {
            debug!("compiler returned no routes, using content routes");
            routes.route_paths()
        } else {
            result.routes
        };

        let bundler = BundlerConfig::new(
            !result.watch,
            route_paths,
            result.debug,
            &self.config.bundler,
            Some(manifest),
        );

        if result.watch {
            self.backend.start(&bundler).await?;
            Ok(CycleOutcome::Watching)
        } else {
            self.backend.build(&bundler).await?;
            info!("build finished");
            Ok(CycleOutcome::Built)
        }
    }
}
