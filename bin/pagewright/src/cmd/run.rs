//! Run command - one build cycle, then watch mode if the compiler asks for it

use std::{path::Path, process::ExitCode};

use color_eyre::eyre::{Result, WrapErr};
use pagewright_core::Config;
use pagewright_generator::{
    BuildBackend, Compiler, ContentWatcher, CycleOutcome, Debouncer, Driver, ExitRequest,
    ProcessBackend, ProcessCompiler, watch_loop,
};

/// Run the build.
///
/// `argv` is handed to the compiler as-is. The returned code is the one the
/// process should exit with.
pub async fn run(config_path: &Path, argv: Vec<String>) -> Result<ExitCode> {
    tracing::info!(?config_path, "Starting pagewright");

    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    let root = config.content.root.clone();
    let compiler = ProcessCompiler::new(&config.compiler, &root);
    let backend = ProcessBackend::new(&config.bundler, &root);
    let driver = Driver::new(config, compiler, backend, argv);

    let outcome = driver.run_cycle().await.wrap_err("Build failed")?;
    match outcome {
        CycleOutcome::Exit(request) => Ok(exit_with(request)),
        CycleOutcome::Built => Ok(ExitCode::SUCCESS),
        CycleOutcome::Watching => watch(&driver).await,
    }
}

/// Watch content and rebuild until the compiler asks to exit.
async fn watch<C: Compiler, B: BuildBackend>(driver: &Driver<C, B>) -> Result<ExitCode> {
    let config = driver.config();
    let (mut watcher, events) = ContentWatcher::channel(config);
    watcher
        .ensure_started()
        .wrap_err("Failed to start watching content")?;

    let debouncer = Debouncer::new(config.watch.debounce());
    let request = watch_loop(|| driver.run_cycle(), events, debouncer).await;

    Ok(request.map_or(ExitCode::SUCCESS, exit_with))
}

fn exit_with(request: ExitRequest) -> ExitCode {
    println!("{}", request.message);
    ExitCode::from(request.code)
}
