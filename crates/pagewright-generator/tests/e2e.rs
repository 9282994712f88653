//! End-to-end tests for the build cycle.
//!
//! The compiler and bundler are replaced with in-process fakes so a full
//! cycle runs against a temporary project directory.

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use pagewright_core::{CompilerFlags, CompilerMessage, Config, GenerationResult};
use pagewright_generator::{
    BuildBackend, BundlerConfig, Compiler, ContentWatcher, CycleOutcome, Debouncer, Driver,
    ExitRequest, Plugin,
    backend::{self, BackendError},
    compiler,
    driver::DriverError,
    routes::UI_PREAMBLE,
    watch_loop,
};
use tempfile::TempDir;

#[derive(Debug)]
struct FakeCompiler {
    reply: CompilerMessage,
    seen: Mutex<Vec<CompilerFlags>>,
}

impl FakeCompiler {
    fn new(reply: CompilerMessage) -> Self {
        Self {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Compiler for FakeCompiler {
    async fn compile(&self, flags: &CompilerFlags) -> compiler::Result<CompilerMessage> {
        self.seen.lock().unwrap().push(flags.clone());
        Ok(self.reply.clone())
    }
}

#[derive(Debug, Default)]
struct FakeBackend {
    fail: bool,
    builds: Mutex<Vec<BundlerConfig>>,
    starts: Mutex<Vec<BundlerConfig>>,
}

impl BuildBackend for FakeBackend {
    async fn build(&self, config: &BundlerConfig) -> backend::Result<()> {
        self.builds.lock().unwrap().push(config.clone());
        if self.fail {
            return Err(BackendError::Failed {
                status: "exit status: 2".to_string(),
            });
        }
        Ok(())
    }

    async fn start(&self, config: &BundlerConfig) -> backend::Result<()> {
        self.starts.lock().unwrap().push(config.clone());
        Ok(())
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "content/index.md", "---\ntitle: \"A\"\n---\nhello");
    write(dir.path(), "content/blog/first-post.md", "First");
    write(dir.path(), "content/about.emu", "About");
    write(dir.path(), "images/logo.png", "png");

    let mut config = Config::default();
    config.content.root = dir.path().to_path_buf();
    (dir, config)
}

fn write_files(routes: &[&str], watch: bool) -> CompilerMessage {
    CompilerMessage::WriteFiles(GenerationResult {
        raw_content: "module RawContent exposing (content)".to_string(),
        image_assets: "module.exports = {}".to_string(),
        routes: routes.iter().map(|r| r.to_string()).collect(),
        watch,
        debug: true,
    })
}

fn driver(
    config: Config,
    reply: CompilerMessage,
    backend: FakeBackend,
) -> Driver<FakeCompiler, FakeBackend> {
    Driver::new(
        config,
        FakeCompiler::new(reply),
        backend,
        vec!["pagewright".to_string(), "build".to_string()],
    )
}

fn prerender_routes(config: &BundlerConfig) -> Vec<String> {
    config
        .plugins
        .iter()
        .find_map(|p| match p {
            Plugin::Prerender { routes, .. } => Some(routes.clone()),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn test_failure_message_exits_without_writing() {
    let (dir, config) = project();
    let driver = driver(
        config,
        CompilerMessage::PrintAndExitFailure {
            message: "missing index page".to_string(),
        },
        FakeBackend::default(),
    );

    let outcome = driver.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Exit(ExitRequest {
            code: 1,
            message: "missing index page".to_string(),
        })
    );
    assert!(!dir.path().join("gen").exists());
    assert!(!dir.path().join("src/js/image-assets.js").exists());
    assert!(driver.backend().builds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_success_message_exits_zero() {
    let (_dir, config) = project();
    let driver = driver(
        config,
        CompilerMessage::PrintAndExitSuccess {
            message: "0.3.0".to_string(),
        },
        FakeBackend::default(),
    );

    let outcome = driver.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Exit(ExitRequest::success("0.3.0")));
}

#[tokio::test]
async fn test_compiler_receives_bundle_and_argv() {
    let (_dir, config) = project();
    let driver = driver(
        config,
        CompilerMessage::PrintAndExitSuccess {
            message: String::new(),
        },
        FakeBackend::default(),
    );

    driver.run_cycle().await.unwrap();

    let seen = driver_flags(&driver);
    assert_eq!(seen.argv, vec!["pagewright", "build"]);
    assert_eq!(seen.version_message, env!("CARGO_PKG_VERSION"));
    assert_eq!(seen.content.len(), 1);
    assert_eq!(seen.images, vec!["images/logo.png"]);

    let index = seen
        .markdown_content
        .iter()
        .find(|d| d.path == "content/index.md")
        .unwrap();
    assert!(index.metadata.contains(r#""title":"A""#));
    assert_eq!(index.body, "hello");
}

fn driver_flags(driver: &Driver<FakeCompiler, FakeBackend>) -> CompilerFlags {
    driver.compiler().seen.lock().unwrap()[0].clone()
}

#[tokio::test]
async fn test_write_files_then_production_build() {
    let (dir, config) = project();
    let driver = driver(config, write_files(&["/", "/about"], false), FakeBackend::default());

    let outcome = driver.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Built);

    let raw = fs::read_to_string(dir.path().join("gen/RawContent.elm")).unwrap();
    assert_eq!(raw, "module RawContent exposing (content)");
    let assets = fs::read_to_string(dir.path().join("src/js/image-assets.js")).unwrap();
    assert_eq!(assets, "module.exports = {}");

    let ui = fs::read_to_string(dir.path().join("gen/PagesNew.elm")).unwrap();
    assert!(ui.starts_with(UI_PREAMBLE));
    assert!(ui.contains("blogFirstPost = (PageRoute [ \"blog\", \"first-post\" ])"));
    assert!(ui.contains("logoPng = \"/images/logo.png\""));

    assert!(dir.path().join("gen/manifest.json").exists());

    let builds = driver.backend().builds.lock().unwrap();
    assert_eq!(builds.len(), 1);
    assert!(builds[0].is_production());
    assert!(builds[0].elm_loader.optimize);
    assert_eq!(prerender_routes(&builds[0]), vec!["/", "/about"]);
    assert!(driver.backend().starts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_compiler_routes_fall_back_to_content_routes() {
    let (_dir, config) = project();
    let driver = driver(config, write_files(&[], false), FakeBackend::default());

    driver.run_cycle().await.unwrap();

    let builds = driver.backend().builds.lock().unwrap();
    assert_eq!(
        prerender_routes(&builds[0]),
        vec!["/", "/about", "/blog/first-post"]
    );
}

#[tokio::test]
async fn test_watch_result_starts_development_backend() {
    let (_dir, config) = project();
    let driver = driver(config, write_files(&["/"], true), FakeBackend::default());

    let outcome = driver.run_cycle().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Watching);

    let starts = driver.backend().starts.lock().unwrap();
    assert_eq!(starts.len(), 1);
    assert!(!starts[0].is_production());
    assert!(starts[0].elm_loader.debug);
    assert!(starts[0].elm_loader.hot_reload);
    assert!(driver.backend().builds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_backend_failure_is_an_error() {
    let (_dir, config) = project();
    let backend = FakeBackend {
        fail: true,
        ..Default::default()
    };
    let driver = driver(config, write_files(&["/"], false), backend);

    let err = driver.run_cycle().await.unwrap_err();
    assert!(matches!(err, DriverError::Backend(BackendError::Failed { .. })));
}

#[tokio::test]
async fn test_bad_front_matter_aborts_before_compiling() {
    let (dir, config) = project();
    write(dir.path(), "content/broken.md", "---\ntitle: [oops\n---\n");
    let driver = driver(config, write_files(&["/"], false), FakeBackend::default());

    let err = driver.run_cycle().await.unwrap_err();
    assert!(matches!(err, DriverError::Collect(_)));
    assert_eq!(driver.compiler().calls(), 0);
}

#[tokio::test]
async fn test_rapid_writes_trigger_one_rebuild() {
    let (dir, config) = project();
    let debounce = Duration::from_millis(300);
    let driver = Arc::new(driver(
        config.clone(),
        write_files(&["/"], true),
        FakeBackend::default(),
    ));

    let (mut watcher, events) = ContentWatcher::channel(&config);
    assert!(watcher.ensure_started().unwrap());

    let cycle_driver = driver.clone();
    let cycle = move || {
        let driver = cycle_driver.clone();
        async move { driver.run_cycle().await }
    };
    let handle = tokio::spawn(watch_loop(cycle, events, Debouncer::new(debounce)));

    write(dir.path(), "content/index.md", "---\ntitle: \"B\"\n---\nfirst");
    tokio::time::sleep(Duration::from_millis(50)).await;
    write(dir.path(), "content/index.md", "---\ntitle: \"C\"\n---\nsecond");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(driver.compiler().calls(), 1);
    let seen = driver_flags(&driver);
    let index = seen
        .markdown_content
        .iter()
        .find(|d| d.path == "content/index.md")
        .unwrap();
    assert_eq!(index.body, "second");

    handle.abort();
}
