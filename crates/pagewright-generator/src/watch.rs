//! Content watching and rebuild scheduling.
//!
//! A [`ContentWatcher`] forwards matching file events into a channel, a
//! [`Debouncer`] holds each path until it has been quiet for the window, and
//! [`watch_loop`] runs one full cycle per ready batch. Cycles run inline, so
//! a rebuild never overlaps the previous one; events arriving meanwhile wait
//! in the channel.

use std::{
    collections::HashMap,
    fs,
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use glob::Pattern;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use pagewright_core::Config;
use thiserror::Error;
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    driver::{CycleOutcome, ExitRequest},
    enumerate::{glob_base, match_options},
};

/// Capacity of the event channel between the watcher thread and the loop.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Watcher errors.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create file watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("invalid watch pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("failed to resolve watch root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Whether the process is watching content.
#[derive(Default)]
pub enum WatchState {
    #[default]
    Idle,
    Watching(RecommendedWatcher),
}

impl std::fmt::Debug for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Watching(_) => f.write_str("Watching"),
        }
    }
}

/// Owns the file watcher and starts it at most once.
#[derive(Debug)]
pub struct ContentWatcher {
    root: PathBuf,
    patterns: Vec<String>,
    tx: mpsc::Sender<PathBuf>,
    state: WatchState,
}

impl ContentWatcher {
    /// Watcher for the raw and markdown globs of `config`.
    pub fn new(config: &Config, tx: mpsc::Sender<PathBuf>) -> Self {
        Self {
            root: config.content.root.clone(),
            patterns: config
                .watched_globs()
                .iter()
                .map(|p| p.to_string())
                .collect(),
            tx,
            state: WatchState::Idle,
        }
    }

    /// Watcher plus the receiving end of its event channel.
    pub fn channel(config: &Config) -> (Self, mpsc::Receiver<PathBuf>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self::new(config, tx), rx)
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching(_))
    }

    /// Start watching unless already started. Returns whether this call
    /// started it.
    pub fn ensure_started(&mut self) -> Result<bool> {
        if self.is_watching() {
            return Ok(false);
        }

        let root = fs::canonicalize(&self.root).map_err(|source| WatchError::Root {
            path: self.root.clone(),
            source,
        })?;

        let patterns = self
            .patterns
            .iter()
            .map(|p| {
                Pattern::new(p.trim_start_matches("./")).map_err(|source| WatchError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tx = self.tx.clone();
        let filter_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    for path in event.paths {
                        if is_watched(&filter_root, &patterns, &path) {
                            trace!(path = %path.display(), kind = ?event.kind, "content event");
                            let _ = tx.blocking_send(path);
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watch error"),
            },
            notify::Config::default(),
        )?;

        for dir in watch_dirs(&root, &self.patterns) {
            let mode = if dir.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&dir.path, mode)?;
            debug!(dir = %dir.path.display(), recursive = dir.recursive, "watching directory");
        }

        self.state = WatchState::Watching(watcher);
        println!("Watching...");
        Ok(true)
    }
}

/// A directory to register and whether to watch below it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WatchDir {
    path: PathBuf,
    recursive: bool,
}

/// Directories to register: each glob's base, recursively. A base that does
/// not exist yet is replaced by the root alone, without recursion, so build
/// output and dependency trees under the root are never walked.
fn watch_dirs(root: &Path, patterns: &[String]) -> Vec<WatchDir> {
    let mut dirs: Vec<WatchDir> = Vec::new();
    for pattern in patterns {
        let base = root.join(glob_base(pattern));
        let dir = if base.is_dir() {
            WatchDir {
                path: base,
                recursive: true,
            }
        } else {
            warn!(
                pattern = %pattern,
                base = %base.display(),
                "watch base directory missing, watching the root only; restart once it exists"
            );
            WatchDir {
                path: root.to_path_buf(),
                recursive: false,
            }
        };

        match dirs.iter_mut().find(|d| d.path == dir.path) {
            Some(existing) => existing.recursive |= dir.recursive,
            None => dirs.push(dir),
        }
    }

    // a recursive root already covers everything below it
    if dirs.iter().any(|d| d.path == root && d.recursive) {
        dirs.retain(|d| d.path == root);
    }
    dirs
}

fn is_watched(root: &Path, patterns: &[Pattern], path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    patterns
        .iter()
        .any(|p| p.matches_path_with(relative, match_options()))
}

/// Per-path quiescence timers.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Record an event, restarting the path's timer.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return the paths quiet for at least the window, sorted.
    pub fn take_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    /// Earliest instant at which some path becomes ready.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|last| *last + self.window)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Run `cycle` once per batch of settled paths until the compiler asks to
/// exit or the event channel closes.
///
/// Failed cycles are logged and the loop keeps watching.
pub async fn watch_loop<F, Fut, E>(
    mut cycle: F,
    mut events: mpsc::Receiver<PathBuf>,
    mut debouncer: Debouncer,
) -> Option<ExitRequest>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<CycleOutcome, E>>,
    E: std::fmt::Display,
{
    let mut closed = false;

    loop {
        let deadline = debouncer.next_deadline();
        if closed && deadline.is_none() {
            debug!("event channel closed, leaving watch loop");
            return None;
        }

        tokio::select! {
            event = events.recv(), if !closed => match event {
                Some(path) => debouncer.record(path, Instant::now()),
                None => closed = true,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
        }

        let ready = debouncer.take_ready(Instant::now());
        if ready.is_empty() {
            continue;
        }

        for path in &ready {
            println!("Rerunning for {}...", path.display());
        }
        info!(paths = ready.len(), "rebuilding");

        match cycle().await {
            Ok(CycleOutcome::Exit(request)) => return Some(request),
            Ok(_) => println!("Done!"),
            Err(e) => error!(error = %e, "rebuild failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use tempfile::TempDir;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn test_two_rapid_writes_yield_one_entry() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        let path = PathBuf::from("content/index.md");

        debouncer.record(path.clone(), start);
        debouncer.record(path.clone(), start + Duration::from_millis(100));

        // quiet for only 450ms since the second write
        assert!(debouncer.take_ready(start + Duration::from_millis(550)).is_empty());
        assert_eq!(
            debouncer.next_deadline(),
            Some(start + Duration::from_millis(600))
        );

        assert_eq!(
            debouncer.take_ready(start + Duration::from_millis(600)),
            vec![path]
        );
        assert!(debouncer.is_empty());
        assert!(debouncer.take_ready(start + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_paths_settle_independently() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.record(PathBuf::from("content/a.md"), start);
        debouncer.record(PathBuf::from("content/b.md"), start + Duration::from_millis(300));

        assert_eq!(
            debouncer.take_ready(start + Duration::from_millis(500)),
            vec![PathBuf::from("content/a.md")]
        );
        assert_eq!(
            debouncer.take_ready(start + Duration::from_millis(800)),
            vec![PathBuf::from("content/b.md")]
        );
    }

    #[test]
    fn test_is_watched() {
        let root = Path::new("/site");
        let patterns = vec![
            Pattern::new("content/**/*.md").unwrap(),
            Pattern::new("content/**/*.emu").unwrap(),
        ];

        assert!(is_watched(root, &patterns, Path::new("/site/content/a.md")));
        assert!(is_watched(root, &patterns, Path::new("/site/content/blog/b.emu")));
        assert!(!is_watched(root, &patterns, Path::new("/site/content/notes.txt")));
        assert!(!is_watched(root, &patterns, Path::new("/site/content/.a.md.swp")));
        assert!(!is_watched(root, &patterns, Path::new("/elsewhere/content/a.md")));
    }

    #[test]
    fn test_watch_dirs() {
        let dir = TempDir::new().unwrap();
        let patterns = vec!["content/**/*.emu".to_string(), "content/**/*.md".to_string()];

        // missing base: the root alone, never its subtrees
        assert_eq!(
            watch_dirs(dir.path(), &patterns),
            vec![WatchDir {
                path: dir.path().to_path_buf(),
                recursive: false,
            }]
        );

        fs::create_dir(dir.path().join("content")).unwrap();
        assert_eq!(
            watch_dirs(dir.path(), &patterns),
            vec![WatchDir {
                path: dir.path().join("content"),
                recursive: true,
            }]
        );
    }

    #[test]
    fn test_watch_dirs_root_glob_is_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let patterns = vec!["content/**/*.emu".to_string(), "**/*.md".to_string()];

        assert_eq!(
            watch_dirs(dir.path(), &patterns),
            vec![WatchDir {
                path: dir.path().to_path_buf(),
                recursive: true,
            }]
        );
    }

    #[test]
    fn test_watch_dirs_missing_base_skips_subtrees() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let patterns = vec!["content/**/*.emu".to_string(), "pages/**/*.md".to_string()];

        let dirs = watch_dirs(dir.path(), &patterns);
        assert_eq!(
            dirs,
            vec![
                WatchDir {
                    path: dir.path().join("content"),
                    recursive: true,
                },
                WatchDir {
                    path: dir.path().to_path_buf(),
                    recursive: false,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_started_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.content.root = dir.path().to_path_buf();

        let (mut watcher, _rx) = ContentWatcher::channel(&config);
        assert!(!watcher.is_watching());
        assert!(watcher.ensure_started().unwrap());
        assert!(watcher.is_watching());
        assert!(!watcher.ensure_started().unwrap());
    }

    #[tokio::test]
    async fn test_watcher_forwards_matching_writes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("content")).unwrap();
        let mut config = Config::default();
        config.content.root = dir.path().to_path_buf();

        let (mut watcher, mut rx) = ContentWatcher::channel(&config);
        watcher.ensure_started().unwrap();

        fs::write(dir.path().join("content/ignored.txt"), "x").unwrap();
        fs::write(dir.path().join("content/index.md"), "# hi").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(path.ends_with("content/index.md"));
    }

    #[tokio::test]
    async fn test_loop_coalesces_rapid_events() {
        let (tx, rx) = mpsc::channel(16);
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let cycle = move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(CycleOutcome::Watching)
            }
        };

        let handle = tokio::spawn(watch_loop(
            cycle,
            rx,
            Debouncer::new(Duration::from_millis(50)),
        ));

        tx.send(PathBuf::from("content/index.md")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(PathBuf::from("content/index.md")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_during_rebuild_waits_for_it() {
        let (tx, rx) = mpsc::channel(16);
        let runs = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));

        let (counter, busy, overlap) = (runs.clone(), in_flight.clone(), overlapped.clone());
        let cycle = move || {
            let (counter, busy, overlap) = (counter.clone(), busy.clone(), overlap.clone());
            async move {
                if busy.swap(true, Ordering::SeqCst) {
                    overlap.store(true, Ordering::SeqCst);
                }
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                busy.store(false, Ordering::SeqCst);
                Ok::<_, String>(CycleOutcome::Watching)
            }
        };

        let handle = tokio::spawn(watch_loop(
            cycle,
            rx,
            Debouncer::new(Duration::from_millis(20)),
        ));

        tx.send(PathBuf::from("content/a.md")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(in_flight.load(Ordering::SeqCst));
        tx.send(PathBuf::from("content/b.md")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(600)).await;
        drop(tx);

        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!overlapped.load(Ordering::SeqCst));
        assert!(!in_flight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_loop_survives_errors_and_stops_on_exit() {
        let (tx, rx) = mpsc::channel(16);
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        let cycle = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("front matter broken".to_string())
                } else {
                    Ok(CycleOutcome::Exit(ExitRequest::failure("stop")))
                }
            }
        };

        let handle = tokio::spawn(watch_loop(
            cycle,
            rx,
            Debouncer::new(Duration::from_millis(20)),
        ));

        tx.send(PathBuf::from("content/a.md")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(PathBuf::from("content/a.md")).await.unwrap();

        let request = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request, Some(ExitRequest::failure("stop")));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
