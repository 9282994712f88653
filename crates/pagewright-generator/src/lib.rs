//! pagewright generator library
//!
//! Everything one build cycle does, plus the loop that repeats it.
//!
//! # Modules
//!
//! - [`enumerate`] - Glob matching and file reading
//! - [`collector`] - Content aggregation into a bundle
//! - [`compiler`] - External content compiler boundary
//! - [`routes`] - Generated route and asset records for the UI module
//! - [`prepare`] - Build preparation (web app manifest)
//! - [`backend`] - Bundler pipeline descriptor and invocation
//! - [`driver`] - One cycle: compile, write, hand over to the bundler
//! - [`watch`] - Content watcher, debouncing and the rebuild loop

pub mod backend;
pub mod collector;
pub mod compiler;
pub mod driver;
pub mod enumerate;
pub mod prepare;
pub mod routes;
pub mod watch;

pub use backend::{BuildBackend, BundlerConfig, Plugin, ProcessBackend};
pub use collector::ContentCollector;
pub use compiler::{Compiler, ProcessCompiler};
pub use driver::{CycleOutcome, Driver, ExitRequest};
pub use prepare::ManifestConfig;
pub use routes::StaticRoutes;
pub use watch::{ContentWatcher, Debouncer, WatchState, watch_loop};
