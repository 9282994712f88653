//! pagewright core library
//!
//! Core types, configuration, front matter splitting and error handling for
//! the pagewright build glue.

pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;

pub use config::Config;
pub use content::{
    CompilerFlags, CompilerMessage, ContentBundle, ContentFile, GenerationResult, MarkdownDocument,
};
pub use error::{CoreError, Result};
pub use frontmatter::{FrontmatterFormat, Metadata};
