//! Content aggregation.
//!
//! Runs the three enumerations of a cycle (raw content, markdown, images)
//! and assembles a single [`ContentBundle`]. Any failure aborts the whole
//! collection; there is no partial bundle.

use std::{fs, path::Path};

use pagewright_core::{
    Config, ContentBundle, CoreError, MarkdownDocument, frontmatter::parse_frontmatter,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::enumerate::{self, EnumerateError, relative_display};

/// Content collection errors.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Enumeration or read failure.
    #[error(transparent)]
    Enumerate(#[from] EnumerateError),

    /// Front matter or metadata serialization failure.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Content collector that enumerates and parses one cycle's inputs.
#[derive(Debug, Clone)]
pub struct ContentCollector {
    config: Config,
}

impl ContentCollector {
    /// Create a new content collector.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn root(&self) -> &Path {
        &self.config.content.root
    }

    /// Collect all content into a fresh bundle.
    pub fn collect(&self) -> Result<ContentBundle> {
        let content = &self.config.content;
        info!(root = %self.root().display(), "collecting content");

        let raw_files = enumerate::read_matching(self.root(), &content.raw_glob)?;

        let markdown_documents = enumerate::read_matching(self.root(), &content.markdown_glob)?
            .into_iter()
            .map(|file| {
                let (metadata, body) = parse_frontmatter(&file.contents, Path::new(&file.path))?;
                Ok(MarkdownDocument {
                    path: file.path,
                    metadata: metadata.to_json()?,
                    body,
                })
            })
            .collect::<std::result::Result<Vec<_>, CoreError>>()?;

        let image_paths = self.image_paths()?;

        let bundle = ContentBundle {
            raw_files,
            markdown_documents,
            image_paths,
        };

        info!(
            raw = bundle.raw_files.len(),
            markdown = bundle.markdown_documents.len(),
            images = bundle.image_paths.len(),
            "content collection complete"
        );

        Ok(bundle)
    }

    /// Image paths, excluding directories. Symlinks are not followed.
    fn image_paths(&self) -> Result<Vec<String>> {
        let mut images = Vec::new();

        for path in enumerate::matching_paths(self.root(), &self.config.content.image_glob)? {
            let metadata = fs::symlink_metadata(&path).map_err(|source| EnumerateError::Io {
                path: path.clone(),
                source,
            })?;
            if metadata.is_dir() {
                debug!(path = %path.display(), "skipping image directory");
                continue;
            }
            images.push(relative_display(self.root(), &path));
        }

        Ok(images)
    }
}
