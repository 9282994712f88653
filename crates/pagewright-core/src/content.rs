//! Content types crossing the compiler boundary.
//!
//! Everything here lives for a single build cycle: it is read from disk,
//! shipped to the compiler as JSON, and dropped.

use serde::{Deserialize, Serialize};

/// A matched content file and its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// Path relative to the project root, `/`-separated.
    pub path: String,

    /// Decoded file contents.
    pub contents: String,
}

/// A markdown file split into metadata and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownDocument {
    /// Path relative to the project root, `/`-separated.
    pub path: String,

    /// Front matter serialized as JSON text (`{}` when absent).
    pub metadata: String,

    /// Everything after the front matter block.
    pub body: String,
}

/// All inputs of one build cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBundle {
    pub raw_files: Vec<ContentFile>,
    pub markdown_documents: Vec<MarkdownDocument>,
    pub image_paths: Vec<String>,
}

impl ContentBundle {
    /// Total number of entries across the three collections.
    pub fn len(&self) -> usize {
        self.raw_files.len() + self.markdown_documents.len() + self.image_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input handed to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerFlags {
    /// Invocation arguments, forwarded raw.
    pub argv: Vec<String>,

    /// Version string of this tool.
    pub version_message: String,

    pub content: Vec<ContentFile>,
    pub markdown_content: Vec<MarkdownDocument>,
    pub images: Vec<String>,
}

impl CompilerFlags {
    /// Assemble the flags for one cycle, consuming the bundle.
    pub fn new(argv: Vec<String>, version_message: impl Into<String>, bundle: ContentBundle) -> Self {
        Self {
            argv,
            version_message: version_message.into(),
            content: bundle.raw_files,
            markdown_content: bundle.markdown_documents,
            images: bundle.image_paths,
        }
    }
}

/// Generated artifacts returned by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// Generated content module source.
    pub raw_content: String,

    /// Generated image asset mapping script.
    pub image_assets: String,

    /// Routes to prerender.
    #[serde(default)]
    pub routes: Vec<String>,

    /// Keep running and rebuild on content changes.
    #[serde(default)]
    pub watch: bool,

    /// Enable the compiler's debug overlay in development builds.
    #[serde(default)]
    pub debug: bool,
}

/// The single answer the compiler gives for a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompilerMessage {
    /// Print the message and exit with status 0.
    PrintAndExitSuccess { message: String },
    /// Print the message and exit with status 1.
    PrintAndExitFailure { message: String },
    /// Write the generated files and continue with the bundler.
    WriteFiles(GenerationResult),
}
