//! Input adapters
//!
//! Every adapter turns one exported document into an ordered list of
//! [`Block`]s. The segmenter never sees the source format.

pub mod blocks;
pub mod markdown;

use crate::block::Block;
use crate::config::SourceOptions;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use markdown::MarkdownAdapter;

/// Source document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Markdown with the page-break and role conventions
    Markdown,
    /// JSON array of pre-built blocks
    Blocks,
}

impl InputFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "md" | "markdown" => Some(InputFormat::Markdown),
            "json" => Some(InputFormat::Blocks),
            _ => None,
        }
    }
}

/// Errors loading a source document
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}", path = .0.display(), source = .1)]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("Cannot tell the input format of {path}; pass --from", path = .0.display())]
    UnknownFormat(PathBuf),

    #[error("Malformed block list in {path}: {source}", path = .0.display(), source = .1)]
    BlockListError(PathBuf, #[source] serde_json::Error),
}

/// Read a source document into blocks
///
/// # Parameters
/// * `path` - Document to read
/// * `format` - Explicit format, or `None` to guess from the extension
/// * `options` - Adapter options
pub fn load(
    path: &Path,
    format: Option<InputFormat>,
    options: &SourceOptions,
) -> Result<Vec<Block>, SourceError> {
    let format = format
        .or_else(|| InputFormat::from_path(path))
        .ok_or_else(|| SourceError::UnknownFormat(path.to_path_buf()))?;

    let content =
        fs::read_to_string(path).map_err(|e| SourceError::IoError(path.to_path_buf(), e))?;

    let blocks = match format {
        InputFormat::Markdown => MarkdownAdapter::parse(&content, options),
        InputFormat::Blocks => blocks::parse(&content)
            .map_err(|e| SourceError::BlockListError(path.to_path_buf(), e))?,
    };

    log::info!("Read {} blocks from {}", blocks.len(), path.display());
    Ok(blocks)
}
