//! Three-stage processing pipeline
//!
//! This module orchestrates the stages of turning an exported document into
//! the section tree:
//! 1. **Parsing**: Load the source document into blocks
//! 2. **Segmentation**: Run the state machine over the blocks
//! 3. **Overlay**: Apply the editors' corrections, if any
//!
//! Export is left to the caller so the tree can be inspected first.

use crate::config::{ConfigError, TutorMeConfig};
use crate::diagnostics::Diagnostic;
use crate::overlay::{apply_edits, EditSheet, EditSheetError};
use crate::segmenter::{segment, Segmentation};
use crate::source::{self, InputFormat, SourceError};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What to parse and how
#[derive(Debug, Clone)]
pub struct ParseRequest {
    /// Source document
    pub input: PathBuf,
    /// Explicit input format; guessed from the extension when absent
    pub format: Option<InputFormat>,
    /// Edit sheet to overlay after segmentation
    pub edits: Option<PathBuf>,
    /// Adapter and segmenter configuration
    pub config: TutorMeConfig,
}

/// Run parsing, segmentation and the overlay
///
/// # Parameters
/// * `request` - Input document, format, edit sheet and configuration
///
/// # Returns
/// * `Ok(Segmentation)` - The tree with every diagnostic from every stage
/// * `Err(PipelineError)` - The document or edit sheet could not be read
pub fn run(request: &ParseRequest) -> Result<Segmentation, PipelineError> {
    let blocks = source::load(&request.input, request.format, &request.config.source)?;

    let mut segmentation = segment(&blocks, &request.config.segmenter);

    if let Some(edits_path) = &request.edits {
        apply_edit_sheet(&mut segmentation, edits_path)?;
    }

    if !segmentation.diagnostics.is_empty() {
        log::info!(
            "Diagnostics: {}",
            summarize_diagnostics(&segmentation.diagnostics)
        );
    }

    Ok(segmentation)
}

/// Stage 3: overlay an edit sheet onto a segmented tree
///
/// Skipped edits are appended to the segmentation's diagnostics.
pub fn apply_edit_sheet(
    segmentation: &mut Segmentation,
    edits_path: &Path,
) -> Result<(), PipelineError> {
    log::info!("Reading edits from {}", edits_path.display());
    let sheet = EditSheet::from_path(edits_path)?;

    let skipped = apply_edits(&mut segmentation.sections, &sheet.edits);
    segmentation.diagnostics.extend(skipped);
    Ok(())
}

/// Load the configuration for an input document
pub fn load_config(
    explicit: Option<&Path>,
    input: &Path,
) -> Result<TutorMeConfig, PipelineError> {
    TutorMeConfig::discover(explicit, input).map_err(|e| {
        let path = explicit.map(Path::to_path_buf).unwrap_or_else(|| input.to_path_buf());
        PipelineError::ConfigError(path, Box::new(e))
    })
}

/// Count diagnostics per kind, e.g. `frame_shift: 2, malformed_block: 1`
pub fn summarize_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .counts_by(Diagnostic::kind)
        .into_iter()
        .sorted()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .join(", ")
}

/// Pipeline errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    SourceError(#[from] SourceError),

    #[error("Config error loading {path}: {source}", path = .0.display(), source = .1)]
    ConfigError(PathBuf, #[source] Box<ConfigError>),

    #[error(transparent)]
    EditSheetError(#[from] EditSheetError),
}
