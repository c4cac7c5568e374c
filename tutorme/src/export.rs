//! Serialization of the section tree
//!
//! Two shapes of the same JSON document:
//! - plain pretty-printed JSON
//! - a JavaScript assignment, `data = [...];`, loaded by the tutorial viewer
//!   with a plain `<script>` tag

use crate::document::Section;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Variable the JavaScript output assigns to
const JS_VARIABLE: &str = "data";

/// Output format of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON array
    #[default]
    Json,
    /// `data = [...];`
    Js,
}

impl OutputFormat {
    /// Guess the format from an output file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(OutputFormat::Json),
            "js" => Some(OutputFormat::Js),
            _ => None,
        }
    }
}

/// Errors that can occur during export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error("Not a `data = [...]` assignment")]
    NotAnAssignment,
}

/// Render the tree in the given format
pub fn to_string(sections: &[Section], format: OutputFormat) -> Result<String, ExportError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(sections)?),
        OutputFormat::Js => Ok(format!(
            "{} = {};\n",
            JS_VARIABLE,
            serde_json::to_string(sections)?
        )),
    }
}

/// Write the tree to any writer
pub fn write_to<W: Write>(
    sections: &[Section],
    format: OutputFormat,
    mut writer: W,
) -> Result<(), ExportError> {
    let rendered = to_string(sections, format)?;
    writer.write_all(rendered.as_bytes())?;
    if format == OutputFormat::Json {
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Export the tree to a file
///
/// # Parameters
/// * `sections` - The section tree to export
/// * `format` - Output format
/// * `output_path` - Path where the file will be written
pub fn to_file(
    sections: &[Section],
    format: OutputFormat,
    output_path: &Path,
) -> Result<(), ExportError> {
    let file = fs::File::create(output_path)?;
    write_to(sections, format, std::io::BufWriter::new(file))
}

/// Read a tree back from either output format
pub fn from_str(content: &str) -> Result<Vec<Section>, ExportError> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let body = trimmed
        .strip_prefix(JS_VARIABLE)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(ExportError::NotAnAssignment)?;
    let body = body.trim().trim_end_matches(';');
    Ok(serde_json::from_str(body)?)
}
