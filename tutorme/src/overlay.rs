//! Editorial overlay
//!
//! Editors fix individual fields after parsing through an edit sheet with
//! three columns: timestamp, an ID such as `q,0,1` (field, section index,
//! question index) and the replacement markup. Later rows win. Rows that
//! address a question that does not exist, or whose ID cannot be read, are
//! skipped with a diagnostic.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::document::Section;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Marker showing that the content column was URL-encoded by the form
const ENCODED_PARAGRAPH: &str = "%3Cp";

/// Field an edit replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    /// The question stem (`q`)
    Question,
    /// The answer (`a`)
    Answer,
}

impl EditField {
    /// Letter used for the field in edit IDs
    pub fn letter(self) -> char {
        match self {
            EditField::Question => 'q',
            EditField::Answer => 'a',
        }
    }
}

/// Parsed edit ID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditKey {
    /// Field to replace
    pub field: EditField,
    /// Section index
    pub section: usize,
    /// Question index within the section
    pub question: usize,
}

impl EditKey {
    /// Parse an ID of the form `q,0,1` or `a,2,5`
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split(',').map(str::trim);
        let field = match parts.next()? {
            "q" => EditField::Question,
            "a" => EditField::Answer,
            _ => return None,
        };
        let section = parts.next()?.parse().ok()?;
        let question = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            field,
            section,
            question,
        })
    }
}

/// One row of the edit sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// ID as written in the sheet
    pub key: String,
    /// Replacement markup
    pub content: String,
}

impl Edit {
    /// Create an edit from an ID and replacement markup
    pub fn new(key: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: content.into(),
        }
    }
}

/// Errors reading an edit sheet
#[derive(Error, Debug)]
pub enum EditSheetError {
    #[error("IO error reading edit sheet {path}: {source}", path = .0.display(), source = .1)]
    IoError(std::path::PathBuf, #[source] std::io::Error),

    #[error("Malformed edit sheet: {0}")]
    CsvError(#[from] csv::Error),
}

/// Rows of an edit sheet exported as CSV
#[derive(Debug, Clone, Default)]
pub struct EditSheet {
    /// Usable rows in sheet order
    pub edits: Vec<Edit>,
}

impl EditSheet {
    /// Load an edit sheet from a CSV file
    pub fn from_path(path: &Path) -> Result<Self, EditSheetError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EditSheetError::IoError(path.to_path_buf(), e))?;
        Self::from_reader(file)
    }

    /// Read an edit sheet; the first row is a header and is skipped
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, EditSheetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut edits = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.len() < 3 {
                continue;
            }
            let key = record.get(1).unwrap_or_default().trim();
            if key.is_empty() {
                continue;
            }
            let content = decode_content(record.get(2).unwrap_or_default());
            edits.push(Edit::new(key, content));
        }

        log::info!("Read {} edits from edit sheet", edits.len());
        Ok(Self { edits })
    }
}

/// Undo the form's URL encoding when the content carries encoded markup
fn decode_content(content: &str) -> String {
    if content.contains(ENCODED_PARAGRAPH) {
        percent_encoding::percent_decode_str(content)
            .decode_utf8_lossy()
            .into_owned()
    } else {
        content.to_string()
    }
}

/// Replace addressed fields in the tree; returns one diagnostic per skipped edit
pub fn apply_edits(sections: &mut [Section], edits: &[Edit]) -> Vec<Diagnostic> {
    let mut sink = DiagnosticSink::new();
    let mut applied = 0;

    for edit in edits {
        let Some(key) = EditKey::parse(&edit.key) else {
            sink.record(Diagnostic::MalformedEditKey {
                key: edit.key.clone(),
            });
            continue;
        };

        let Some(question) = sections
            .get_mut(key.section)
            .and_then(|section| section.questions.get_mut(key.question))
        else {
            sink.record(Diagnostic::BoundsViolation {
                field: key.field.letter(),
                section: key.section,
                question: key.question,
            });
            continue;
        };

        match key.field {
            EditField::Question => question.question = edit.content.clone(),
            EditField::Answer => question.answer = edit.content.clone(),
        }
        applied += 1;
    }

    log::info!("Applied {} of {} edits", applied, edits.len());
    sink.into_vec()
}
