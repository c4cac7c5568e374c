//! Non-fatal diagnostics
//!
//! Segmentation and the editorial overlay never abort on a bad document.
//! Anything worth auditing is recorded here, logged at `warn`, and handed
//! back next to the tree.

use crate::segmenter::State;
use serde::Serialize;
use thiserror::Error;

/// An anomaly recorded while building or patching the tree
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A grouping element appeared where only content was expected
    #[error("Unexpected grouping element at block {index}: \"{excerpt}...\"")]
    MalformedBlock {
        /// Position of the block in the source sequence
        index: usize,
        /// Start of the block's text
        excerpt: String,
    },

    /// A page break left the machine outside the answers while the text reads as an answer key
    #[error(
        "Frame-shift detected at block {index}: \"{previous_excerpt} ... {current_excerpt}\". Recovering from {from} to answer section."
    )]
    FrameShift {
        /// Position of the block in the source sequence
        index: usize,
        /// State being abandoned
        from: State,
        /// Start of the previous block's text
        previous_excerpt: String,
        /// End of the current block's text
        current_excerpt: String,
    },

    /// A question closed with an empty stem
    #[error("Question with empty stem at block {index}: {disposition}")]
    EmptyQuestion {
        /// Position of the block that triggered the seal
        index: usize,
        /// What happened to the question's answer content
        disposition: EmptyQuestionDisposition,
    },

    /// A question was sealed with a stem but no answer key or tutorial
    #[error("Question sealed without an answer at block {index}")]
    MissingAnswer {
        /// Position of the block that triggered the seal
        index: usize,
    },

    /// An edit addressed a section or question that does not exist
    #[error("Edit {field},{section},{question} is out of bounds; skipped")]
    BoundsViolation {
        /// Field letter from the edit key
        field: char,
        /// Section index from the edit key
        section: usize,
        /// Question index from the edit key
        question: usize,
    },

    /// An edit key could not be parsed
    #[error("Malformed edit key \"{key}\"; skipped")]
    MalformedEditKey {
        /// The key as written in the edit sheet
        key: String,
    },
}

impl Diagnostic {
    /// Short name of the diagnostic kind, as serialized
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::MalformedBlock { .. } => "malformed_block",
            Diagnostic::FrameShift { .. } => "frame_shift",
            Diagnostic::EmptyQuestion { .. } => "empty_question",
            Diagnostic::MissingAnswer { .. } => "missing_answer",
            Diagnostic::BoundsViolation { .. } => "bounds_violation",
            Diagnostic::MalformedEditKey { .. } => "malformed_edit_key",
        }
    }
}

/// Fate of the answer content of a question sealed with an empty stem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyQuestionDisposition {
    /// Appended to the previous question's answer
    MergedIntoPrevious,
    /// No previous question in the section; content dropped
    Dropped,
}

impl std::fmt::Display for EmptyQuestionDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MergedIntoPrevious => write!(f, "answer merged into previous question"),
            Self::Dropped => write!(f, "no previous question, content dropped"),
        }
    }
}

/// Collects diagnostics and mirrors each one to the log
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn record(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    /// Number of recorded diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take the recorded diagnostics
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
