//! Output tree: sections of questions
//!
//! [`TreeAssembler`] is the sink for the segmenter's sealed records. It only
//! appends, so the tree comes out in document order at both levels.

use serde::{Deserialize, Serialize};

/// One testable item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stem markup, followed by the choices when there were any
    pub question: String,

    /// One entry per choice block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    /// Tutorial markup including its synthetic heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutorial: Option<String>,

    /// Answer key markup with the tutorial folded in
    pub answer: String,
}

/// A topical grouping of questions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text, fragments joined with spaces
    #[serde(rename = "section")]
    pub title: String,

    /// Questions in document order
    pub questions: Vec<Question>,
}

impl Section {
    /// Number of questions in this section
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }
}

/// Total number of questions across all sections
pub fn total_questions(sections: &[Section]) -> usize {
    sections.iter().map(Section::question_count).sum()
}

/// Accumulates sealed questions and sections in arrival order
#[derive(Debug, Default)]
pub struct TreeAssembler {
    sections: Vec<Section>,
    open: Option<Section>,
}

impl TreeAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the open section (if any) and open a new one
    pub fn open_section(&mut self) {
        self.close_section();
        self.open = Some(Section::default());
    }

    /// Set the title of the open section
    pub fn set_title(&mut self, title: String) {
        if let Some(section) = self.open.as_mut() {
            section.title = title;
        } else {
            log::debug!("Dropping section title with no open section: {}", title);
        }
    }

    /// Append a sealed question to the open section
    ///
    /// Content that arrives before the first heading gets an untitled section.
    pub fn push_question(&mut self, question: Question) {
        self.open
            .get_or_insert_with(Section::default)
            .questions
            .push(question);
    }

    /// Last sealed question of the open section
    pub fn last_question_mut(&mut self) -> Option<&mut Question> {
        self.open.as_mut()?.questions.last_mut()
    }

    /// Move the open section into the output list
    pub fn close_section(&mut self) {
        if let Some(section) = self.open.take() {
            self.sections.push(section);
        }
    }

    /// Flush the open section and return the tree
    pub fn finish(mut self) -> Vec<Section> {
        self.close_section();
        self.sections
    }
}
