//! Block classifier
//!
//! Maps a [`Block`] to a [`RoleSignal`]: structural checks first, then the
//! ordered text heuristics. Pure and stateless; classifying the same block
//! twice always yields the same signal.

use crate::block::{Block, ListStyle};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// A leading letter or number, a period, then a run of non-breaking spaces
static CHOICE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Z]|[0-9]+)\s*\.\x{a0}+").unwrap());

/// Opening phrase of an answer key
static ANSWER_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:Answers\s*\.?",
        r"|Answers?\s*:",
        r"|The correct answer is",
        r"|Answer\s+[A-Z]\s+is",
        r"|Answers?\s+[A-Z]\s+and\s+[A-Z]\s)",
    ))
    .unwrap()
});

/// Letter-to-number correspondence line ("A. 3. Pericarditis")
static LETTER_TO_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]\.\s+[0-9]+\.\s+").unwrap());

/// Number-to-letter correspondence line ("2. B")
static NUMBER_TO_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.\s+[A-Z]").unwrap());

/// "Note:" or "*Note:" trailing an answer key
static NOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\*?Note\s*:").unwrap());

/// What a block represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Section heading (or a fragment of one)
    Section,
    /// Question stem
    Question,
    /// Answer choice
    Choices,
    /// Explanatory tutorial text
    Tutorial,
    /// Answer key
    Answers,
    /// Note trailing an answer key; continues the answers
    Note,
    /// Nothing matched; belongs to whatever is open
    Continuation,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Section => "section",
            Role::Question => "question",
            Role::Choices => "choices",
            Role::Tutorial => "tutorial",
            Role::Answers => "answers",
            Role::Note => "note",
            Role::Continuation => "continuation",
        };
        f.pad(name)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "section" => Ok(Role::Section),
            "question" => Ok(Role::Question),
            "choices" | "choice" => Ok(Role::Choices),
            "tutorial" => Ok(Role::Tutorial),
            "answers" | "answer" => Ok(Role::Answers),
            "note" => Ok(Role::Note),
            "continuation" => Ok(Role::Continuation),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Which rule produced a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Evidence {
    /// Explicit annotation from the adapter
    Annotation,
    /// Heading, list or table layout
    Structure,
    /// Text pattern
    Pattern,
    /// No rule matched
    None,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Evidence::Annotation => "annotation",
            Evidence::Structure => "structure",
            Evidence::Pattern => "pattern",
            Evidence::None => "none",
        };
        f.pad(name)
    }
}

/// Which answer-key pattern a block's text matches, whatever its role
///
/// `\s` covers U+00A0, so "A.\u{a0}1.\u{a0}Allopurinol" reads as a
/// letter-to-number line even though its primary role is a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerText {
    /// No answer-key pattern
    None,
    /// An opening phrase such as "Answers" or "The correct answer is"
    Key,
    /// "A. 3. ..." matching line
    LetterToNumber,
    /// "2. B" matching line; also how a numbered stem sentence starts
    NumberToLetter,
}

impl AnswerText {
    /// Match the answer-key patterns against normalized text
    pub fn of(text: &str) -> Self {
        if ANSWER_KEY_RE.is_match(text) {
            AnswerText::Key
        } else if LETTER_TO_NUMBER_RE.is_match(text) {
            AnswerText::LetterToNumber
        } else if NUMBER_TO_LETTER_RE.is_match(text) {
            AnswerText::NumberToLetter
        } else {
            AnswerText::None
        }
    }
}

/// Classifier output for one block
///
/// The page break travels alongside the role rather than replacing it: the
/// state machine asks "is this a page boundary" and "what content is this"
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleSignal {
    /// Primary role of the block
    pub role: Role,
    /// The block starts a new page
    pub page_break: bool,
    /// Rule that produced `role`
    pub evidence: Evidence,
    /// Answer-key pattern hit on the text, independent of `role`
    pub answer_text: AnswerText,
}

impl RoleSignal {
    fn new(role: Role, evidence: Evidence, page_break: bool, answer_text: AnswerText) -> Self {
        Self {
            role,
            page_break,
            evidence,
            answer_text,
        }
    }

    /// Whether the block opens or continues an answer key
    pub fn is_answer_like(&self) -> bool {
        self.role == Role::Answers
    }

    /// Whether the text matches any answer-key pattern
    pub fn has_answer_text(&self) -> bool {
        self.answer_text != AnswerText::None
    }

    /// Whether the block can open an answer key straight from a stem or a choice list
    ///
    /// Annotations and layout decide on their own. For text, an opening
    /// phrase or a letter-to-number line qualifies; a number-to-letter hit
    /// alone does not, since numbered sentences inside a stem look the same.
    pub fn opens_answers(&self) -> bool {
        match self.evidence {
            Evidence::Annotation | Evidence::Structure => self.role == Role::Answers,
            Evidence::Pattern | Evidence::None => matches!(
                self.answer_text,
                AnswerText::Key | AnswerText::LetterToNumber
            ),
        }
    }

    /// Whether the block keeps an open answer key going
    pub fn continues_answers(&self) -> bool {
        matches!(self.role, Role::Answers | Role::Note)
            || (self.evidence != Evidence::Annotation && self.has_answer_text())
    }

    /// Whether the role came from layout or annotation rather than text
    pub fn is_structural(&self) -> bool {
        matches!(self.evidence, Evidence::Annotation | Evidence::Structure)
    }
}

/// Classify one block; first matching rule wins
pub fn classify(block: &Block) -> RoleSignal {
    let page_break = block.has_page_break;
    let answer_text = AnswerText::of(&block.text);

    if let Some(role) = block.explicit_role {
        return RoleSignal::new(role, Evidence::Annotation, page_break, answer_text);
    }

    if block.is_heading_style {
        return RoleSignal::new(Role::Section, Evidence::Structure, page_break, answer_text);
    }

    if block.list_style == ListStyle::Lettered || block.is_table_cell_grid {
        return RoleSignal::new(Role::Choices, Evidence::Structure, page_break, answer_text);
    }

    if block.list_style == ListStyle::Numbered {
        return RoleSignal::new(Role::Answers, Evidence::Structure, page_break, answer_text);
    }

    let role = classify_text(&block.text);
    let evidence = if role == Role::Continuation {
        Evidence::None
    } else {
        Evidence::Pattern
    };
    RoleSignal::new(role, evidence, page_break, answer_text)
}

/// Apply the ordered text heuristics to normalized text
pub fn classify_text(text: &str) -> Role {
    if CHOICE_START_RE.is_match(text) {
        Role::Choices
    } else if is_answer_text(text) {
        Role::Answers
    } else if NOTE_RE.is_match(text) {
        Role::Note
    } else {
        Role::Continuation
    }
}

/// Whether text independently matches the answer-section pattern family
pub fn is_answer_text(text: &str) -> bool {
    AnswerText::of(text) != AnswerText::None
}

/// Classify a whole block sequence the way the segmenter sees it
///
/// Blank blocks are skipped. A page break on a blank block moves to the next
/// non-blank block. Each signal is paired with its block's position.
pub fn classify_sequence(blocks: &[Block]) -> Vec<(usize, RoleSignal)> {
    let mut pending_page_break = false;
    let mut signals = Vec::with_capacity(blocks.len());

    for (index, block) in blocks.iter().enumerate() {
        if block.is_blank() {
            pending_page_break |= block.has_page_break;
            continue;
        }
        let mut signal = classify(block);
        signal.page_break |= std::mem::take(&mut pending_page_break);
        signals.push((index, signal));
    }

    signals
}
