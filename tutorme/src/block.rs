//! Block-level source units
//!
//! A [`Block`] is one normalized structural unit of the exported document
//! (paragraph, list, table, heading). Adapters in [`crate::source`] produce
//! them once per source element; the segmenter consumes them in order and
//! never revisits one.

use crate::classifier::Role;
use serde::{Deserialize, Serialize};

/// List style hint carried by a block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    /// Not a list
    #[default]
    None,
    /// A list marked A, B, C, ... (answer choices)
    Lettered,
    /// A list marked 1, 2, 3, ... (answer keys)
    Numbered,
}

/// One structural unit of the source document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Block {
    /// Normalized text (whitespace collapsed, trimmed, U+00A0 kept)
    pub text: String,

    /// Serialized markup fragment, kept verbatim for output
    pub raw_content: String,

    /// Out-of-band role annotation, present only in annotated sources
    pub explicit_role: Option<Role>,

    /// List style of the block
    pub list_style: ListStyle,

    /// Table laid out as a narrow letter column plus choice text
    pub is_table_cell_grid: bool,

    /// This block starts a new page
    pub has_page_break: bool,

    /// Large-font / H1 heading, or an explicit section marker
    pub is_heading_style: bool,

    /// The block embeds an image
    pub has_image: bool,

    /// The adapter found an unexpected grouping element here
    pub is_nested_group: bool,
}

impl Block {
    /// Create a plain paragraph block whose raw content is its text
    pub fn paragraph(text: &str) -> Self {
        let text = normalize_text(text);
        Self {
            raw_content: text.clone(),
            text,
            ..Self::default()
        }
    }

    /// Create a heading-styled block whose raw content is its text
    pub fn heading(text: &str) -> Self {
        Self {
            is_heading_style: true,
            ..Self::paragraph(text)
        }
    }

    /// Create a block from normalized text plus raw markup
    pub fn with_markup(text: &str, raw_content: impl Into<String>) -> Self {
        Self {
            text: normalize_text(text),
            raw_content: raw_content.into(),
            ..Self::default()
        }
    }

    /// Mark the block as starting a new page
    pub fn with_page_break(mut self) -> Self {
        self.has_page_break = true;
        self
    }

    /// Attach an explicit role annotation
    pub fn with_role(mut self, role: Role) -> Self {
        self.explicit_role = Some(role);
        self
    }

    /// Set the list style
    pub fn with_list_style(mut self, style: ListStyle) -> Self {
        self.list_style = style;
        self
    }

    /// Mark the block as a choice grid
    pub fn with_table_grid(mut self) -> Self {
        self.is_table_cell_grid = true;
        self
    }

    /// Mark the block as carrying an image
    pub fn with_image(mut self) -> Self {
        self.has_image = true;
        self
    }

    /// Whether the block is a list item of any style
    pub fn is_list_item(&self) -> bool {
        self.list_style != ListStyle::None
    }

    /// Blank blocks have no text and no image; they never reach the classifier
    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && !self.has_image
    }

    /// First `max_chars` characters of the text
    pub fn head(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }

    /// Last `max_chars` characters of the text
    pub fn tail(&self, max_chars: usize) -> &str {
        let count = self.text.chars().count();
        if count <= max_chars {
            return &self.text;
        }
        match self.text.char_indices().nth(count - max_chars) {
            Some((idx, _)) => &self.text[idx..],
            None => &self.text,
        }
    }
}

/// Collapse newlines and runs of ASCII whitespace into single spaces and trim
///
/// Non-breaking spaces inside the text survive so the choice-start heuristic
/// can see them; leading and trailing ones are trimmed with other whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out.trim().to_string()
}

/// Remove non-breaking spaces, both literal and entity-encoded
pub fn strip_nbsp(raw: &str) -> String {
    raw.replace('\u{a0}', "").replace("&nbsp;", "")
}
