//! JSON block lists
//!
//! The contract for external converters: a JSON array of blocks using the
//! field names of [`Block`]. Every field except `text` may be omitted.

use crate::block::{normalize_text, Block};

/// Parse a JSON block list, normalizing each block's text
pub fn parse(content: &str) -> Result<Vec<Block>, serde_json::Error> {
    let mut blocks: Vec<Block> = serde_json::from_str(content)?;
    for block in &mut blocks {
        block.text = normalize_text(&block.text);
    }
    Ok(blocks)
}
