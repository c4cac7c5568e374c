//! tutorme - segmentation of exported exam tutorials
//!
//! Turns a flat sequence of document blocks (paragraphs, lists, tables,
//! headings) into sections of questions, each with its stem, choices,
//! tutorial and answer key.
//!
//! Processing runs in one pass:
//! 1. An adapter in [`source`] reads the document into [`block::Block`]s
//! 2. [`classifier`] assigns every block a role signal
//! 3. [`segmenter`] runs the state machine, with [`recovery`] correcting
//!    frame shifts, and [`document`] assembles the tree
//! 4. [`overlay`] applies editors' corrections
//! 5. [`export`] serializes the tree
//!
//! Anomalies never abort a run; they are collected as
//! [`diagnostics::Diagnostic`]s next to the tree.

#![deny(unsafe_code)]

pub mod block;
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod export;
pub mod overlay;
pub mod pipeline;
pub mod recovery;
pub mod segmenter;
pub mod source;

pub use block::Block;
pub use document::{Question, Section};
pub use segmenter::{segment, Segmentation, SegmenterOptions};
