//! Frame-shift recovery
//!
//! Page breaks are an imperfect proxy for "a new part of the question
//! starts here": a layout artifact can end a tutorial early or split an
//! answer key across pages, and every later page is then read one frame off.
//!
//! Two situations are recorded as a [`Diagnostic::FrameShift`]:
//! - after the regular transition for a block, the machine sits inside a
//!   question but outside the answer key, the block opened a new page, and
//!   its text reads as an answer key on its own. The segmenter jumps
//!   straight into the answer key.
//! - a page break forced the machine out of a tutorial into the answer key
//!   on a block whose text reads as an answer key. The jump already
//!   happened, so only the record is added.
//!
//! Only false persistence outside the answer key is corrected. A false entry
//! into the answer key is left alone.

use crate::block::Block;
use crate::classifier::RoleSignal;
use crate::diagnostics::Diagnostic;
use crate::segmenter::State;

/// Characters of context quoted from each side of a frame shift
pub const EXCERPT_CHARS: usize = 20;

/// Whether the block contradicts the state a page break left the machine in
pub fn is_frame_shift(state: State, signal: &RoleSignal) -> bool {
    signal.page_break
        && state.in_question()
        && state != State::Answers
        && signal.has_answer_text()
}

/// Whether a page break moved the machine from a tutorial onto an answer key
pub fn is_forced_answer_entry(before: State, after: State, signal: &RoleSignal) -> bool {
    signal.page_break
        && before == State::Tutorial
        && after == State::Answers
        && signal.has_answer_text()
}

/// Build the audit record for a corrective jump
pub fn frame_shift(index: usize, from: State, previous_excerpt: &str, block: &Block) -> Diagnostic {
    Diagnostic::FrameShift {
        index,
        from,
        previous_excerpt: previous_excerpt.to_string(),
        current_excerpt: block.tail(EXCERPT_CHARS).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;

    #[test]
    fn test_detects_answer_text_after_page_break_in_tutorial() {
        let block = Block::paragraph("The correct answer is B").with_page_break();
        assert!(is_frame_shift(State::Tutorial, &classify(&block)));
    }

    #[test]
    fn test_requires_page_break() {
        let signal = classify(&Block::paragraph("The correct answer is B"));
        assert!(!is_frame_shift(State::Tutorial, &signal));
        assert!(!is_forced_answer_entry(State::Tutorial, State::Answers, &signal));
    }

    #[test]
    fn test_ignores_answers_and_non_question_states() {
        let signal = classify(&Block::paragraph("Answers").with_page_break());
        assert!(!is_frame_shift(State::Answers, &signal));
        assert!(!is_frame_shift(State::Section, &signal));
        assert!(!is_frame_shift(State::Start, &signal));
        assert!(is_frame_shift(State::Question, &signal));
    }

    #[test]
    fn test_ignores_prose() {
        let signal = classify(
            &Block::paragraph("Endocarditis is suggested by the murmur").with_page_break(),
        );
        assert!(!is_frame_shift(State::Tutorial, &signal));
        assert!(!is_forced_answer_entry(State::Tutorial, State::Answers, &signal));
    }

    #[test]
    fn test_forced_entry_only_counts_from_tutorial() {
        let signal = classify(&Block::paragraph("The correct answer is B").with_page_break());
        assert!(is_forced_answer_entry(State::Tutorial, State::Answers, &signal));
        assert!(!is_forced_answer_entry(State::Question, State::Answers, &signal));
        assert!(!is_forced_answer_entry(State::Choices, State::Answers, &signal));
        assert!(!is_forced_answer_entry(State::Tutorial, State::Tutorial, &signal));
    }

    #[test]
    fn test_nbsp_matching_line_reads_as_answer_text() {
        let signal = classify(&Block::paragraph("A.\u{a0}1.\u{a0}Allopurinol").with_page_break());
        assert!(is_frame_shift(State::Tutorial, &signal));
    }

    #[test]
    fn test_diagnostic_quotes_both_sides() {
        let block = Block::paragraph("Skipping ahead, the correct answer is B");
        let diagnostic = frame_shift(4, State::Tutorial, "Murmurs are common", &block);
        match diagnostic {
            Diagnostic::FrameShift {
                index,
                from,
                previous_excerpt,
                current_excerpt,
            } => {
                assert_eq!(index, 4);
                assert_eq!(from, State::Tutorial);
                assert_eq!(previous_excerpt, "Murmurs are common");
                assert_eq!(current_excerpt, " correct answer is B");
                assert_eq!(current_excerpt.chars().count(), EXCERPT_CHARS);
            }
            other => panic!("Expected FrameShift, got {other:?}"),
        }
    }
}
