//! Segmentation state machine
//!
//! Consumes blocks strictly in document order, keeps one open section, one
//! open question and the buffers that feed them, and hands sealed records to
//! the [`TreeAssembler`].
//!
//! Two signal families can advance the machine:
//! - **page breaks**, dominant in Word exports without annotations, where a
//!   question, its tutorial and its answer key each start on a new page;
//! - **annotations and text patterns**, dominant in annotated exports, where
//!   choices, answer keys and notes are recognized block by block.
//!
//! [`Driver`] selects which family may end a tutorial or an answer key.
//! Page breaks are honored under both drivers.

use crate::block::{strip_nbsp, Block};
use crate::classifier::{classify, Evidence, Role, RoleSignal};
use crate::diagnostics::{Diagnostic, DiagnosticSink, EmptyQuestionDisposition};
use crate::document::{Question, Section, TreeAssembler};
use crate::recovery;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heading prepended to a non-empty tutorial when it is folded into the answer
pub const DEFAULT_TUTORIAL_HEADING: &str =
    "<div class=\"row\">&nbsp;</div><div class=\"row text-center\"><h4>Tutorial</h4></div>\n";

/// Where the machine is in the section/question cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Before the first section heading
    Start,
    /// Collecting heading fragments
    Section,
    /// Collecting the question stem
    Question,
    /// Collecting answer choices
    Choices,
    /// Collecting tutorial text
    Tutorial,
    /// Collecting the answer key
    Answers,
}

impl State {
    /// States that belong to an open question
    pub fn in_question(self) -> bool {
        matches!(
            self,
            State::Question | State::Choices | State::Tutorial | State::Answers
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Start => "start",
            State::Section => "section",
            State::Question => "question",
            State::Choices => "choices",
            State::Tutorial => "tutorial",
            State::Answers => "answers",
        };
        f.pad(name)
    }
}

/// Signal family that advances tutorials and answer keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Driver {
    /// Page breaks end stems, tutorials and answer keys
    PageBreak,
    /// Annotations and text patterns end them; page breaks still count
    Pattern,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::PageBreak => f.pad("page-break"),
            Driver::Pattern => f.pad("pattern"),
        }
    }
}

/// Configured driver selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriverChoice {
    /// Page-break driven when the document carries any page break
    #[default]
    Auto,
    /// Always page-break driven
    PageBreak,
    /// Always pattern driven
    Pattern,
}

impl DriverChoice {
    /// Resolve to a concrete driver for a block sequence
    pub fn resolve(self, blocks: &[Block]) -> Driver {
        match self {
            DriverChoice::PageBreak => Driver::PageBreak,
            DriverChoice::Pattern => Driver::Pattern,
            DriverChoice::Auto => {
                if blocks.iter().any(|block| block.has_page_break) {
                    Driver::PageBreak
                } else {
                    Driver::Pattern
                }
            }
        }
    }
}

/// Order of tutorial and answer key inside the sealed answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TutorialPlacement {
    /// Answer key first, tutorial after it
    #[default]
    After,
    /// Tutorial first, answer key after it
    Before,
}

/// Tunables for one segmentation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterOptions {
    /// Which signal family drives the machine
    pub driver: DriverChoice,

    /// Where the tutorial goes inside the sealed answer
    pub tutorial_placement: TutorialPlacement,

    /// Markup prepended to a non-empty tutorial
    pub tutorial_heading: String,

    /// Heading texts that the next fragment replaces instead of extending
    /// (running headers such as a course title repeated above every section)
    pub title_resets: Vec<String>,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            driver: DriverChoice::default(),
            tutorial_placement: TutorialPlacement::default(),
            tutorial_heading: DEFAULT_TUTORIAL_HEADING.to_string(),
            title_resets: Vec::new(),
        }
    }
}

/// Counters gathered during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentStats {
    /// Blocks fed, blank ones included
    pub blocks_seen: usize,
    /// Blank blocks filtered before classification
    pub blank_blocks: usize,
    /// Longest run of consecutive blank blocks
    pub longest_blank_run: usize,
    /// Non-blank blocks seen before the first heading
    pub preamble_blocks: usize,
    /// Blocks that started a new page
    pub page_breaks: usize,
    /// Questions pushed into a section
    pub questions_sealed: usize,
    /// Corrective jumps into the answer key
    pub frame_shifts: usize,
}

/// Result of a segmentation run
#[derive(Debug)]
pub struct Segmentation {
    /// Sections in document order
    pub sections: Vec<Section>,
    /// Everything worth auditing
    pub diagnostics: Vec<Diagnostic>,
    /// Run counters
    pub stats: SegmentStats,
    /// Driver the run used
    pub driver: Driver,
}

/// Segment a complete block sequence
pub fn segment(blocks: &[Block], options: &SegmenterOptions) -> Segmentation {
    let driver = options.driver.resolve(blocks);
    log::info!("Segmenting {} blocks ({} driver)", blocks.len(), driver);

    let mut segmenter = Segmenter::new(driver, options.clone());
    for block in blocks {
        segmenter.feed(block);
    }
    segmenter.finish()
}

/// The state machine for a single pass
pub struct Segmenter {
    driver: Driver,
    options: SegmenterOptions,
    state: State,

    /// Heading fragments of the open section
    title: String,
    /// Stem, tutorial or answer-key markup, depending on `state`
    buffer: String,
    /// One entry per choice block
    choices: Vec<String>,
    /// Closed tutorial, heading included
    tutorial: String,
    /// Question under construction
    current: Question,

    tree: TreeAssembler,
    sink: DiagnosticSink,
    stats: SegmentStats,

    /// Position of the next block
    index: usize,
    /// A blank block carried a page break for the next non-blank block
    pending_page_break: bool,
    blank_run: usize,
    /// Start of the previous non-blank block's text
    previous_excerpt: String,
}

impl Segmenter {
    /// Create a machine in the start state
    pub fn new(driver: Driver, options: SegmenterOptions) -> Self {
        Self {
            driver,
            options,
            state: State::Start,
            title: String::new(),
            buffer: String::new(),
            choices: Vec::new(),
            tutorial: String::new(),
            current: Question::default(),
            tree: TreeAssembler::new(),
            sink: DiagnosticSink::new(),
            stats: SegmentStats::default(),
            index: 0,
            pending_page_break: false,
            blank_run: 0,
            previous_excerpt: String::new(),
        }
    }

    /// Consume the next block
    pub fn feed(&mut self, block: &Block) {
        let index = self.index;
        self.index += 1;
        self.stats.blocks_seen += 1;

        if block.is_blank() {
            self.stats.blank_blocks += 1;
            self.blank_run += 1;
            self.stats.longest_blank_run = self.stats.longest_blank_run.max(self.blank_run);
            self.pending_page_break |= block.has_page_break;
            return;
        }
        self.blank_run = 0;

        let mut signal = classify(block);
        signal.page_break |= std::mem::take(&mut self.pending_page_break);
        if signal.page_break {
            self.stats.page_breaks += 1;
        }

        if block.is_nested_group {
            self.sink.record(Diagnostic::MalformedBlock {
                index,
                excerpt: block.head(100).to_string(),
            });
        }

        let before = self.state;
        self.transition(&signal, index);

        if recovery::is_frame_shift(self.state, &signal) {
            self.recover(index, block);
        } else if recovery::is_forced_answer_entry(before, self.state, &signal) {
            self.record_frame_shift(index, before, block);
        }

        self.accumulate(block);
        self.previous_excerpt = block.head(recovery::EXCERPT_CHARS).to_string();
    }

    /// Seal whatever is open and return the tree
    pub fn finish(mut self) -> Segmentation {
        let index = self.index;
        if self.state == State::Section {
            self.close_title();
        } else {
            self.flush_question(index);
        }

        let sections = self.tree.finish();
        log::info!(
            "Segmented {} sections, {} questions, {} diagnostics",
            sections.len(),
            self.stats.questions_sealed,
            self.sink.len()
        );

        Segmentation {
            sections,
            diagnostics: self.sink.into_vec(),
            stats: self.stats,
            driver: self.driver,
        }
    }

    /// Apply the transition rules for one classified block
    fn transition(&mut self, signal: &RoleSignal, index: usize) {
        if signal.role == Role::Section && self.state != State::Section {
            self.flush_question(index);
            self.tree.open_section();
            self.title.clear();
            self.state = State::Section;
            return;
        }

        let pattern_driven = self.driver == Driver::Pattern;

        match self.state {
            State::Start => {}

            State::Section => {
                if signal.role != Role::Section {
                    self.close_title();
                    self.begin_question();
                    self.state = State::Question;
                }
            }

            State::Question => {
                if signal.page_break {
                    self.close_stem();
                    self.state = if signal.is_answer_like() || signal.opens_answers() {
                        State::Answers
                    } else {
                        State::Tutorial
                    };
                } else if pattern_driven && signal.opens_answers() {
                    self.close_stem();
                    self.state = State::Answers;
                } else if pattern_driven && signal.role == Role::Choices {
                    self.close_stem();
                    self.state = State::Choices;
                }
            }

            State::Choices => {
                if signal.is_answer_like() || signal.opens_answers() {
                    self.close_choices();
                    self.state = State::Answers;
                } else if signal.page_break || signal.role != Role::Choices {
                    self.close_choices();
                    self.state = State::Tutorial;
                }
            }

            State::Tutorial => {
                if signal.page_break
                    || (pattern_driven && (signal.is_answer_like() || signal.opens_answers()))
                {
                    self.close_tutorial();
                    self.state = State::Answers;
                }
            }

            State::Answers => {
                let annotated_question =
                    signal.role == Role::Question && signal.evidence == Evidence::Annotation;
                if signal.page_break
                    || annotated_question
                    || (pattern_driven && !signal.continues_answers())
                {
                    self.seal_question(index);
                    self.begin_question();
                    self.state = State::Question;
                }
            }
        }
    }

    /// Force the answer key open after a page break landed in the wrong state
    fn recover(&mut self, index: usize, block: &Block) {
        self.record_frame_shift(index, self.state, block);

        if self.state == State::Choices {
            self.close_choices();
        }
        self.buffer.clear();
        self.state = State::Answers;
    }

    fn record_frame_shift(&mut self, index: usize, from: State, block: &Block) {
        self.sink.record(recovery::frame_shift(
            index,
            from,
            &self.previous_excerpt,
            block,
        ));
        self.stats.frame_shifts += 1;
    }

    /// Add the block's content to the buffer of the current state
    fn accumulate(&mut self, block: &Block) {
        match self.state {
            State::Start => {
                self.stats.preamble_blocks += 1;
                log::debug!("Skipping content before first heading: {}", block.head(40));
            }
            State::Section => {
                if self.title.is_empty() || self.options.title_resets.contains(&self.title) {
                    self.title = block.text.clone();
                } else {
                    self.title.push(' ');
                    self.title.push_str(&block.text);
                }
            }
            State::Question => append_line(&mut self.buffer, &strip_nbsp(&block.raw_content)),
            State::Choices => self.choices.push(strip_nbsp(&block.raw_content)),
            State::Tutorial | State::Answers => append_line(&mut self.buffer, &block.raw_content),
        }
    }

    fn close_title(&mut self) {
        self.tree.set_title(std::mem::take(&mut self.title));
    }

    fn begin_question(&mut self) {
        self.current = Question::default();
        self.buffer.clear();
        self.choices.clear();
        self.tutorial.clear();
    }

    fn close_stem(&mut self) {
        self.current.question = std::mem::take(&mut self.buffer);
    }

    fn close_choices(&mut self) {
        let choices = std::mem::take(&mut self.choices);
        for choice in &choices {
            append_line(&mut self.current.question, choice);
        }
        self.current.choices = choices;
    }

    fn close_tutorial(&mut self) {
        let body = std::mem::take(&mut self.buffer);
        if !body.is_empty() {
            self.tutorial = format!("{}{}", self.options.tutorial_heading, body);
        }
    }

    /// Close the open buffer by its natural exit rule, then seal
    fn flush_question(&mut self, index: usize) {
        match self.state {
            State::Start | State::Section => return,
            State::Question => self.close_stem(),
            State::Choices => self.close_choices(),
            State::Tutorial => self.close_tutorial(),
            State::Answers => {}
        }
        self.seal_question(index);
        self.begin_question();
    }

    /// Fold tutorial and answer key together and hand the question to the tree
    fn seal_question(&mut self, index: usize) {
        let answer_key = std::mem::take(&mut self.buffer);
        let tutorial = std::mem::take(&mut self.tutorial);
        let mut question = std::mem::take(&mut self.current);
        question.answer = compose_answer(&answer_key, &tutorial, self.options.tutorial_placement);
        question.tutorial = (!tutorial.is_empty()).then_some(tutorial);

        if !question.question.trim().is_empty() {
            if question.answer.is_empty() {
                self.sink.record(Diagnostic::MissingAnswer { index });
            }
            self.tree.push_question(question);
            self.stats.questions_sealed += 1;
            return;
        }

        if question.answer.is_empty() {
            return;
        }

        let disposition = match self.tree.last_question_mut() {
            Some(previous) => {
                append_line(&mut previous.answer, &question.answer);
                EmptyQuestionDisposition::MergedIntoPrevious
            }
            None => EmptyQuestionDisposition::Dropped,
        };
        self.sink.record(Diagnostic::EmptyQuestion { index, disposition });
    }
}

/// Join the answer key and the tutorial in the configured order
fn compose_answer(answer_key: &str, tutorial: &str, placement: TutorialPlacement) -> String {
    let (first, second) = match placement {
        TutorialPlacement::After => (answer_key, tutorial),
        TutorialPlacement::Before => (tutorial, answer_key),
    };
    match (first.is_empty(), second.is_empty()) {
        (_, true) => first.to_string(),
        (true, false) => second.to_string(),
        (false, false) => format!("{}\n{}", first, second),
    }
}

/// Append a fragment, separating it from existing content with a newline
fn append_line(buffer: &mut String, fragment: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(fragment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ListStyle;
    use crate::document::total_questions;

    fn run(blocks: &[Block]) -> Segmentation {
        segment(blocks, &SegmenterOptions::default())
    }

    fn run_with(blocks: &[Block], driver: DriverChoice) -> Segmentation {
        let options = SegmenterOptions {
            driver,
            ..SegmenterOptions::default()
        };
        segment(blocks, &options)
    }

    #[test]
    fn test_single_question_without_choices() {
        // Arrange: heading, stem, answer key on its own page
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("What is the diagnosis?"),
            Block::paragraph("Answer: MI").with_page_break(),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        assert_eq!(result.driver, Driver::PageBreak);
        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].title, "Cardiology");
        assert_eq!(result.sections[0].questions.len(), 1);
        let question = &result.sections[0].questions[0];
        assert_eq!(question.question, "What is the diagnosis?");
        assert_eq!(question.answer, "Answer: MI");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_multi_fragment_heading_is_space_joined() {
        let blocks = vec![
            Block::heading("Rheumatology,"),
            Block::heading("Allergy, & Immunology"),
            Block::paragraph("Q1..."),
        ];

        let result = run(&blocks);

        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].title, "Rheumatology, Allergy, & Immunology");
    }

    #[test]
    fn test_title_reset_replaces_running_header() {
        let blocks = vec![
            Block::heading("Clinical Transitions 2014"),
            Block::heading("Nephrology"),
            Block::paragraph("What is the most likely cause?"),
        ];
        let options = SegmenterOptions {
            title_resets: vec!["Clinical Transitions 2014".to_string()],
            ..SegmenterOptions::default()
        };

        let result = segment(&blocks, &options);

        assert_eq!(result.sections[0].title, "Nephrology");
    }

    #[test]
    fn test_heading_only_document_sets_title() {
        let result = run(&[Block::heading("Dermatology")]);

        assert_eq!(result.sections.len(), 1);
        assert_eq!(result.sections[0].title, "Dermatology");
        assert!(result.sections[0].questions.is_empty());
    }

    #[test]
    fn test_page_break_cycle_with_tutorial() {
        // Arrange: question page, tutorial page, answer page, next question page
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("A 54-year-old man has chest pain."),
            Block::paragraph("A.\u{a0}\u{a0}Endocarditis"),
            Block::paragraph("B.\u{a0}\u{a0}Sepsis"),
            Block::paragraph("Chest pain has many causes.").with_page_break(),
            Block::paragraph("Consider the ECG first."),
            Block::paragraph("Answer A is correct.").with_page_break(),
            Block::paragraph("Endocarditis explains the murmur."),
            Block::paragraph("What is the next step?").with_page_break(),
            Block::paragraph("Answers.").with_page_break(),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].question,
            "A 54-year-old man has chest pain.\nA.Endocarditis\nB.Sepsis"
        );
        assert!(questions[0].choices.is_empty());
        assert_eq!(
            questions[0].answer,
            format!(
                "Answer A is correct.\nEndocarditis explains the murmur.\n{}Chest pain has many causes.\nConsider the ECG first.",
                DEFAULT_TUTORIAL_HEADING
            )
        );
        assert!(questions[0].tutorial.is_some());
        assert_eq!(questions[1].question, "What is the next step?");
        assert_eq!(questions[1].answer, "Answers.");
        assert!(questions[1].tutorial.is_none());
    }

    #[test]
    fn test_tutorial_placement_before() {
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Stem"),
            Block::paragraph("Tutorial text").with_page_break(),
            Block::paragraph("Answer B is correct.").with_page_break(),
        ];
        let options = SegmenterOptions {
            tutorial_placement: TutorialPlacement::Before,
            tutorial_heading: "<h4>Tutorial</h4>\n".to_string(),
            ..SegmenterOptions::default()
        };

        let result = segment(&blocks, &options);

        assert_eq!(
            result.sections[0].questions[0].answer,
            "<h4>Tutorial</h4>\nTutorial text\nAnswer B is correct."
        );
    }

    #[test]
    fn test_answer_never_starts_with_heading_without_tutorial() {
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Stem one"),
            Block::paragraph("The correct answer is C").with_page_break(),
            Block::paragraph("Stem two").with_page_break(),
            Block::paragraph("Answers").with_page_break(),
        ];

        let result = run(&blocks);

        for question in &result.sections[0].questions {
            assert!(!question.answer.starts_with(DEFAULT_TUTORIAL_HEADING));
            assert!(question.tutorial.is_none());
        }
    }

    #[test]
    fn test_pattern_driver_choices_tutorial_answers() {
        // Arrange: annotated-style export without page breaks
        let blocks = vec![
            Block::heading("Rheumatology"),
            Block::paragraph("Which joint is involved?"),
            Block::paragraph("A.\u{a0}\u{a0}Knee"),
            Block::paragraph("B.\u{a0}\u{a0}Hip"),
            Block::paragraph("Gout classically affects the first toe."),
            Block::paragraph("The correct answer is A"),
            Block::paragraph("Note: podagra is the classic presentation"),
            Block::paragraph("Which drug lowers urate?"),
            Block::paragraph("Allopurinol inhibits xanthine oxidase.")
                .with_list_style(ListStyle::Numbered),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        assert_eq!(result.driver, Driver::Pattern);
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].choices, vec!["A.Knee", "B.Hip"]);
        assert_eq!(questions[0].question, "Which joint is involved?\nA.Knee\nB.Hip");
        assert!(questions[0]
            .answer
            .starts_with("The correct answer is A\nNote: podagra"));
        assert!(questions[0].answer.ends_with("Gout classically affects the first toe."));
        assert_eq!(questions[1].question, "Which drug lowers urate?");
        assert_eq!(questions[1].answer, "Allopurinol inhibits xanthine oxidase.");
    }

    #[test]
    fn test_pattern_driver_ignores_answer_text_in_stem() {
        let blocks = vec![
            Block::heading("Nephrology"),
            Block::paragraph("Which finding is expected?"),
            Block::paragraph("1. A rise in creatinine was noted"),
            Block::paragraph("A.\u{a0}Hyperkalemia"),
        ];

        let result = run_with(&blocks, DriverChoice::Pattern);

        let question = &result.sections[0].questions[0];
        assert!(question.question.contains("1. A rise in creatinine"));
        assert_eq!(question.choices, vec!["A.Hyperkalemia"]);
    }

    #[test]
    fn test_pattern_driver_answer_phrase_ends_stem() {
        // Arrange: no choices, no page breaks, no annotations
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("What is the diagnosis?"),
            Block::paragraph("The correct answer is B"),
            Block::paragraph("Which valve is affected?"),
            Block::paragraph("Answer A is correct."),
        ];

        // Act
        let result = run_with(&blocks, DriverChoice::Pattern);

        // Assert
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "What is the diagnosis?");
        assert_eq!(questions[0].answer, "The correct answer is B");
        assert_eq!(questions[1].question, "Which valve is affected?");
        assert_eq!(questions[1].answer, "Answer A is correct.");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_pattern_driver_nbsp_matching_lines_continue_answers() {
        // Arrange
        let blocks = vec![
            Block::heading("Rheumatology"),
            Block::paragraph("Match each drug with its mechanism"),
            Block::paragraph("Allopurinol: A").with_list_style(ListStyle::Numbered),
            Block::paragraph("A.\u{a0}1.\u{a0}Allopurinol"),
            Block::paragraph("B.\u{a0}2.\u{a0}Colchicine"),
        ];

        // Act
        let result = run_with(&blocks, DriverChoice::Pattern);

        // Assert
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Match each drug with its mechanism");
        assert_eq!(
            questions[0].answer,
            "Allopurinol: A\nA.\u{a0}1.\u{a0}Allopurinol\nB.\u{a0}2.\u{a0}Colchicine"
        );
    }

    #[test]
    fn test_pattern_driver_matching_line_ends_choice_list() {
        let blocks = vec![
            Block::heading("Rheumatology"),
            Block::paragraph("Match each drug with its mechanism"),
            Block::paragraph("1.\u{a0}\u{a0}Allopurinol"),
            Block::paragraph("2.\u{a0}\u{a0}Colchicine"),
            Block::paragraph("A.\u{a0}1.\u{a0}Xanthine oxidase"),
        ];

        let result = run_with(&blocks, DriverChoice::Pattern);

        let question = &result.sections[0].questions[0];
        assert_eq!(question.choices, vec!["1.Allopurinol", "2.Colchicine"]);
        assert_eq!(question.answer, "A.\u{a0}1.\u{a0}Xanthine oxidase");
    }

    #[test]
    fn test_note_after_page_broken_answer_key_stays_in_answer() {
        let blocks = vec![
            Block::heading("Nephrology"),
            Block::paragraph("Which electrolyte causes peaked T waves?"),
            Block::paragraph("Answers").with_page_break(),
            Block::paragraph("Note: dosing differs in renal failure"),
        ];

        let result = run(&blocks);

        assert_eq!(result.driver, Driver::PageBreak);
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 1);
        assert_eq!(
            questions[0].answer,
            "Answers\nNote: dosing differs in renal failure"
        );
    }

    #[test]
    fn test_question_sealed_without_answer_is_reported() {
        // Arrange: the next heading arrives while the stem is still open
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Which valve is affected?"),
            Block::heading("Nephrology"),
            Block::paragraph("What causes peaked T waves?"),
            Block::paragraph("Answer: Hyperkalemia").with_page_break(),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        assert_eq!(result.sections[0].questions[0].answer, "");
        assert_eq!(result.diagnostics, vec![Diagnostic::MissingAnswer { index: 2 }]);
        assert_eq!(result.stats.questions_sealed, 2);
    }

    #[test]
    fn test_new_section_seals_open_answers() {
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Stem"),
            Block::paragraph("Answers").with_page_break(),
            Block::heading("Nephrology"),
            Block::paragraph("Second stem"),
            Block::paragraph("Answer B is right").with_page_break(),
        ];

        let result = run(&blocks);

        assert_eq!(result.sections.len(), 2);
        assert_eq!(result.sections[0].questions.len(), 1);
        assert_eq!(result.sections[0].questions[0].answer, "Answers");
        assert_eq!(result.sections[1].title, "Nephrology");
        assert_eq!(result.sections[1].questions[0].answer, "Answer B is right");
    }

    #[test]
    fn test_page_break_out_of_tutorial_onto_answer_key_is_recorded() {
        // Arrange: plain page-broken export, no annotations
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Which valve is affected?"),
            Block::paragraph("Murmurs are common.").with_page_break(),
            Block::paragraph("The correct answer is B").with_page_break(),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        assert_eq!(result.stats.frame_shifts, 1);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::FrameShift {
                index: 3,
                from: State::Tutorial,
                previous_excerpt: "Murmurs are common.".to_string(),
                current_excerpt: "The correct answer is B".chars().skip(3).collect(),
            }]
        );
        let question = &result.sections[0].questions[0];
        assert_eq!(question.question, "Which valve is affected?");
        assert_eq!(
            question.answer,
            format!(
                "The correct answer is B\n{}Murmurs are common.",
                DEFAULT_TUTORIAL_HEADING
            )
        );
    }

    #[test]
    fn test_page_break_from_stem_onto_answer_key_is_not_a_frame_shift() {
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("What is the diagnosis?"),
            Block::paragraph("The correct answer is B").with_page_break(),
        ];

        let result = run(&blocks);

        assert_eq!(result.stats.frame_shifts, 0);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_annotated_tutorial_with_answer_text_recovers() {
        // Arrange: the annotation claims tutorial, the text reads as an answer key
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Which valve is affected?"),
            Block::paragraph("The correct answer is B")
                .with_page_break()
                .with_role(Role::Tutorial),
            Block::paragraph("The mitral valve is most often involved."),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        assert_eq!(result.stats.frame_shifts, 1);
        match &result.diagnostics[0] {
            Diagnostic::FrameShift { index, from, .. } => {
                assert_eq!(*index, 2);
                assert_eq!(*from, State::Tutorial);
            }
            other => panic!("Expected FrameShift, got {other:?}"),
        }
        let question = &result.sections[0].questions[0];
        assert_eq!(
            question.answer,
            "The correct answer is B\nThe mitral valve is most often involved."
        );
        assert!(question.tutorial.is_none());
    }

    #[test]
    fn test_frame_shift_after_seal_merges_spillover() {
        // Arrange: the answer key runs onto a second page
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Stem"),
            Block::paragraph("Answer A is correct.").with_page_break(),
            Block::paragraph("Answers B and C are wrong because ...").with_page_break(),
            Block::paragraph("Next stem").with_page_break(),
            Block::paragraph("Answers").with_page_break(),
        ];

        // Act
        let result = run(&blocks);

        // Assert
        let questions = &result.sections[0].questions;
        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].answer,
            "Answer A is correct.\nAnswers B and C are wrong because ..."
        );
        assert_eq!(questions[1].question, "Next stem");
        assert!(result.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::FrameShift {
                from: State::Question,
                ..
            }
        )));
        assert!(result.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::EmptyQuestion {
                disposition: EmptyQuestionDisposition::MergedIntoPrevious,
                ..
            }
        )));
        assert!(questions.iter().all(|q| !q.question.is_empty()));
    }

    #[test]
    fn test_blank_page_break_carries_to_next_block() {
        let blocks = vec![
            Block::heading("Cardiology"),
            Block::paragraph("Stem"),
            Block::paragraph("").with_page_break(),
            Block::paragraph(""),
            Block::paragraph("The correct answer is D"),
        ];

        let result = run(&blocks);

        assert_eq!(result.stats.blank_blocks, 2);
        assert_eq!(result.stats.longest_blank_run, 2);
        assert_eq!(result.stats.page_breaks, 1);
        assert_eq!(result.sections[0].questions[0].answer, "The correct answer is D");
    }

    #[test]
    fn test_image_only_block_is_kept() {
        let blocks = vec![
            Block::heading("Dermatology"),
            Block::with_markup("", "<img src=\"static/img/tutorials/rash.png\">").with_image(),
            Block::paragraph("What is this rash?"),
        ];

        let result = run_with(&blocks, DriverChoice::Pattern);

        assert!(result.sections[0].questions[0].question.starts_with("<img"));
    }

    #[test]
    fn test_nested_group_is_reported_and_kept() {
        let mut nested = Block::paragraph("Stray grouped content");
        nested.is_nested_group = true;
        let blocks = vec![Block::heading("Cardiology"), Block::paragraph("Stem"), nested];

        let result = run(&blocks);

        assert!(matches!(
            result.diagnostics[0],
            Diagnostic::MalformedBlock { index: 2, .. }
        ));
        assert!(result.sections[0].questions[0]
            .question
            .ends_with("Stray grouped content"));
    }

    #[test]
    fn test_preamble_is_skipped() {
        let blocks = vec![
            Block::paragraph("Copyright notice"),
            Block::heading("Cardiology"),
            Block::paragraph("Stem"),
        ];

        let result = run(&blocks);

        assert_eq!(result.stats.preamble_blocks, 1);
        assert_eq!(result.sections.len(), 1);
    }

    #[test]
    fn test_sealed_count_matches_tree_and_order_is_preserved() {
        let mut blocks = vec![Block::heading("Cardiology")];
        for n in 0..5 {
            blocks.push(Block::paragraph(&format!("Stem {n}")).with_page_break());
            blocks.push(Block::paragraph(&format!("Answer: {n}")).with_page_break());
        }
        blocks.push(Block::heading("Nephrology"));
        for n in 5..8 {
            blocks.push(Block::paragraph(&format!("Stem {n}")).with_page_break());
            blocks.push(Block::paragraph(&format!("Answer: {n}")).with_page_break());
        }

        let result = run(&blocks);

        assert_eq!(result.stats.questions_sealed, total_questions(&result.sections));
        assert_eq!(total_questions(&result.sections), 8);
        let stems: Vec<&str> = result
            .sections
            .iter()
            .flat_map(|s| s.questions.iter())
            .map(|q| q.question.as_str())
            .collect();
        let expected: Vec<String> = (0..8).map(|n| format!("Stem {n}")).collect();
        assert_eq!(stems, expected);
    }

    #[test]
    fn test_driver_choice_resolution() {
        let plain = vec![Block::paragraph("x")];
        let broken = vec![Block::paragraph("x").with_page_break()];
        assert_eq!(DriverChoice::Auto.resolve(&plain), Driver::Pattern);
        assert_eq!(DriverChoice::Auto.resolve(&broken), Driver::PageBreak);
        assert_eq!(DriverChoice::Pattern.resolve(&broken), Driver::Pattern);
    }

    #[test]
    fn test_compose_answer_orders() {
        assert_eq!(compose_answer("key", "", TutorialPlacement::After), "key");
        assert_eq!(compose_answer("", "tut", TutorialPlacement::After), "tut");
        assert_eq!(compose_answer("key", "tut", TutorialPlacement::After), "key\ntut");
        assert_eq!(compose_answer("key", "tut", TutorialPlacement::Before), "tut\nkey");
    }
}
