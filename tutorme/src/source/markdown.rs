//! Markdown adapter
//!
//! Converts pulldown-cmark's event stream into one [`Block`] per top-level
//! element. Conventions for the parts Markdown has no syntax for:
//!
//! * `---` or an HTML element styled `page-break-before:always` starts a new
//!   page; the flag lands on the next block.
//! * `<!-- role: question -->` annotates the next block with a role.
//! * A level-one heading is a section heading.
//! * Ordered lists are answer keys; bullet lists whose items start with `A.`
//!   or `A)` are choice lists; tables whose rows start with a lone letter
//!   are choice grids.

use crate::block::{normalize_text, Block, ListStyle};
use crate::classifier::Role;
use crate::config::SourceOptions;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static ROLE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*role\s*:\s*([A-Za-z]+)\s*-->").unwrap());

static PAGE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)page-break-(?:before|after)\s*:\s*always").unwrap());

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static IMG_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(<img\b[^>]*?\bsrc\s*=\s*")([^"]*)(")"#).unwrap());

/// First item of a bullet list written as a choice
static LETTERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][.)]\s").unwrap());

/// Table cell holding only a choice letter
static CHOICE_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][.)]?$").unwrap());

/// Kind of the top-level element being collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Paragraph,
    Heading { primary: bool },
    List { ordered: bool },
    Table,
    Html,
    Other,
}

/// Cell bookkeeping for a table being collected
#[derive(Debug, Default)]
struct TableContext {
    /// Index of the cell within the current row
    cell_index: usize,
    /// Text of the current cell
    cell_text: String,
    /// First cell of every body row
    first_cells: Vec<String>,
    /// Whether we're in the header
    in_header: bool,
}

/// Parser state for converting markdown events to blocks
pub struct MarkdownAdapter<'a> {
    /// Replaces the directory part of image sources
    image_prefix: &'a str,

    /// Nesting depth of open tags; 0 between top-level elements
    depth: usize,

    /// Kind of the element being collected
    kind: BlockKind,

    /// Events of the element being collected, rendered on close
    events: Vec<Event<'a>>,

    /// Plain text of the element being collected
    text: String,

    /// Raw markup of an HTML block being collected
    html: String,

    /// Table bookkeeping while inside a table
    table: Option<TableContext>,

    /// Nesting depth of images; alt text is not block text
    image_depth: usize,

    /// Block being filled in
    current: Block,

    /// A page break seen since the last block
    pending_page_break: bool,

    /// A role annotation seen since the last block
    pending_role: Option<Role>,

    /// Completed blocks
    blocks: Vec<Block>,
}

impl<'a> MarkdownAdapter<'a> {
    /// Create a new adapter
    pub fn new(image_prefix: &'a str) -> Self {
        Self {
            image_prefix,
            depth: 0,
            kind: BlockKind::Other,
            events: Vec::new(),
            text: String::new(),
            html: String::new(),
            table: None,
            image_depth: 0,
            current: Block::default(),
            pending_page_break: false,
            pending_role: None,
            blocks: Vec::new(),
        }
    }

    /// Parse a markdown document into blocks
    ///
    /// # Parameters
    /// * `content` - Raw markdown content to parse
    /// * `options` - Adapter options
    ///
    /// # Returns
    /// * `Vec<Block>` - One block per top-level element, in document order
    pub fn parse(content: &str, options: &SourceOptions) -> Vec<Block> {
        let mut adapter = MarkdownAdapter::new(&options.image_prefix);
        let parser = Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);

        for event in parser {
            adapter.process_event(event);
        }

        adapter.finalize()
    }

    /// Process a single markdown event
    fn process_event(&mut self, event: Event<'a>) {
        match event {
            Event::Start(tag) => self.handle_start_tag(tag),
            Event::End(tag_end) => self.handle_end_tag(tag_end),
            Event::Text(text) => {
                self.push_text(&text);
                self.events.push(Event::Text(text));
            }
            Event::Code(code) => {
                self.push_text(&code);
                self.events.push(Event::Code(code));
            }
            Event::SoftBreak | Event::HardBreak => {
                self.push_text(" ");
                self.events.push(event);
            }
            Event::Html(html) => {
                if self.kind == BlockKind::Html {
                    self.html.push_str(&html);
                } else if self.depth > 0 {
                    self.events.push(Event::Html(html));
                }
            }
            Event::InlineHtml(html) => self.handle_inline_html(html.as_ref()),
            Event::Rule => {
                if self.depth == 0 {
                    log::debug!("Page break from thematic break");
                    self.pending_page_break = true;
                }
            }
            Event::InlineMath(_)
            | Event::DisplayMath(_)
            | Event::FootnoteReference(_)
            | Event::TaskListMarker(_) => {
                if self.depth > 0 {
                    self.events.push(event);
                }
            }
        }
    }

    /// Handle opening tags
    fn handle_start_tag(&mut self, tag: Tag<'a>) {
        if self.depth == 0 {
            self.begin_block(&tag);
        }
        self.depth += 1;

        let tag = match tag {
            Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            } => {
                self.current.has_image = true;
                self.image_depth += 1;
                Tag::Image {
                    link_type,
                    dest_url: rewrite_image_src(&dest_url, self.image_prefix).into(),
                    title,
                    id,
                }
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_header = true;
                    table.cell_index = 0;
                }
                Tag::TableHead
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.cell_index = 0;
                }
                Tag::TableRow
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell_text.clear();
                }
                Tag::TableCell
            }
            other => other,
        };

        if tag != Tag::HtmlBlock {
            self.events.push(Event::Start(tag));
        }
    }

    /// Handle closing tags
    fn handle_end_tag(&mut self, tag_end: TagEnd) {
        match tag_end {
            TagEnd::Image => self.image_depth = self.image_depth.saturating_sub(1),
            TagEnd::Item | TagEnd::Paragraph => self.push_text(" "),
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_header = false;
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    if table.cell_index == 0 && !table.in_header {
                        table.first_cells.push(table.cell_text.trim().to_string());
                    }
                    table.cell_index += 1;
                }
                self.push_text(" ");
            }
            _ => {}
        }

        if tag_end != TagEnd::HtmlBlock {
            self.events.push(Event::End(tag_end));
        }

        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.end_block();
        }
    }

    /// Start collecting a top-level element
    fn begin_block(&mut self, tag: &Tag<'a>) {
        self.kind = match tag {
            Tag::Paragraph => BlockKind::Paragraph,
            Tag::Heading { level, .. } => BlockKind::Heading {
                primary: *level == HeadingLevel::H1,
            },
            Tag::List(start) => BlockKind::List {
                ordered: start.is_some(),
            },
            Tag::Table(_) => BlockKind::Table,
            Tag::HtmlBlock => BlockKind::Html,
            _ => BlockKind::Other,
        };
        self.events.clear();
        self.text.clear();
        self.html.clear();
        self.image_depth = 0;
        self.table = (self.kind == BlockKind::Table).then(TableContext::default);
        self.current = Block::default();
    }

    /// Close a top-level element and emit its block
    fn end_block(&mut self) {
        if self.kind == BlockKind::Html {
            let html = std::mem::take(&mut self.html);
            self.handle_html_block(&html);
            return;
        }

        let mut block = std::mem::take(&mut self.current);
        block.text = normalize_text(&self.text);

        let mut raw = String::new();
        pulldown_cmark::html::push_html(&mut raw, self.events.drain(..));
        block.raw_content = raw.trim_end().to_string();

        match self.kind {
            BlockKind::Heading { primary } => block.is_heading_style = primary,
            BlockKind::List { ordered: true } => block.list_style = ListStyle::Numbered,
            BlockKind::List { ordered: false } if LETTERED_ITEM_RE.is_match(&block.text) => {
                block.list_style = ListStyle::Lettered
            }
            BlockKind::Table => {
                block.is_table_cell_grid = self.table.take().is_some_and(|table| {
                    !table.first_cells.is_empty()
                        && table
                            .first_cells
                            .iter()
                            .all(|cell| CHOICE_LETTER_RE.is_match(cell))
                })
            }
            _ => {}
        }

        self.emit(block);
    }

    /// Interpret a block of raw HTML
    ///
    /// Comments carry role annotations and empty elements carry page breaks;
    /// neither becomes a block. Anything with content does.
    fn handle_html_block(&mut self, html: &str) {
        if let Some(role) = parse_role_comment(html) {
            self.pending_role = Some(role);
        }
        let page_break = PAGE_BREAK_RE.is_match(html);

        let without_comments = strip_comments(html);
        let text = html_text(&without_comments);
        let has_image = IMG_SRC_RE.is_match(&without_comments);

        if text.is_empty() && !has_image {
            if page_break {
                log::debug!("Page break from HTML element");
                self.pending_page_break = true;
            }
            return;
        }

        let raw = rewrite_html_images(without_comments.trim(), self.image_prefix);
        let block = Block {
            text,
            is_nested_group: raw.trim_start().to_ascii_lowercase().starts_with("<div"),
            has_page_break: page_break,
            has_image,
            raw_content: raw,
            ..Block::default()
        };
        self.emit(block);
    }

    /// Inline HTML inside a block can still mark a page break or a role
    fn handle_inline_html(&mut self, html: &str) {
        if self.depth == 0 {
            return;
        }
        if PAGE_BREAK_RE.is_match(html) {
            self.current.has_page_break = true;
        }
        if let Some(role) = parse_role_comment(html) {
            self.current.explicit_role = Some(role);
            return;
        }
        let rewritten = rewrite_html_images(html, self.image_prefix);
        if rewritten != html {
            self.current.has_image = true;
        }
        self.events.push(Event::InlineHtml(rewritten.into()));
    }

    fn push_text(&mut self, text: &str) {
        if self.depth == 0 || self.image_depth > 0 {
            return;
        }
        self.text.push_str(text);
        if let Some(table) = self.table.as_mut() {
            table.cell_text.push_str(text);
        }
    }

    /// Attach pending annotations and append the block
    fn emit(&mut self, mut block: Block) {
        if std::mem::take(&mut self.pending_page_break) {
            block.has_page_break = true;
        }
        if let Some(role) = self.pending_role.take() {
            block.explicit_role.get_or_insert(role);
        }
        self.blocks.push(block);
    }

    /// Finalize parsing and return the blocks
    fn finalize(self) -> Vec<Block> {
        if self.pending_page_break || self.pending_role.is_some() {
            log::debug!("Dropping annotation after the last block");
        }
        self.blocks
    }
}

fn parse_role_comment(html: &str) -> Option<Role> {
    let name = ROLE_COMMENT_RE.captures(html)?.get(1)?.as_str();
    match name.parse() {
        Ok(role) => Some(role),
        Err(e) => {
            log::warn!("Ignoring role annotation: {}", e);
            None
        }
    }
}

fn strip_comments(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

/// Visible text of an HTML fragment
fn html_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    normalize_text(&html_escape::decode_html_entities(&stripped))
}

/// Point an image source at the configured prefix, keeping the file name
fn rewrite_image_src(src: &str, prefix: &str) -> String {
    match src.rsplit_once('/') {
        Some((_, name)) => format!("{}{}", prefix, name),
        None => src.to_string(),
    }
}

fn rewrite_html_images(html: &str, prefix: &str) -> String {
    IMG_SRC_RE
        .replace_all(html, |caps: &Captures| {
            format!(
                "{}{}{}",
                &caps[1],
                rewrite_image_src(&caps[2], prefix),
                &caps[3]
            )
        })
        .into_owned()
}
