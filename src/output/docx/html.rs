//! HTML tree walk producing Word block structure

use scraper::{ElementRef, Html, Selector};

pub const HEADING_STYLES: [&str; 6] = [
    "Heading1", "Heading2", "Heading3", "Heading4", "Heading5", "Heading6",
];
pub const QUOTE_STYLE: &str = "Quote";
pub const CODE_STYLE: &str = "Code";
pub const LIST_STYLE: &str = "ListParagraph";
/// Browsers clamp `colspan` to this value.
pub const MAX_COL_SPAN: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub code: bool,
    pub superscript: bool,
    pub subscript: bool,
}

impl RunFormat {
    pub fn is_plain(&self) -> bool {
        *self == RunFormat::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Text { text: String, format: RunFormat },
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: Option<&'static str>,
    pub indent_level: usize,
    pub runs: Vec<Run>,
    /// Horizontal rule: rendered as an empty paragraph with a bottom border.
    pub rule: bool,
    trailing_space: bool,
}

impl Paragraph {
    fn new(style: Option<&'static str>, indent_level: usize) -> Self {
        Self {
            style,
            indent_level,
            runs: Vec::new(),
            rule: false,
            trailing_space: true,
        }
    }

    fn rule() -> Self {
        Self {
            rule: true,
            ..Self::new(None, 0)
        }
    }

    pub fn empty() -> Self {
        Self::new(None, 0)
    }

    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|run| match run {
                Run::Text { text, .. } => text.as_str(),
                Run::Break => "\n",
            })
            .collect()
    }

    fn push_str(&mut self, text: &str, format: RunFormat) {
        if text.is_empty() {
            return;
        }
        if let Some(Run::Text { text: last, format: last_format }) = self.runs.last_mut() {
            if *last_format == format {
                last.push_str(text);
                return;
            }
        }
        self.runs.push(Run::Text {
            text: text.to_string(),
            format,
        });
    }

    /// Append text with HTML whitespace collapsing.
    fn push_collapsed(&mut self, raw: &str, format: RunFormat) {
        let mut collapsed = String::with_capacity(raw.len());
        for ch in raw.chars() {
            if ch.is_whitespace() {
                if !self.trailing_space {
                    collapsed.push(' ');
                    self.trailing_space = true;
                }
            } else {
                collapsed.push(ch);
                self.trailing_space = false;
            }
        }
        self.push_str(&collapsed, format);
    }

    fn push_preformatted(&mut self, raw: &str, format: RunFormat) {
        for (i, line) in raw.split('\n').enumerate() {
            if i > 0 {
                self.runs.push(Run::Break);
            }
            self.push_str(line.trim_end_matches('\r'), format);
        }
        self.trailing_space = false;
    }

    fn push_break(&mut self) {
        self.runs.push(Run::Break);
        self.trailing_space = true;
    }

    fn trim_end(&mut self) {
        while let Some(Run::Text { text, .. }) = self.runs.last_mut() {
            let trimmed_len = text.trim_end_matches(' ').len();
            text.truncate(trimmed_len);
            if text.is_empty() {
                self.runs.pop();
            } else {
                break;
            }
        }
    }

    fn has_content(&self) -> bool {
        self.rule
            || self.runs.iter().any(|run| match run {
                Run::Text { text, .. } => !text.is_empty(),
                Run::Break => true,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub blocks: Vec<Block>,
    pub col_span: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Number of grid columns, honouring column spans.
    pub fn grid_columns(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().fold(0usize, |total, cell| total.saturating_add(cell.col_span)))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Copy, Default)]
struct Context {
    format: RunFormat,
    style: Option<&'static str>,
    list_depth: usize,
    preformatted: bool,
}

impl Context {
    fn with_format(mut self, apply: impl FnOnce(&mut RunFormat)) -> Self {
        apply(&mut self.format);
        self
    }
}

/// Parse an HTML document (or fragment) into Word blocks.
pub fn parse_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut builder = BlockBuilder::default();
    let root_context = Context::default();

    match Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
    {
        Some(body) => builder.walk_children(body, &root_context),
        None => builder.walk_children(document.root_element(), &root_context),
    }

    builder.finish()
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    open: Option<Paragraph>,
}

impl BlockBuilder {
    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }

    fn flush(&mut self) {
        if let Some(mut paragraph) = self.open.take() {
            paragraph.trim_end();
            if paragraph.has_content() {
                self.blocks.push(Block::Paragraph(paragraph));
            }
        }
    }

    fn paragraph(&mut self, context: &Context) -> &mut Paragraph {
        self.open
            .get_or_insert_with(|| Paragraph::new(context.style, context.list_depth))
    }

    fn walk_children(&mut self, element: ElementRef, context: &Context) {
        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.walk_element(child_element, context);
            } else if let Some(text) = child.value().as_text() {
                self.push_text(text, context);
            }
        }
    }

    fn push_text(&mut self, text: &str, context: &Context) {
        if context.preformatted {
            self.paragraph(context).push_preformatted(text, context.format);
            return;
        }
        // Whitespace-only text between blocks must not open a paragraph.
        if self.open.is_none() && text.trim().is_empty() {
            return;
        }
        self.paragraph(context).push_collapsed(text, context.format);
    }

    fn walk_element(&mut self, element: ElementRef, context: &Context) {
        let name = element.value().name();
        match name {
            "script" | "style" | "head" | "title" | "noscript" | "template" | "meta" | "link" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1).clamp(1, 6);
                self.block(element, context, Some(HEADING_STYLES[level - 1]));
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "nav" | "aside"
            | "figure" | "figcaption" | "address" | "center" | "dd" | "dt" | "caption" | "summary"
            | "details" => {
                self.block(element, context, None);
            }
            "blockquote" => {
                let inner = Context {
                    style: Some(QUOTE_STYLE),
                    ..*context
                };
                self.block(element, &inner, Some(QUOTE_STYLE));
            }
            "pre" => {
                let inner = Context {
                    style: Some(CODE_STYLE),
                    preformatted: true,
                    ..*context
                };
                self.block(element, &inner, Some(CODE_STYLE));
            }
            "ul" | "ol" | "dl" => self.list(element, context, name == "ol"),
            "li" => self.list_item(element, context, "• ".to_string()),
            "table" => self.table(element, context),
            "hr" => {
                self.flush();
                self.blocks.push(Block::Paragraph(Paragraph::rule()));
            }
            "br" => self.paragraph(context).push_break(),
            "img" => {
                if let Some(alt) = element.value().attr("alt").filter(|alt| !alt.trim().is_empty()) {
                    self.push_text(&format!("[{}]", alt.trim()), context);
                }
            }
            "b" | "strong" => self.walk_children(element, &context.with_format(|f| f.bold = true)),
            "i" | "em" | "cite" | "dfn" | "var" => {
                self.walk_children(element, &context.with_format(|f| f.italic = true))
            }
            "u" | "ins" => self.walk_children(element, &context.with_format(|f| f.underline = true)),
            "s" | "del" | "strike" => {
                self.walk_children(element, &context.with_format(|f| f.strike = true))
            }
            "code" | "kbd" | "samp" | "tt" => {
                self.walk_children(element, &context.with_format(|f| f.code = true))
            }
            "sup" => self.walk_children(element, &context.with_format(|f| f.superscript = true)),
            "sub" => self.walk_children(element, &context.with_format(|f| f.subscript = true)),
            _ => self.walk_children(element, context),
        }
    }

    fn block(&mut self, element: ElementRef, context: &Context, style: Option<&'static str>) {
        self.flush();
        self.open = Some(Paragraph::new(style.or(context.style), context.list_depth));
        self.walk_children(element, context);
        self.flush();
    }

    fn list(&mut self, element: ElementRef, context: &Context, ordered: bool) {
        self.flush();
        let inner = Context {
            list_depth: context.list_depth + 1,
            style: None,
            ..*context
        };

        let mut counter = element
            .value()
            .attr("start")
            .and_then(|start| start.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .saturating_sub(1);

        for child in element.children() {
            let Some(item) = ElementRef::wrap(child) else {
                continue;
            };
            if item.value().name() == "li" {
                counter += 1;
                let marker = if ordered {
                    format!("{}. ", counter)
                } else {
                    "• ".to_string()
                };
                self.list_item(item, &inner, marker);
            } else {
                self.walk_element(item, &inner);
            }
        }
        self.flush();
    }

    fn list_item(&mut self, item: ElementRef, context: &Context, marker: String) {
        self.flush();
        let mut paragraph = Paragraph::new(Some(LIST_STYLE), context.list_depth.max(1));
        paragraph.push_str(&marker, RunFormat::default());
        self.open = Some(paragraph);
        self.walk_children(item, context);
        self.flush();
    }

    fn table(&mut self, element: ElementRef, context: &Context) {
        self.flush();

        let mut captions = Vec::new();
        let mut rows = Vec::new();
        collect_rows(element, &mut captions, &mut rows);

        for caption in captions {
            self.block(caption, context, None);
        }

        let rows: Vec<Vec<Cell>> = rows
            .into_iter()
            .map(|row| {
                row.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                    .map(build_cell)
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();

        if !rows.is_empty() {
            self.blocks.push(Block::Table(Table { rows }));
        }
    }
}

fn collect_rows<'a>(
    element: ElementRef<'a>,
    captions: &mut Vec<ElementRef<'a>>,
    rows: &mut Vec<ElementRef<'a>>,
) {
    for child in element.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, captions, rows),
            "caption" => captions.push(child),
            _ => {}
        }
    }
}

fn build_cell(cell: ElementRef) -> Cell {
    let header = cell.value().name() == "th";
    let context = Context::default().with_format(|f| f.bold = header);

    let mut builder = BlockBuilder::default();
    builder.walk_children(cell, &context);

    let col_span = cell
        .value()
        .attr("colspan")
        .and_then(|span| span.trim().parse::<usize>().ok())
        .filter(|span| *span > 0)
        .map_or(1, |span| span.min(MAX_COL_SPAN));

    Cell {
        blocks: builder.finish(),
        col_span,
    }
}
