//! WordprocessingML serialisation of parsed blocks and package metadata

use crate::error::{Result, TypesetError};
use crate::output::docx::html::{Block, Paragraph, Run, RunFormat, Table};
use crate::output::docx::DocumentMetadata;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Usable page width in twips (A4 minus 1" margins).
const TEXT_WIDTH_TWIPS: usize = 9026;
const INDENT_STEP_TWIPS: usize = 360;
/// Word refuses tables wider than 63 grid columns.
const MAX_GRID_COLUMNS: usize = 63;

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut out = Self {
            writer: Writer::new(Vec::new()),
        };
        out.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(out)
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| TypesetError::Conversion(format!("xml write failed: {}", e)))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.emit(Event::Start(element))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        let mut element = BytesStart::new(name);
        for attr in attrs {
            element.push_attribute(*attr);
        }
        self.emit(Event::Empty(element))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.emit(Event::Text(BytesText::new(text)))
    }

    fn text_element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// `word/document.xml` for the given blocks.
pub fn document_xml(blocks: &[Block]) -> Result<Vec<u8>> {
    let mut out = XmlOut::new()?;
    out.start("w:document", &[("xmlns:w", NS_W), ("xmlns:r", NS_R)])?;
    out.start("w:body", &[])?;

    for block in blocks {
        write_block(&mut out, block)?;
    }
    // A body must not end in a table, and an empty body still needs a paragraph.
    if !matches!(blocks.last(), Some(Block::Paragraph(_))) {
        write_paragraph(&mut out, &Paragraph::empty())?;
    }

    out.start("w:sectPr", &[])?;
    out.empty("w:pgSz", &[("w:w", "11906"), ("w:h", "16838")])?;
    out.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "720"),
            ("w:footer", "720"),
            ("w:gutter", "0"),
        ],
    )?;
    out.end("w:sectPr")?;

    out.end("w:body")?;
    out.end("w:document")?;
    Ok(out.finish())
}

fn write_block(out: &mut XmlOut, block: &Block) -> Result<()> {
    match block {
        Block::Paragraph(paragraph) => write_paragraph(out, paragraph),
        Block::Table(table) => write_table(out, table),
    }
}

fn write_paragraph(out: &mut XmlOut, paragraph: &Paragraph) -> Result<()> {
    out.start("w:p", &[])?;

    if paragraph.style.is_some() || paragraph.indent_level > 0 || paragraph.rule {
        out.start("w:pPr", &[])?;
        if let Some(style) = paragraph.style {
            out.empty("w:pStyle", &[("w:val", style)])?;
        }
        if paragraph.rule {
            out.start("w:pBdr", &[])?;
            out.empty(
                "w:bottom",
                &[("w:val", "single"), ("w:sz", "6"), ("w:space", "1"), ("w:color", "auto")],
            )?;
            out.end("w:pBdr")?;
        }
        if paragraph.indent_level > 0 {
            let left = (paragraph.indent_level * 2 * INDENT_STEP_TWIPS).to_string();
            let hanging = INDENT_STEP_TWIPS.to_string();
            out.empty("w:ind", &[("w:left", &left), ("w:hanging", &hanging)])?;
        }
        out.end("w:pPr")?;
    }

    for run in &paragraph.runs {
        match run {
            Run::Text { text, format } => write_run(out, text, format)?,
            Run::Break => {
                out.start("w:r", &[])?;
                out.empty("w:br", &[])?;
                out.end("w:r")?;
            }
        }
    }

    out.end("w:p")
}

fn write_run(out: &mut XmlOut, text: &str, format: &RunFormat) -> Result<()> {
    out.start("w:r", &[])?;

    if !format.is_plain() {
        out.start("w:rPr", &[])?;
        if format.code {
            out.empty(
                "w:rFonts",
                &[("w:ascii", "Consolas"), ("w:hAnsi", "Consolas"), ("w:cs", "Consolas")],
            )?;
        }
        if format.bold {
            out.empty("w:b", &[])?;
        }
        if format.italic {
            out.empty("w:i", &[])?;
        }
        if format.strike {
            out.empty("w:strike", &[])?;
        }
        if format.underline {
            out.empty("w:u", &[("w:val", "single")])?;
        }
        if format.superscript {
            out.empty("w:vertAlign", &[("w:val", "superscript")])?;
        } else if format.subscript {
            out.empty("w:vertAlign", &[("w:val", "subscript")])?;
        }
        out.end("w:rPr")?;
    }

    out.text_element("w:t", &[("xml:space", "preserve")], text)?;
    out.end("w:r")
}

fn write_table(out: &mut XmlOut, table: &Table) -> Result<()> {
    let columns = table.grid_columns().clamp(1, MAX_GRID_COLUMNS);
    let column_width = TEXT_WIDTH_TWIPS / columns;
    let column_width_str = column_width.to_string();

    out.start("w:tbl", &[])?;
    out.start("w:tblPr", &[])?;
    out.empty("w:tblStyle", &[("w:val", "TableGrid")])?;
    out.empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")])?;
    out.end("w:tblPr")?;

    out.start("w:tblGrid", &[])?;
    for _ in 0..columns {
        out.empty("w:gridCol", &[("w:w", &column_width_str)])?;
    }
    out.end("w:tblGrid")?;

    for row in &table.rows {
        out.start("w:tr", &[])?;
        let mut used = 0;
        for cell in row {
            let span = cell.col_span.min(columns - used.min(columns)).max(1);
            used += span;
            write_cell(out, &cell.blocks, span, column_width)?;
        }
        // Pad short rows so every row covers the full grid.
        while used < columns {
            used += 1;
            write_cell(out, &[], 1, column_width)?;
        }
        out.end("w:tr")?;
    }

    out.end("w:tbl")
}

fn write_cell(out: &mut XmlOut, blocks: &[Block], span: usize, column_width: usize) -> Result<()> {
    let width = (column_width * span).to_string();
    let span_str = span.to_string();

    out.start("w:tc", &[])?;
    out.start("w:tcPr", &[])?;
    out.empty("w:tcW", &[("w:w", &width), ("w:type", "dxa")])?;
    if span > 1 {
        out.empty("w:gridSpan", &[("w:val", &span_str)])?;
    }
    out.end("w:tcPr")?;

    for block in blocks {
        write_block(out, block)?;
    }
    if !matches!(blocks.last(), Some(Block::Paragraph(_))) {
        write_paragraph(out, &Paragraph::empty())?;
    }

    out.end("w:tc")
}

/// `docProps/core.xml` carrying the document metadata.
pub fn core_xml(metadata: &DocumentMetadata, timestamp: DateTime<Utc>) -> Result<Vec<u8>> {
    let stamp = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let keywords = metadata.keywords.join(", ");

    let mut out = XmlOut::new()?;
    out.start(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:dcmitype", "http://purl.org/dc/dcmitype/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    out.text_element("dc:title", &[], &metadata.title)?;
    out.text_element("dc:subject", &[], &metadata.subject)?;
    out.text_element("dc:creator", &[], &metadata.creator)?;
    out.text_element("cp:keywords", &[], &keywords)?;
    out.text_element("dc:description", &[], &metadata.description)?;
    out.text_element("cp:lastModifiedBy", &[], &metadata.creator)?;
    out.text_element("cp:revision", &[], "1")?;
    out.text_element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], &stamp)?;
    out.text_element("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], &stamp)?;
    out.end("cp:coreProperties")?;
    Ok(out.finish())
}
