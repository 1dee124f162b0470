//! Line-oriented block scanner emitting Confluence storage format.
//!
//! The scanner walks the document once, line by line, with a single line of
//! lookahead for table handling. Each line is offered to a fixed priority
//! chain of recognizers; the first one that accepts the line emits its
//! markup and consumes it. There is no parse tree, block structure lives in
//! one `BlockContext` value that tracks the currently open construct.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::inline::{convert_inline, escape_xml};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{DIAGRAM_(\d+)\}\}").unwrap());
static UNORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());
static ORDERED_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+(.*)$").unwrap());
static HORIZONTAL_RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:-{3,}|\*{3,}|_{3,})$").unwrap());

/// Kind of list currently being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }
}

/// The block construct currently open in the output.
///
/// A fence opened inside a list carries the list along in `resumed_list`;
/// the fence always wins while it is open and the list context comes back
/// when the fence closes, so items after the code macro continue the same
/// list.
#[derive(Debug)]
enum BlockContext {
    None,
    List(ListKind),
    Fence {
        language: String,
        buffer: String,
        resumed_list: Option<ListKind>,
    },
    Table,
}

/// Options controlling macro parameters in the emitted markup.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// `theme` parameter of emitted code macros.
    pub code_theme: String,
    /// `diagramWidth` parameter of emitted drawio macros.
    pub diagram_width: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            code_theme: crate::converter::DEFAULT_CODE_THEME.to_owned(),
            diagram_width: crate::converter::DEFAULT_DIAGRAM_WIDTH,
        }
    }
}

/// Scans a markdown document (with diagrams already extracted) into
/// Confluence storage format.
///
/// `diagrams` holds the encoded drawio document for each extracted diagram,
/// indexed by placeholder number; a `None` entry swallows its marker line.
pub struct StorageScanner<'a> {
    diagrams: &'a [Option<String>],
    options: &'a ScanOptions,
    context: BlockContext,
    output: String,
}

impl<'a> StorageScanner<'a> {
    #[must_use]
    pub fn new(diagrams: &'a [Option<String>], options: &'a ScanOptions) -> Self {
        Self {
            diagrams,
            options,
            context: BlockContext::None,
            output: String::with_capacity(4096),
        }
    }

    /// Scan `document` and return the storage format markup.
    pub fn scan(mut self, document: &str) -> String {
        let lines: Vec<&str> = document.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let next = lines.get(i + 1).copied();
            self.process_line(line, next);
        }
        self.finish()
    }

    /// Offer the line to each recognizer in priority order. Recognizers
    /// return `true` when they consumed the line.
    fn process_line(&mut self, line: &str, next: Option<&str>) {
        if self.try_diagram_placeholder(line) {
            return;
        }
        if self.try_fence_delimiter(line) {
            return;
        }
        if self.try_fence_content(line) {
            return;
        }
        if self.try_heading(line) {
            return;
        }
        if self.try_list_item(line) {
            return;
        }
        // Any other non-blank line ends an open list but is not consumed by
        // doing so; it falls through to the recognizers below.
        if matches!(self.context, BlockContext::List(_)) && !line.trim().is_empty() {
            self.close_open_list();
        }
        if self.try_blockquote(line) {
            return;
        }
        if self.try_horizontal_rule(line) {
            return;
        }
        if self.try_table_row(line, next) {
            return;
        }
        self.paragraph(line);
    }

    /// Close tags owed at end of document. A list carried across an
    /// unterminated fence still gets its closing tag; the fence buffer
    /// itself is dropped, and an open table is left as-is.
    fn finish(mut self) -> String {
        match self.context {
            BlockContext::List(kind)
            | BlockContext::Fence {
                resumed_list: Some(kind),
                ..
            } => {
                writeln!(self.output, "</{}>", kind.tag()).unwrap();
            }
            _ => {}
        }
        self.output
    }

    fn try_diagram_placeholder(&mut self, line: &str) -> bool {
        let Some(caps) = PLACEHOLDER_RE.captures(line) else {
            return false;
        };
        // A marker whose diagram has no encoding is swallowed whole so it
        // cannot leak into the page as literal text.
        if let Ok(index) = caps[1].parse::<usize>() {
            if let Some(xml) = self.diagrams.get(index).and_then(|xml| xml.as_deref()) {
                self.write_drawio_macro(index, xml);
            }
        }
        true
    }

    fn try_fence_delimiter(&mut self, line: &str) -> bool {
        if !line.starts_with("```") {
            return false;
        }
        match std::mem::replace(&mut self.context, BlockContext::None) {
            BlockContext::Fence {
                language,
                buffer,
                resumed_list,
            } => {
                self.write_code_macro(&language, &buffer);
                if let Some(kind) = resumed_list {
                    self.context = BlockContext::List(kind);
                }
            }
            previous => {
                let resumed_list = match previous {
                    BlockContext::List(kind) => Some(kind),
                    _ => None,
                };
                let language = line[3..].trim();
                self.context = BlockContext::Fence {
                    language: if language.is_empty() { "text" } else { language }.to_owned(),
                    buffer: String::new(),
                    resumed_list,
                };
            }
        }
        true
    }

    fn try_fence_content(&mut self, line: &str) -> bool {
        if let BlockContext::Fence { buffer, .. } = &mut self.context {
            buffer.push_str(line);
            buffer.push('\n');
            return true;
        }
        false
    }

    fn try_heading(&mut self, line: &str) -> bool {
        if !line.starts_with('#') {
            return false;
        }
        let level = line.chars().take_while(|&c| c == '#').count();
        if level > 6 {
            return false;
        }
        self.close_open_list();
        let text = convert_inline(line[level..].trim());
        writeln!(self.output, "<h{level}>{text}</h{level}>").unwrap();
        true
    }

    fn try_list_item(&mut self, line: &str) -> bool {
        let (kind, caps) = if let Some(caps) = UNORDERED_ITEM_RE.captures(line) {
            (ListKind::Unordered, caps)
        } else if let Some(caps) = ORDERED_ITEM_RE.captures(line) {
            (ListKind::Ordered, caps)
        } else {
            return false;
        };
        match self.context {
            BlockContext::List(open) if open == kind => {}
            _ => {
                self.close_open_list();
                writeln!(self.output, "<{}>", kind.tag()).unwrap();
                self.context = BlockContext::List(kind);
            }
        }
        writeln!(self.output, "<li>{}</li>", convert_inline(caps[1].trim())).unwrap();
        true
    }

    fn try_blockquote(&mut self, line: &str) -> bool {
        let Some(rest) = line.strip_prefix('>') else {
            return false;
        };
        writeln!(
            self.output,
            "<blockquote><p>{}</p></blockquote>",
            convert_inline(rest.trim())
        )
        .unwrap();
        true
    }

    fn try_horizontal_rule(&mut self, line: &str) -> bool {
        if !HORIZONTAL_RULE_RE.is_match(line) {
            return false;
        }
        self.output.push_str("<hr/>\n");
        true
    }

    fn try_table_row(&mut self, line: &str, next: Option<&str>) -> bool {
        if !is_table_row(line) {
            return false;
        }
        // Alignment separator rows carry no content.
        if line.contains("---") {
            return true;
        }
        if !matches!(self.context, BlockContext::Table) {
            self.output.push_str("<table><tbody>\n");
            self.context = BlockContext::Table;
        }
        self.output.push_str("<tr>\n");
        for cell in line.split('|').filter(|cell| !cell.trim().is_empty()) {
            writeln!(self.output, "<td>{}</td>", convert_inline(cell.trim())).unwrap();
        }
        self.output.push_str("</tr>\n");
        // One line of lookahead decides whether the wrapper closes here.
        if !next.is_some_and(is_table_row) {
            self.output.push_str("</tbody></table>\n");
            self.context = BlockContext::None;
        }
        true
    }

    fn paragraph(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        writeln!(self.output, "<p>{}</p>", convert_inline(line)).unwrap();
    }

    fn close_open_list(&mut self) {
        if let BlockContext::List(kind) = self.context {
            writeln!(self.output, "</{}>", kind.tag()).unwrap();
            self.context = BlockContext::None;
        }
    }

    fn write_code_macro(&mut self, language: &str, buffer: &str) {
        self.output
            .push_str("<ac:structured-macro ac:name=\"code\" ac:schema-version=\"1\">\n");
        writeln!(
            self.output,
            "  <ac:parameter ac:name=\"language\">{}</ac:parameter>",
            escape_xml(language)
        )
        .unwrap();
        writeln!(
            self.output,
            "  <ac:parameter ac:name=\"theme\">{}</ac:parameter>",
            escape_xml(&self.options.code_theme)
        )
        .unwrap();
        self.output
            .push_str("  <ac:parameter ac:name=\"linenumbers\">true</ac:parameter>\n");
        writeln!(
            self.output,
            "  <ac:plain-text-body><![CDATA[{}]]></ac:plain-text-body>",
            buffer.trim()
        )
        .unwrap();
        self.output.push_str("</ac:structured-macro>\n");
    }

    fn write_drawio_macro(&mut self, index: usize, xml: &str) {
        self.output
            .push_str("<ac:structured-macro ac:name=\"drawio\" ac:schema-version=\"1\">\n");
        writeln!(
            self.output,
            "  <ac:parameter ac:name=\"diagramName\">Diagram {}</ac:parameter>",
            index + 1
        )
        .unwrap();
        self.output
            .push_str("  <ac:parameter ac:name=\"simpleViewer\">false</ac:parameter>\n");
        self.output
            .push_str("  <ac:parameter ac:name=\"width\"></ac:parameter>\n");
        writeln!(
            self.output,
            "  <ac:parameter ac:name=\"diagramWidth\">{}</ac:parameter>",
            self.options.diagram_width
        )
        .unwrap();
        self.output
            .push_str("  <ac:parameter ac:name=\"revision\">1</ac:parameter>\n");
        writeln!(
            self.output,
            "  <ac:plain-text-body><![CDATA[{xml}]]></ac:plain-text-body>"
        )
        .unwrap();
        self.output.push_str("</ac:structured-macro>\n");
    }
}

/// A table row contains a pipe and its trimmed form starts with one.
fn is_table_row(line: &str) -> bool {
    line.contains('|') && line.trim_start().starts_with('|')
}
