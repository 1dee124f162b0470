//! Extraction of mermaid fenced blocks from markdown.
//!
//! Diagram blocks are pulled out of the document before block scanning and
//! replaced with numbered placeholder markers. Indices are assigned in order
//! of appearance, so every downstream consumer (encoder, previews, the
//! scanner resolving markers back into macros) agrees on which diagram is
//! which.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Matches a ` ```mermaid ` fence through its closing backticks. The info
/// string must be exactly `mermaid`; other languages stay in the document
/// for the block scanner to handle as plain code fences.
static MERMAID_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```mermaid\s*\r?\n(.*?)```").unwrap());

/// A diagram block lifted out of the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDiagram {
    /// Zero-based position among all extracted diagrams.
    pub index: usize,
    /// Diagram source with surrounding whitespace trimmed.
    pub source: String,
}

/// Placeholder marker left in the document for diagram `index`.
#[must_use]
pub fn diagram_placeholder(index: usize) -> String {
    format!("{{{{DIAGRAM_{index}}}}}")
}

/// Extract all mermaid fenced blocks from `markdown`.
///
/// Returns the document with each block replaced by a placeholder marker,
/// plus the extracted diagrams in order of appearance. The marker is padded
/// with blank lines so it always sits on a line of its own for the scanner.
/// A document without diagram blocks is returned unchanged.
#[must_use]
pub fn extract_diagrams(markdown: &str) -> (String, Vec<ExtractedDiagram>) {
    let mut diagrams = Vec::new();

    let stripped = MERMAID_FENCE_RE.replace_all(markdown, |caps: &Captures| {
        let index = diagrams.len();
        diagrams.push(ExtractedDiagram {
            index,
            source: caps[1].trim().to_owned(),
        });
        format!("\n\n{}\n\n", diagram_placeholder(index))
    });

    (stripped.into_owned(), diagrams)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extracts_single_diagram() {
        let markdown = "# Title\n\n```mermaid\ngraph TD;\n  A-->B;\n```\n\nDone.";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert_eq!(diagrams.len(), 1);
        assert_eq!(diagrams[0].index, 0);
        assert_eq!(diagrams[0].source, "graph TD;\n  A-->B;");
        assert!(stripped.contains("{{DIAGRAM_0}}"));
        assert!(!stripped.contains("```mermaid"));
    }

    #[test]
    fn test_indices_follow_order_of_appearance() {
        let markdown = "```mermaid\nfirst\n```\n\ntext\n\n```mermaid\nsecond\n```\n";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert_eq!(diagrams.len(), 2);
        assert_eq!(diagrams[0].source, "first");
        assert_eq!(diagrams[1].source, "second");
        assert!(
            stripped.find("{{DIAGRAM_0}}").unwrap() < stripped.find("{{DIAGRAM_1}}").unwrap()
        );
    }

    #[test]
    fn test_marker_sits_on_its_own_line() {
        let markdown = "before\n```mermaid\ngraph TD;\n```\nafter";
        let (stripped, _) = extract_diagrams(markdown);

        assert!(stripped.lines().any(|line| line == "{{DIAGRAM_0}}"));
    }

    #[test]
    fn test_document_without_diagrams_is_unchanged() {
        let markdown = "# Title\n\n```rust\nfn main() {}\n```\n\nParagraph.\n";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert_eq!(stripped, markdown);
        assert!(diagrams.is_empty());
    }

    #[test]
    fn test_handles_crlf_line_endings() {
        let markdown = "```mermaid\r\nsequenceDiagram\r\n  A->>B: hi\r\n```\r\n";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert_eq!(diagrams.len(), 1);
        assert_eq!(diagrams[0].source, "sequenceDiagram\r\n  A->>B: hi");
        assert!(stripped.contains("{{DIAGRAM_0}}"));
    }

    #[test]
    fn test_trailing_whitespace_after_info_string() {
        let markdown = "```mermaid  \ngraph LR;\n```\n";
        let (_, diagrams) = extract_diagrams(markdown);

        assert_eq!(diagrams.len(), 1);
        assert_eq!(diagrams[0].source, "graph LR;");
    }

    #[test]
    fn test_other_info_strings_are_left_alone() {
        let markdown = "```mermaidjs\ngraph TD;\n```\n";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert!(diagrams.is_empty());
        assert_eq!(stripped, markdown);
    }

    #[test]
    fn test_unterminated_fence_is_left_alone() {
        let markdown = "```mermaid\ngraph TD;\n  A-->B;\n";
        let (stripped, diagrams) = extract_diagrams(markdown);

        assert!(diagrams.is_empty());
        assert_eq!(stripped, markdown);
    }

    #[test]
    fn test_diagram_source_is_trimmed() {
        let markdown = "```mermaid\n\n  graph TD;\n\n```\n";
        let (_, diagrams) = extract_diagrams(markdown);

        assert_eq!(diagrams[0].source, "graph TD;");
    }

    #[test]
    fn test_placeholder_format() {
        assert_eq!(diagram_placeholder(0), "{{DIAGRAM_0}}");
        assert_eq!(diagram_placeholder(12), "{{DIAGRAM_12}}");
    }
}
