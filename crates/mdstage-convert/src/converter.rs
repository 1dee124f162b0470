//! Document assembler tying extraction, encoding and scanning together.

use std::time::Duration;

use mdstage_diagrams::{
    DrawioEncoder, ExtractedDiagram, PreviewRequest, RenderedPreview, create_agent,
    extract_diagrams, render_all_partial,
};

use crate::artifact::GeneratedArtifact;
use crate::scanner::{ScanOptions, StorageScanner};

/// Default `theme` parameter for code macros.
pub const DEFAULT_CODE_THEME: &str = "midnight";

/// Default `diagramWidth` parameter for drawio macros.
pub const DEFAULT_DIAGRAM_WIDTH: u32 = 800;

/// Kroki endpoint used for optional SVG previews.
#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub kroki_url: String,
    pub timeout: Duration,
}

/// Result of converting one markdown document.
///
/// The value is complete when returned; nothing in it is written to disk
/// yet and no further mutation happens.
#[derive(Debug, Clone)]
pub struct ConvertResult {
    /// Confluence storage format markup.
    pub storage: String,
    /// Files to deliver: one `diagram-<n>.drawio` per encoded diagram,
    /// then the storage markup document.
    pub artifacts: Vec<GeneratedArtifact>,
    /// SVG previews for diagrams that rendered, empty when previews are
    /// disabled.
    pub previews: Vec<RenderedPreview>,
    /// Human-readable notes about diagrams that failed to encode or
    /// preview. Conversion itself never fails.
    pub warnings: Vec<String>,
}

/// Markdown to Confluence storage format converter.
///
/// # Example
///
/// ```
/// use mdstage_convert::StorageConverter;
///
/// let markdown = "# Title\n\n```mermaid\ngraph TD;\n  A-->B;\n```\n";
/// let result = StorageConverter::new().convert(markdown, "page");
///
/// assert!(result.storage.contains("<h1>Title</h1>"));
/// assert_eq!(result.artifacts.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct StorageConverter {
    code_theme: String,
    diagram_width: u32,
    preview: Option<PreviewSettings>,
    encoder: DrawioEncoder,
}

impl StorageConverter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_theme: DEFAULT_CODE_THEME.to_owned(),
            diagram_width: DEFAULT_DIAGRAM_WIDTH,
            preview: None,
            encoder: DrawioEncoder::new(),
        }
    }

    /// Set the `theme` parameter emitted in code macros.
    #[must_use]
    pub fn code_theme(mut self, theme: impl Into<String>) -> Self {
        self.code_theme = theme.into();
        self
    }

    /// Set the `diagramWidth` parameter emitted in drawio macros.
    #[must_use]
    pub fn diagram_width(mut self, width: u32) -> Self {
        self.diagram_width = width;
        self
    }

    /// Enable SVG previews via the given Kroki endpoint.
    #[must_use]
    pub fn preview(mut self, settings: PreviewSettings) -> Self {
        self.preview = Some(settings);
        self
    }

    /// Replace the drawio encoder, e.g. to pin its timestamp.
    #[must_use]
    pub fn encoder(mut self, encoder: DrawioEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Convert `markdown` into storage markup and artifacts.
    ///
    /// `basename` names the markup artifact (`<basename>-confluence.xml`),
    /// normally the input file's stem. Diagram failures never abort the
    /// conversion; they surface in [`ConvertResult::warnings`] and the
    /// affected placeholder is dropped from the page.
    #[must_use]
    pub fn convert(&self, markdown: &str, basename: &str) -> ConvertResult {
        let (stripped, extracted) = extract_diagrams(markdown);
        let mut warnings = Vec::new();

        let mut encoded: Vec<Option<String>> = Vec::with_capacity(extracted.len());
        for diagram in &extracted {
            match self.encoder.encode(&diagram.source, diagram.index) {
                Ok(xml) => encoded.push(Some(xml)),
                Err(error) => {
                    tracing::warn!(index = diagram.index, %error, "diagram encoding failed");
                    warnings.push(format!("diagram {}: {error}", diagram.index));
                    encoded.push(None);
                }
            }
        }

        let previews = self.render_previews(&extracted, &mut warnings);

        let options = ScanOptions {
            code_theme: self.code_theme.clone(),
            diagram_width: self.diagram_width,
        };
        let storage = StorageScanner::new(&encoded, &options).scan(&stripped);

        let mut artifacts = Vec::with_capacity(encoded.len() + 1);
        for (index, xml) in encoded.iter().enumerate() {
            if let Some(xml) = xml {
                artifacts.push(GeneratedArtifact::diagram(index, xml));
            }
        }
        artifacts.push(GeneratedArtifact::markup(basename, &storage));

        ConvertResult {
            storage,
            artifacts,
            previews,
            warnings,
        }
    }

    fn render_previews(
        &self,
        extracted: &[ExtractedDiagram],
        warnings: &mut Vec<String>,
    ) -> Vec<RenderedPreview> {
        let Some(settings) = &self.preview else {
            return Vec::new();
        };
        if extracted.is_empty() {
            return Vec::new();
        }

        let requests: Vec<PreviewRequest> = extracted
            .iter()
            .map(|diagram| PreviewRequest::new(diagram.index, diagram.source.clone()))
            .collect();
        let agent = create_agent(settings.timeout);
        let result = render_all_partial(&requests, &settings.kroki_url, &agent);

        for error in &result.errors {
            tracing::warn!(%error, "preview rendering failed");
            warnings.push(error.to_string());
        }
        result.rendered
    }
}

impl Default for StorageConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::artifact::ArtifactKind;

    use super::*;

    fn fixed_converter() -> StorageConverter {
        StorageConverter::new().encoder(DrawioEncoder::new().timestamp("2026-01-05T10:00:00.000Z"))
    }

    #[test]
    fn test_document_without_diagrams() {
        let result = fixed_converter().convert("# Title\n\nBody text.\n", "page");

        assert_eq!(result.storage, "<h1>Title</h1>\n<p>Body text.</p>\n");
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].name, "page-confluence.xml");
        assert_eq!(result.artifacts[0].kind, ArtifactKind::Markup);
        assert!(result.previews.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_diagram_produces_artifact_and_macro() {
        let markdown = "# Arch\n\n```mermaid\ngraph TD;\n  A-->B;\n```\n";
        let result = fixed_converter().convert(markdown, "arch");

        assert_eq!(result.artifacts.len(), 2);
        assert_eq!(result.artifacts[0].name, "diagram-1.drawio");
        assert_eq!(result.artifacts[0].kind, ArtifactKind::Diagram);
        assert_eq!(result.artifacts[1].name, "arch-confluence.xml");

        assert_eq!(result.storage.matches(r#"ac:name="drawio""#).count(), 1);
        assert!(result.storage.contains("Diagram 1"));
        assert!(result.storage.contains("shape=mxgraph.mermaid"));
        assert!(!result.storage.contains("{{DIAGRAM_0}}"));
    }

    #[test]
    fn test_markup_artifact_matches_storage() {
        let result = fixed_converter().convert("plain\n", "doc");

        let markup = result.artifacts.last().unwrap();
        assert_eq!(markup.content, result.storage.as_bytes());
    }

    #[test]
    fn test_multiple_diagrams_keep_positions() {
        let markdown = "```mermaid\nfirst\n```\n\nmiddle\n\n```mermaid\nsecond\n```\n";
        let result = fixed_converter().convert(markdown, "multi");

        assert_eq!(result.artifacts[0].name, "diagram-1.drawio");
        assert_eq!(result.artifacts[1].name, "diagram-2.drawio");
        let one = result.storage.find("Diagram 1").unwrap();
        let two = result.storage.find("Diagram 2").unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_theme_and_width_options_flow_through() {
        let markdown = "```sh\nls\n```\n\n```mermaid\ngraph TD;\n```\n";
        let result = fixed_converter()
            .code_theme("emacs")
            .diagram_width(1200)
            .convert(markdown, "opts");

        assert!(result.storage.contains(r#"<ac:parameter ac:name="theme">emacs</ac:parameter>"#));
        assert!(
            result
                .storage
                .contains(r#"<ac:parameter ac:name="diagramWidth">1200</ac:parameter>"#)
        );
    }

    #[test]
    fn test_diagram_sources_embed_in_artifacts() {
        let markdown = "```mermaid\nsequenceDiagram\n  A->>B: ping\n```\n";
        let result = fixed_converter().convert(markdown, "seq");

        let xml = String::from_utf8(result.artifacts[0].content.clone()).unwrap();
        assert!(xml.contains("sequenceDiagram"));
        assert!(xml.starts_with("<?xml"));
    }
}
