//! Output artifacts produced by a conversion.

/// What an artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// A drawio diagram document.
    Diagram,
    /// The Confluence storage format document.
    Markup,
}

/// A named output file, not yet written anywhere.
///
/// The converter never touches the filesystem; delivering artifacts (to a
/// directory, stdout, wherever) is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// File name relative to the output directory.
    pub name: String,
    pub content: Vec<u8>,
    pub kind: ArtifactKind,
}

impl GeneratedArtifact {
    /// Diagram artifact for the zero-based `index`; file names are 1-based.
    #[must_use]
    pub fn diagram(index: usize, xml: &str) -> Self {
        Self {
            name: format!("diagram-{}.drawio", index + 1),
            content: xml.as_bytes().to_vec(),
            kind: ArtifactKind::Diagram,
        }
    }

    /// Storage markup artifact named after the input file's stem.
    #[must_use]
    pub fn markup(basename: &str, storage: &str) -> Self {
        Self {
            name: format!("{basename}-confluence.xml"),
            content: storage.as_bytes().to_vec(),
            kind: ArtifactKind::Markup,
        }
    }
}
