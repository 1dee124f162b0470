//! Markdown to Confluence storage format conversion.
//!
//! The pipeline runs in three steps:
//! - mermaid fences are extracted and replaced with placeholder markers
//!   (`mdstage-diagrams`)
//! - each diagram source is encoded as a drawio mxfile document
//! - the remaining document is scanned line by line into storage markup,
//!   resolving each marker into a drawio macro with the encoded XML inline
//!
//! There is deliberately no markdown parse tree anywhere: the scanner is a
//! single pass over lines with one line of lookahead, which covers the
//! block constructs Confluence pages actually use.
//!
//! # Architecture
//!
//! - `inline`: XML escaping and inline span conversion
//! - `scanner`: block recognizers and markup emission ([`StorageScanner`])
//! - `converter`: the assembler ([`StorageConverter`]) producing a
//!   [`ConvertResult`] with storage markup, artifacts and previews
//! - `artifact`: output file descriptions ([`GeneratedArtifact`])

mod artifact;
mod converter;
mod inline;
mod scanner;

pub use artifact::{ArtifactKind, GeneratedArtifact};
pub use converter::{
    ConvertResult, DEFAULT_CODE_THEME, DEFAULT_DIAGRAM_WIDTH, PreviewSettings, StorageConverter,
};
pub use inline::{convert_inline, escape_xml};
pub use scanner::{ScanOptions, StorageScanner};

pub use mdstage_diagrams::RenderedPreview;
