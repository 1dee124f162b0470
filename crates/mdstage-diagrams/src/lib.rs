//! Mermaid diagram handling for mdstage.
//!
//! This crate covers everything diagram-shaped in the pipeline:
//! - Extraction of ` ```mermaid ` fenced blocks from markdown, leaving
//!   numbered placeholder markers behind
//! - Encoding of mermaid sources as draw.io mxfile XML documents that the
//!   Confluence drawio plugin renders natively
//! - Optional SVG previews rendered in parallel via a Kroki service
//!
//! # Architecture
//!
//! The crate is organized into modules:
//! - `extract`: fence extraction and placeholder markers ([`extract_diagrams`])
//! - `drawio`: mxfile XML encoding ([`DrawioEncoder`])
//! - `preview`: parallel HTTP rendering via Kroki ([`render_all_partial`])

mod consts;
mod drawio;
mod extract;
mod preview;

pub use drawio::{DrawioEncoder, EncodeError};
pub use extract::{ExtractedDiagram, diagram_placeholder, extract_diagrams};
pub use preview::{
    PartialPreviewResult, PreviewError, PreviewErrorKind, PreviewRequest, RenderedPreview,
    create_agent, render_all_partial,
};
