//! SVG preview rendering via a Kroki service.
//!
//! Previews are a proofreading aid: Confluence renders the drawio macros
//! itself, so nothing in the conversion depends on this module. Rendering
//! happens in parallel on the global rayon pool and failures stay scoped to
//! the individual diagram, callers get every preview that did render.

use rayon::prelude::*;
use std::time::Duration;
use ureq::Agent;

/// One diagram submitted for preview rendering.
#[derive(Debug)]
pub struct PreviewRequest {
    pub index: usize,
    pub source: String,
}

impl PreviewRequest {
    #[must_use]
    pub fn new(index: usize, source: String) -> Self {
        Self { index, source }
    }
}

/// Successfully rendered preview.
#[derive(Debug, Clone)]
pub struct RenderedPreview {
    /// Index matching the original request.
    pub index: usize,
    /// SVG document as a string.
    pub svg: String,
}

/// Preview failure for a single diagram.
#[derive(Debug, thiserror::Error)]
#[error("diagram {index}: {kind}")]
pub struct PreviewError {
    pub index: usize,
    pub kind: PreviewErrorKind,
}

/// Kind of preview rendering error.
#[derive(Debug, thiserror::Error)]
pub enum PreviewErrorKind {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result of rendering previews with partial failures.
#[derive(Debug)]
pub struct PartialPreviewResult {
    /// Previews that rendered successfully.
    pub rendered: Vec<RenderedPreview>,
    /// Errors for diagrams that failed.
    pub errors: Vec<PreviewError>,
}

/// Create HTTP agent with the specified timeout.
///
/// Use this to create a reusable agent for connection pooling when making
/// multiple render calls.
#[must_use]
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Kroki endpoint for mermaid SVG rendering.
fn endpoint_url(server_url: &str) -> String {
    format!("{}/mermaid/svg", server_url.trim_end_matches('/'))
}

/// Render a single preview, reading the response body for error details on
/// non-success statuses.
fn render_one(
    agent: &Agent,
    request: &PreviewRequest,
    server_url: &str,
) -> Result<RenderedPreview, PreviewError> {
    let url = endpoint_url(server_url);

    let response = agent
        .post(&url)
        .header("Content-Type", "text/plain")
        .send(request.source.as_bytes())
        .map_err(|e| PreviewError {
            index: request.index,
            kind: PreviewErrorKind::Http(e.to_string()),
        })?;

    let status = response.status().as_u16();
    let mut body = response.into_body();

    if status >= 400 {
        let error_body = body
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read error body)"));
        return Err(PreviewError {
            index: request.index,
            kind: PreviewErrorKind::Http(format!("HTTP {status}: {error_body}")),
        });
    }

    let svg = body.read_to_string().map_err(|e| PreviewError {
        index: request.index,
        kind: PreviewErrorKind::Io(e.to_string()),
    })?;

    Ok(RenderedPreview {
        index: request.index,
        svg,
    })
}

/// Render all previews in parallel, returning partial results on failure.
///
/// Uses the global rayon thread pool. Successfully rendered previews are
/// returned even when some diagrams fail.
#[must_use]
pub fn render_all_partial(
    requests: &[PreviewRequest],
    server_url: &str,
    agent: &Agent,
) -> PartialPreviewResult {
    if requests.is_empty() {
        return PartialPreviewResult {
            rendered: Vec::new(),
            errors: Vec::new(),
        };
    }

    let server_url = server_url.trim_end_matches('/');

    let results: Vec<Result<RenderedPreview, PreviewError>> = requests
        .par_iter()
        .map(|r| render_one(agent, r, server_url))
        .collect();

    let mut rendered = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(preview) => rendered.push(preview),
            Err(error) => errors.push(error),
        }
    }

    PartialPreviewResult { rendered, errors }
}
