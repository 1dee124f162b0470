//! Internal constants for diagram handling.

/// Host recorded in the mxfile header, matching files saved by the
/// diagrams.net web editor.
pub const DRAWIO_HOST: &str = "app.diagrams.net";

/// drawio format version recorded in the mxfile header.
pub const DRAWIO_VERSION: &str = "21.0.0";

/// Cell style selecting the mermaid shape of the drawio mermaid plugin.
/// The plugin re-renders the cell from the mermaid source in its `value`
/// attribute, so no layout information is needed.
pub const MERMAID_SHAPE_STYLE: &str =
    "shape=mxgraph.mermaid;html=1;whiteSpace=wrap;fillColor=#ffffff;strokeColor=#000000;";
