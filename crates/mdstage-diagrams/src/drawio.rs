//! draw.io mxfile encoding for mermaid sources.
//!
//! Confluence's drawio plugin renders mermaid natively when the diagram file
//! contains a cell styled with `shape=mxgraph.mermaid` whose `value`
//! attribute holds the mermaid source. The encoder therefore embeds the
//! source verbatim inside a fixed single-page document skeleton; no layout
//! is computed here, the plugin does that at view time.

use chrono::{SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::consts::{DRAWIO_HOST, DRAWIO_VERSION, MERMAID_SHAPE_STYLE};

/// Error produced while serializing an mxfile document.
///
/// Malformed mermaid syntax is never an error at this level; the source is
/// carried as opaque text.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to write drawio XML: {0}")]
    Write(#[from] std::io::Error),
    #[error("drawio XML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encoder for draw.io mxfile documents with an embedded mermaid cell.
///
/// The defaults match files produced by the diagrams.net web editor. The
/// `modified` header normally carries the encoding time; pin it with
/// [`DrawioEncoder::timestamp`] when byte-stable output is needed.
#[derive(Debug, Clone)]
pub struct DrawioEncoder {
    host: String,
    agent: String,
    version: String,
    timestamp: Option<String>,
}

impl DrawioEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DRAWIO_HOST.to_owned(),
            agent: "mdstage".to_owned(),
            version: DRAWIO_VERSION.to_owned(),
            timestamp: None,
        }
    }

    /// Override the `host` header attribute.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the `agent` header attribute.
    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    /// Override the drawio format version recorded in the header.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Pin the `modified` timestamp instead of using the current time.
    #[must_use]
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Encode one mermaid source as a complete mxfile document.
    ///
    /// `index` is the diagram's zero-based position in the source document;
    /// it determines the page name (`Diagram {index + 1}`) and the cell ids.
    pub fn encode(&self, source: &str, index: usize) -> Result<String, EncodeError> {
        let modified = self
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        let diagram_name = format!("Diagram {}", index + 1);
        let diagram_id = format!("diagram-{index}");
        let cell_id = format!("mermaid-{index}");

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut mxfile = BytesStart::new("mxfile");
        mxfile.push_attribute(("host", self.host.as_str()));
        mxfile.push_attribute(("modified", modified.as_str()));
        mxfile.push_attribute(("agent", self.agent.as_str()));
        mxfile.push_attribute(("version", self.version.as_str()));
        mxfile.push_attribute(("type", "device"));
        writer.write_event(Event::Start(mxfile))?;

        let mut diagram = BytesStart::new("diagram");
        diagram.push_attribute(("name", diagram_name.as_str()));
        diagram.push_attribute(("id", diagram_id.as_str()));
        writer.write_event(Event::Start(diagram))?;

        let mut model = BytesStart::new("mxGraphModel");
        for (key, value) in [
            ("dx", "1434"),
            ("dy", "780"),
            ("grid", "1"),
            ("gridSize", "10"),
            ("guides", "1"),
            ("tooltips", "1"),
            ("connect", "1"),
            ("arrows", "1"),
            ("fold", "1"),
            ("page", "1"),
            ("pageScale", "1"),
            ("pageWidth", "850"),
            ("pageHeight", "1100"),
            ("math", "0"),
            ("shadow", "0"),
        ] {
            model.push_attribute((key, value));
        }
        writer.write_event(Event::Start(model))?;
        writer.write_event(Event::Start(BytesStart::new("root")))?;

        let mut layer_root = BytesStart::new("mxCell");
        layer_root.push_attribute(("id", "0"));
        writer.write_event(Event::Empty(layer_root))?;

        let mut layer = BytesStart::new("mxCell");
        layer.push_attribute(("id", "1"));
        layer.push_attribute(("parent", "0"));
        writer.write_event(Event::Empty(layer))?;

        // Attribute values are XML-escaped by the writer, so the mermaid
        // source survives embedding byte for byte.
        let mut shape = BytesStart::new("mxCell");
        shape.push_attribute(("id", cell_id.as_str()));
        shape.push_attribute(("value", source));
        shape.push_attribute(("style", MERMAID_SHAPE_STYLE));
        shape.push_attribute(("vertex", "1"));
        shape.push_attribute(("parent", "1"));
        writer.write_event(Event::Start(shape))?;

        let mut geometry = BytesStart::new("mxGeometry");
        for (key, value) in [
            ("x", "40"),
            ("y", "40"),
            ("width", "770"),
            ("height", "600"),
            ("as", "geometry"),
        ] {
            geometry.push_attribute((key, value));
        }
        writer.write_event(Event::Empty(geometry))?;

        writer.write_event(Event::End(BytesEnd::new("mxCell")))?;
        writer.write_event(Event::End(BytesEnd::new("root")))?;
        writer.write_event(Event::End(BytesEnd::new("mxGraphModel")))?;
        writer.write_event(Event::End(BytesEnd::new("diagram")))?;
        writer.write_event(Event::End(BytesEnd::new("mxfile")))?;

        Ok(String::from_utf8(writer.into_inner())?)
    }
}

impl Default for DrawioEncoder {
    fn default() -> Self {
        Self::new()
    }
}
