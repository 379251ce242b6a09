//! Mermaid diagram emission
//!
//! Diagrams are accumulated statement by statement and rendered once; the
//! rendered order always matches insertion order.

pub mod flowchart;
pub mod sequence;
pub mod xychart;

pub use flowchart::{Direction, EdgeKind, Flowchart, Shape, Style};
pub use sequence::{Arrow, SequenceDiagram};
pub use xychart::XyChart;

use serde::Serialize;

/// A rendered-on-demand diagram attached to a report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Diagram {
    Flowchart { heading: String, chart: Flowchart },
    Sequence { heading: String, chart: SequenceDiagram },
    Chart { heading: String, chart: XyChart },
}

impl Diagram {
    pub fn heading(&self) -> &str {
        match self {
            Diagram::Flowchart { heading, .. }
            | Diagram::Sequence { heading, .. }
            | Diagram::Chart { heading, .. } => heading,
        }
    }

    /// Mermaid source without fences
    pub fn source(&self) -> String {
        match self {
            Diagram::Flowchart { chart, .. } => chart.render(),
            Diagram::Sequence { chart, .. } => chart.render(),
            Diagram::Chart { chart, .. } => chart.render(),
        }
    }

    /// Heading plus a fenced mermaid block
    pub fn render(&self) -> String {
        format!("{}:\n```mermaid\n{}```\n", self.heading(), self.source())
    }

    pub fn as_flowchart(&self) -> Option<&Flowchart> {
        match self {
            Diagram::Flowchart { chart, .. } => Some(chart),
            _ => None,
        }
    }
}

/// Make a string usable as a mermaid identifier.
///
/// Characters outside `[A-Za-z0-9_]` become `_`; the result is never empty
/// and never starts with a digit.
pub fn safe_id(raw: &str) -> String {
    let mut id: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if id.is_empty() {
        id.push_str("node");
    }
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert_str(0, "n_");
    }
    id
}

/// Escape text placed inside a quoted node label
pub fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

/// Escape text placed between `|` delimiters on an edge
pub fn escape_edge_label(text: &str) -> String {
    text.replace('|', "/").replace('"', "#quot;")
}
