//! Flowchart (graph) diagrams

use super::{escape_edge_label, escape_label, safe_id};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    TopBottom,
    LeftRight,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::TopBottom => "TB",
            Direction::LeftRight => "LR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Rect,
    Round,
    Stadium,
    Circle,
    Diamond,
    /// Trapezoid with the wide side on top
    TrapAlt,
}

impl Shape {
    fn wrap(&self, label: &str) -> String {
        match self {
            Shape::Rect => format!("[\"{}\"]", label),
            Shape::Round => format!("(\"{}\")", label),
            Shape::Stadium => format!("([\"{}\"])", label),
            Shape::Circle => format!("((\"{}\"))", label),
            Shape::Diamond => format!("{{\"{}\"}}", label),
            Shape::TrapAlt => format!("[\\\"{}\"/]", label),
        }
    }
}

/// Visual class applied to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Healthy,
    Warning,
    Critical,
    Info,
    External,
}

impl Style {
    pub fn class_name(&self) -> &'static str {
        match self {
            Style::Healthy => "healthy",
            Style::Warning => "warning",
            Style::Critical => "critical",
            Style::Info => "info",
            Style::External => "external",
        }
    }

    fn class_def(&self) -> &'static str {
        match self {
            Style::Healthy => "fill:#d4edda,stroke:#28a745,color:#155724",
            Style::Warning => "fill:#fff3cd,stroke:#ffc107,color:#856404",
            Style::Critical => "fill:#f8d7da,stroke:#dc3545,color:#721c24",
            Style::Info => "fill:#d1ecf1,stroke:#17a2b8,color:#0c5460",
            Style::External => "fill:#e2e3e5,stroke:#6c757d,color:#383d41",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Traffic that is allowed or forwarded
    Solid,
    /// Denied, restricted or inferred relationships
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub shape: Shape,
    pub style: Option<Style>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
enum Stmt {
    Node(usize),
    Edge(usize),
    SubgraphStart { id: String, title: String },
    SubgraphEnd,
}

/// Ordered flowchart accumulator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flowchart {
    direction: Direction,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    stmts: Vec<Stmt>,
    #[serde(skip)]
    keys: BTreeMap<String, String>,
    #[serde(skip)]
    used_ids: BTreeSet<String>,
}

impl Flowchart {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            nodes: Vec::new(),
            edges: Vec::new(),
            stmts: Vec::new(),
            keys: BTreeMap::new(),
            used_ids: BTreeSet::new(),
        }
    }

    /// Declare a node identified by `key`, returning its diagram id.
    ///
    /// Declaring the same key twice returns the existing id without a second
    /// declaration. Distinct keys that sanitize to the same id get a numeric suffix.
    pub fn add_node(&mut self, key: &str, label: &str, shape: Shape) -> String {
        if let Some(id) = self.keys.get(key) {
            return id.clone();
        }
        let id = self.allocate_id(key);
        self.keys.insert(key.to_string(), id.clone());
        self.nodes.push(Node {
            id: id.clone(),
            label: label.to_string(),
            shape,
            style: None,
        });
        self.stmts.push(Stmt::Node(self.nodes.len() - 1));
        id
    }

    pub fn add_styled_node(&mut self, key: &str, label: &str, shape: Shape, style: Style) -> String {
        let id = self.add_node(key, label, shape);
        self.set_style(&id, style);
        id
    }

    pub fn set_style(&mut self, id: &str, style: Style) {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.style = Some(style);
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str, label: Option<&str>, kind: EdgeKind) {
        self.edges.push(Edge {
            from: from.to_string(),
            to: to.to_string(),
            label: label.filter(|l| !l.is_empty()).map(str::to_string),
            kind,
        });
        self.stmts.push(Stmt::Edge(self.edges.len() - 1));
    }

    pub fn link(&mut self, from: &str, to: &str) {
        self.add_edge(from, to, None, EdgeKind::Solid);
    }

    pub fn begin_subgraph(&mut self, key: &str, title: &str) {
        let id = self.allocate_id(&format!("sg_{}", key));
        self.stmts.push(Stmt::SubgraphStart {
            id,
            title: title.to_string(),
        });
    }

    pub fn end_subgraph(&mut self) {
        self.stmts.push(Stmt::SubgraphEnd);
    }

    pub fn node_id(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn allocate_id(&mut self, key: &str) -> String {
        let base = safe_id(key);
        let mut id = base.clone();
        let mut n = 2;
        while self.used_ids.contains(&id) {
            id = format!("{}_{}", base, n);
            n += 1;
        }
        self.used_ids.insert(id.clone());
        id
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "flowchart {}", self.direction.as_str());
        let mut depth = 1usize;

        for stmt in &self.stmts {
            let indent = "    ".repeat(depth);
            match stmt {
                Stmt::Node(i) => {
                    let node = &self.nodes[*i];
                    let class = node
                        .style
                        .map(|s| format!(":::{}", s.class_name()))
                        .unwrap_or_default();
                    let _ = writeln!(
                        out,
                        "{}{}{}{}",
                        indent,
                        node.id,
                        node.shape.wrap(&escape_label(&node.label)),
                        class
                    );
                }
                Stmt::Edge(i) => {
                    let edge = &self.edges[*i];
                    let arrow = match edge.kind {
                        EdgeKind::Solid => "-->",
                        EdgeKind::Dotted => "-.->",
                    };
                    match &edge.label {
                        Some(label) => {
                            let _ = writeln!(
                                out,
                                "{}{} {}|{}| {}",
                                indent,
                                edge.from,
                                arrow,
                                escape_edge_label(label),
                                edge.to
                            );
                        }
                        None => {
                            let _ = writeln!(out, "{}{} {} {}", indent, edge.from, arrow, edge.to);
                        }
                    }
                }
                Stmt::SubgraphStart { id, title } => {
                    let _ = writeln!(out, "{}subgraph {}[\"{}\"]", indent, id, escape_label(title));
                    depth += 1;
                }
                Stmt::SubgraphEnd => {
                    depth = depth.saturating_sub(1).max(1);
                    let _ = writeln!(out, "{}end", "    ".repeat(depth));
                }
            }
        }

        let used: BTreeSet<Style> = self.nodes.iter().filter_map(|n| n.style).collect();
        for style in used {
            let _ = writeln!(out, "    classDef {} {}", style.class_name(), style.class_def());
        }
        out
    }
}
