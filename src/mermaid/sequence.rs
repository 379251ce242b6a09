//! Sequence diagrams

use super::safe_id;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arrow {
    /// Request
    Solid,
    /// Response
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Step {
    Participant { id: String, alias: String },
    Message { from: String, to: String, label: String, arrow: Arrow },
    Note { over: Vec<String>, text: String },
}

/// Ordered sequence of participants, messages and notes
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SequenceDiagram {
    steps: Vec<Step>,
}

impl SequenceDiagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a participant and return its sanitized id
    pub fn participant(&mut self, id: &str, alias: &str) -> String {
        let id = safe_id(id);
        self.steps.push(Step::Participant {
            id: id.clone(),
            alias: alias.replace(['\n', ':', ';'], " "),
        });
        id
    }

    pub fn message(&mut self, from: &str, to: &str, label: &str, arrow: Arrow) {
        self.steps.push(Step::Message {
            from: from.to_string(),
            to: to.to_string(),
            label: label.replace(['\n', ';'], " "),
            arrow,
        });
    }

    pub fn note_over(&mut self, over: &[&str], text: &str) {
        self.steps.push(Step::Note {
            over: over.iter().map(|s| s.to_string()).collect(),
            text: text.replace(['\n', ';'], " "),
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::from("sequenceDiagram\n");
        for step in &self.steps {
            match step {
                Step::Participant { id, alias } => {
                    let _ = writeln!(out, "    participant {} as {}", id, alias);
                }
                Step::Message { from, to, label, arrow } => {
                    let arrow = match arrow {
                        Arrow::Solid => "->>",
                        Arrow::Dotted => "-->>",
                    };
                    let _ = writeln!(out, "    {}{}{}: {}", from, arrow, to, label);
                }
                Step::Note { over, text } => {
                    let _ = writeln!(out, "    Note over {}: {}", over.join(","), text);
                }
            }
        }
        out
    }
}
