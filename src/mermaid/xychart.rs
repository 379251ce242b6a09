//! Bar/line charts (`xychart-beta`)

use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XyChart {
    pub title: String,
    pub x_labels: Vec<String>,
    pub y_title: String,
    pub y_min: f64,
    pub y_max: f64,
    pub bars: Vec<f64>,
    /// Optional horizontal threshold drawn as a line across every bar
    pub threshold: Option<f64>,
}

impl XyChart {
    pub fn new(title: impl Into<String>, y_title: impl Into<String>, y_min: f64, y_max: f64) -> Self {
        Self {
            title: title.into(),
            x_labels: Vec::new(),
            y_title: y_title.into(),
            y_min,
            y_max,
            bars: Vec::new(),
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, value: f64) -> Self {
        self.threshold = Some(value);
        self
    }

    pub fn bar(&mut self, label: impl Into<String>, value: f64) {
        self.x_labels.push(label.into().replace('"', "'"));
        self.bars.push(value);
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("xychart-beta\n");
        let _ = writeln!(out, "    title \"{}\"", self.title);
        let labels: Vec<String> = self.x_labels.iter().map(|l| format!("\"{}\"", l)).collect();
        let _ = writeln!(out, "    x-axis [{}]", labels.join(", "));
        let _ = writeln!(
            out,
            "    y-axis \"{}\" {} --> {}",
            self.y_title,
            fmt_num(self.y_min),
            fmt_num(self.y_max)
        );
        let bars: Vec<String> = self.bars.iter().map(|v| fmt_num(*v)).collect();
        let _ = writeln!(out, "    bar [{}]", bars.join(", "));
        if let Some(t) = self.threshold {
            let line: Vec<String> = self.bars.iter().map(|_| fmt_num(t)).collect();
            let _ = writeln!(out, "    line [{}]", line.join(", "));
        }
        out
    }
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.1}", v)
    }
}
