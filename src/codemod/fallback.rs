//! Copy-paste snippets shown when a file cannot be edited automatically.

use similar::{ChangeTag, TextDiff};

use crate::options::RenderStyle;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnippetLine {
    Unchanged(String),
    Added(String),
    Removed(String),
}

/// A diff-style code block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    pub lines: Vec<SnippetLine>,
}

impl Snippet {
    /// Line diff between the file before and after the edit
    pub fn from_diff(before: &str, after: &str) -> Self {
        let diff = TextDiff::from_lines(before, after);
        let lines = diff
            .iter_all_changes()
            .map(|change| {
                let text = change.value().trim_end_matches(['\r', '\n']).to_string();
                match change.tag() {
                    ChangeTag::Equal => SnippetLine::Unchanged(text),
                    ChangeTag::Insert => SnippetLine::Added(text),
                    ChangeTag::Delete => SnippetLine::Removed(text),
                }
            })
            .collect();
        Self { lines }
    }

    /// Every line is new code, for when there is no "before" to diff against
    pub fn added(code: &str) -> Self {
        Self {
            lines: code.lines().map(|l| SnippetLine::Added(l.to_string())).collect(),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.lines
            .iter()
            .any(|line| !matches!(line, SnippetLine::Unchanged(_)))
    }

    /// `+`/`-`/` ` markers, coloured when asked to
    pub fn render(&self, style: RenderStyle) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let (marker, color, text) = match line {
                SnippetLine::Unchanged(text) => (' ', DIM, text),
                SnippetLine::Added(text) => ('+', GREEN, text),
                SnippetLine::Removed(text) => ('-', RED, text),
            };
            if style.color {
                out.push_str(color);
                out.push(marker);
                out.push(' ');
                out.push_str(text);
                out.push_str(RESET);
            } else {
                out.push(marker);
                out.push(' ');
                out.push_str(text);
            }
            out.push('\n');
        }
        out
    }
}
