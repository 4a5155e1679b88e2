//! Lossless source modules.
//!
//! A [`SourceModule`] is the file text plus the tree-sitter tree indexing it.
//! Printing is the text itself, so an untouched module round-trips byte for
//! byte. Every change is a byte-span [`Edit`]; after a batch is spliced the
//! text is re-parsed and the batch is rejected if it broke the syntax.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::{CodemodError, Result};

// ============ Supported Languages ============

/// Grammars the engine can rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    JavaScriptJsx,
    TypeScript,
    TypeScriptTsx,
    Json,
}

impl SourceLanguage {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::JavaScriptJsx),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::TypeScriptTsx),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter language for this file type
    fn tree_sitter_language(&self) -> Language {
        match self {
            // The JavaScript grammar parses JSX in plain .js files as well
            Self::JavaScript | Self::JavaScriptJsx => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::TypeScriptTsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Json => tree_sitter_json::LANGUAGE.into(),
        }
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self, Self::TypeScript | Self::TypeScriptTsx)
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

// ============ Edits ============

/// A byte-span replacement against the current text of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    pub fn replace(node: Node, text: impl Into<String>) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
            text: text.into(),
        }
    }

    pub fn replace_range(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

// ============ Source Module ============

/// One parsed file, owned by a single transform call
pub struct SourceModule {
    path: Option<PathBuf>,
    language: SourceLanguage,
    original: String,
    text: String,
    tree: Tree,
}

impl std::fmt::Debug for SourceModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceModule")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("modified", &self.is_modified())
            .finish()
    }
}

impl SourceModule {
    /// Parse in-memory text
    pub fn parse(text: impl Into<String>, language: SourceLanguage) -> Result<Self> {
        Self::parse_with_path(text, language, None)
    }

    pub fn parse_with_path(
        text: impl Into<String>,
        language: SourceLanguage,
        path: Option<PathBuf>,
    ) -> Result<Self> {
        let text = text.into();
        let display = display_path(path.as_deref());
        let tree = parse_tree(&text, language).map_err(|message| CodemodError::Parse {
            path: display,
            message,
        })?;

        Ok(Self {
            path,
            language,
            original: text.clone(),
            text,
            tree,
        })
    }

    /// Read and parse a file, picking the grammar from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let language = SourceLanguage::from_path(path)
            .ok_or_else(|| CodemodError::UnsupportedLanguage(path.display().to_string()))?;
        let text = fs::read_to_string(path)?;
        Self::parse_with_path(text, language, Some(path.to_path_buf()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn display_path(&self) -> String {
        display_path(self.path.as_deref())
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Serialize the module. Untouched regions are the original bytes.
    pub fn print(&self) -> String {
        self.text.clone()
    }

    pub fn is_modified(&self) -> bool {
        self.text != self.original
    }

    /// Line ending used by the file, reused for inserted code
    pub fn newline(&self) -> &'static str {
        if self.original.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn node_text(&self, node: Node) -> &str {
        self.text.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    /// Splice a batch of edits and re-parse.
    ///
    /// Offsets refer to the current text. Edits at the same offset keep their
    /// relative order. A batch with overlapping spans, or one that leaves the
    /// tree with syntax errors, is rejected and the module is unchanged.
    pub fn apply(&mut self, mut edits: Vec<Edit>) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        edits.sort_by_key(|edit| edit.start);

        let mut output = String::with_capacity(self.text.len() + 256);
        let mut cursor = 0;
        for edit in &edits {
            if edit.start < cursor || edit.end < edit.start || edit.end > self.text.len() {
                return Err(CodemodError::InvalidEdit(format!(
                    "overlapping or out of range edit at bytes {}..{}",
                    edit.start, edit.end
                )));
            }
            let Some(unchanged) = self.text.get(cursor..edit.start) else {
                return Err(CodemodError::InvalidEdit(format!(
                    "edit does not start on a character boundary: {}",
                    edit.start
                )));
            };
            output.push_str(unchanged);
            output.push_str(&edit.text);
            cursor = edit.end;
        }
        output.push_str(self.text.get(cursor..).unwrap_or(""));

        let tree = parse_tree(&output, self.language).map_err(|message| {
            CodemodError::InvalidEdit(format!("{} in {}", message, self.display_path()))
        })?;

        debug!(
            path = %self.display_path(),
            edits = edits.len(),
            "spliced edits"
        );
        self.text = output;
        self.tree = tree;
        Ok(())
    }

    /// Drop every applied edit
    pub fn reset(&mut self) {
        if !self.is_modified() {
            return;
        }
        if let Ok(tree) = parse_tree(&self.original, self.language) {
            self.text = self.original.clone();
            self.tree = tree;
        }
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}

/// Parse text, failing on any ERROR or MISSING node
fn parse_tree(text: &str, language: SourceLanguage) -> std::result::Result<Tree, String> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.tree_sitter_language())
        .map_err(|e| format!("Failed to set language: {}", e))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| "Failed to parse content".to_string())?;

    let root = tree.root_node();
    if root.has_error() {
        let position = first_error(root)
            .map(|node| node.start_position())
            .unwrap_or_else(|| root.start_position());
        return Err(format!(
            "syntax error at line {}, column {}",
            position.row + 1,
            position.column + 1
        ));
    }
    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}
