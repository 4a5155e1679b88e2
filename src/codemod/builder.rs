//! Node builders.
//!
//! New code is described as small [`Expr`] / [`Stmt`] trees built from
//! semantic parameters, then printed by a [`Printer`] configured from the
//! target file (quotes, semicolons, indentation, line endings, module system).
//! The printed text is what gets spliced into the tree.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use crate::codemod::common::{get_node_text, js_string_literal, named_children};
use crate::codemod::detect::{module_system, ModuleSystem};
use crate::codemod::source::SourceModule;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern"));

/// Whether `name` can be written as a bare identifier / property key
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

// ============ Imports ============

/// Which binding an import pulls out of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportedName {
    Named(String),
    Default,
    Namespace,
}

/// One import/require binding to ensure-or-add
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportSpec {
    pub from_module: String,
    pub imported: ImportedName,
    pub local: String,
}

impl ImportSpec {
    pub fn named(from_module: &str, name: &str) -> Self {
        Self::named_as(from_module, name, name)
    }

    pub fn named_as(from_module: &str, name: &str, local: &str) -> Self {
        Self {
            from_module: from_module.to_string(),
            imported: ImportedName::Named(name.to_string()),
            local: local.to_string(),
        }
    }

    pub fn namespace(from_module: &str, local: &str) -> Self {
        Self {
            from_module: from_module.to_string(),
            imported: ImportedName::Namespace,
            local: local.to_string(),
        }
    }

    pub fn default(from_module: &str, local: &str) -> Self {
        Self {
            from_module: from_module.to_string(),
            imported: ImportedName::Default,
            local: local.to_string(),
        }
    }

    /// `import * as Sentry from "<package>"`
    pub fn sentry(package: &str) -> Self {
        Self::namespace(package, "Sentry")
    }

    pub fn is_named(&self) -> bool {
        matches!(self.imported, ImportedName::Named(_))
    }
}

// ============ Expressions ============

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Member(Box<Expr>, String),
    Str(String),
    Number(String),
    Bool(bool),
    Array(Vec<Expr>),
    Object(Vec<Property>),
    Call(Box<Expr>, Vec<Expr>),
    Arrow(Box<Arrow>),
    Await(Box<Expr>),
    Not(Box<Expr>),
    /// A JSX element with text content
    Jsx { tag: String, text: String },
    /// Existing code from the file being edited, moved verbatim
    Source(String),
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    /// Dotted path such as `process.env.SENTRY_AUTH_TOKEN`
    pub fn path(path: &str) -> Self {
        let mut parts = path.split('.');
        let first = parts.next().unwrap_or_default();
        parts.fold(Expr::ident(first), |object, prop| {
            Expr::Member(Box::new(object), prop.to_string())
        })
    }

    pub fn member(object: Expr, prop: &str) -> Self {
        Expr::Member(Box::new(object), prop.to_string())
    }

    pub fn string(value: &str) -> Self {
        Expr::Str(value.to_string())
    }

    /// Numeric literal: `1.0`, `0.1`, `0`
    pub fn number(value: f64) -> Self {
        let text = if value == 0.0 {
            "0".to_string()
        } else if value.fract() == 0.0 {
            format!("{:.1}", value)
        } else {
            value.to_string()
        };
        Expr::Number(text)
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(callee), args)
    }

    /// Call a dotted callee: `Expr::call_path("Sentry.init", ...)`
    pub fn call_path(callee: &str, args: Vec<Expr>) -> Self {
        Expr::call(Expr::path(callee), args)
    }

    /// `callee(inner)`
    pub fn wrap(callee: &str, inner: Expr) -> Self {
        Expr::call_path(callee, vec![inner])
    }

    pub fn object(props: Vec<Property>) -> Self {
        Expr::Object(props)
    }

    pub fn array(items: Vec<Expr>) -> Self {
        Expr::Array(items)
    }

    pub fn arrow(arrow: Arrow) -> Self {
        Expr::Arrow(Box::new(arrow))
    }

    pub fn await_(inner: Expr) -> Self {
        Expr::Await(Box::new(inner))
    }

    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn jsx(tag: &str, text: &str) -> Self {
        Expr::Jsx {
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
    pub comment: Option<String>,
}

impl Property {
    pub fn new(key: &str, value: Expr) -> Self {
        Self {
            key: key.to_string(),
            value,
            comment: None,
        }
    }

    /// `{ key }` shorthand
    pub fn shorthand(key: &str) -> Self {
        Self::new(key, Expr::ident(key))
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    fn is_shorthand(&self) -> bool {
        matches!(&self.value, Expr::Ident(name) if *name == self.key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(String),
    Object(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub type_annotation: Option<String>,
}

impl Param {
    pub fn ident(name: &str) -> Self {
        Self {
            pattern: Pattern::Ident(name.to_string()),
            type_annotation: None,
        }
    }

    pub fn object(names: &[&str]) -> Self {
        Self {
            pattern: Pattern::Object(names.iter().map(|n| n.to_string()).collect()),
            type_annotation: None,
        }
    }

    /// Attach a type, printed only in TypeScript files
    pub fn typed(mut self, annotation: &str) -> Self {
        self.type_annotation = Some(annotation.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub is_async: bool,
    pub params: Vec<Param>,
    pub body: ArrowBody,
}

// ============ Statements ============

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import(ImportSpec),
    Expr(Expr),
    Const {
        export: bool,
        pattern: Pattern,
        type_annotation: Option<String>,
        value: Expr,
    },
    If {
        test: Expr,
        then: Vec<Stmt>,
    },
    Return(Expr),
    Function {
        export: bool,
        is_async: bool,
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
    },
    ExportDefault(Expr),
    Comment(String),
}

impl Stmt {
    pub fn expr(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }

    pub fn constant(name: &str, value: Expr) -> Self {
        Stmt::Const {
            export: false,
            pattern: Pattern::Ident(name.to_string()),
            type_annotation: None,
            value,
        }
    }

    pub fn export_const(name: &str, value: Expr) -> Self {
        Stmt::Const {
            export: true,
            pattern: Pattern::Ident(name.to_string()),
            type_annotation: None,
            value,
        }
    }

    pub fn comment(text: &str) -> Self {
        Stmt::Comment(text.to_string())
    }
}

// ============ Printer ============

/// Prints builder output in the style of the file it is spliced into.
///
/// Printed text never starts with indentation: the caller positions the
/// first line, continuation lines are indented relative to `indent`.
#[derive(Debug, Clone)]
pub struct Printer {
    pub indent_unit: String,
    pub newline: &'static str,
    pub quote: char,
    pub semicolons: bool,
    pub module_system: ModuleSystem,
    pub typescript: bool,
    pub json: bool,
}

impl Default for Printer {
    fn default() -> Self {
        Self {
            indent_unit: "  ".to_string(),
            newline: "\n",
            quote: '"',
            semicolons: true,
            module_system: ModuleSystem::Esm,
            typescript: false,
            json: false,
        }
    }
}

impl Printer {
    /// Detect the conventions of `module`
    pub fn for_module(module: &SourceModule) -> Self {
        let json = module.language().is_json();
        Self {
            indent_unit: detect_indent(module.text()),
            newline: module.newline(),
            quote: if json { '"' } else { detect_quote(module) },
            semicolons: json || detect_semicolons(module),
            module_system: module_system(module),
            typescript: module.language().is_typescript(),
            json,
        }
    }

    pub fn indent(&self, indent: &str) -> String {
        format!("{}{}", indent, self.indent_unit)
    }

    fn semi(&self) -> &'static str {
        if self.semicolons && !self.json {
            ";"
        } else {
            ""
        }
    }

    pub fn string(&self, value: &str) -> String {
        let quote = if self.json { '"' } else { self.quote };
        let mut out = String::with_capacity(value.len() + 2);
        out.push(quote);
        for ch in value.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }

    pub fn key(&self, key: &str) -> String {
        if !self.json && is_identifier(key) {
            key.to_string()
        } else {
            self.string(key)
        }
    }

    /// Print an expression, breaking objects over several lines
    pub fn expr(&self, expr: &Expr, indent: &str) -> String {
        self.print_expr(expr, indent, false)
    }

    /// Print an expression on a single line
    pub fn expr_inline(&self, expr: &Expr) -> String {
        self.print_expr(expr, "", true)
    }

    fn print_expr(&self, expr: &Expr, indent: &str, inline: bool) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Member(object, prop) => {
                format!("{}.{}", self.print_expr(object, indent, inline), prop)
            }
            Expr::Str(value) => self.string(value),
            Expr::Number(text) => text.clone(),
            Expr::Bool(value) => value.to_string(),
            Expr::Array(items) => self.print_array(items, indent, inline),
            Expr::Object(props) => self.print_object(props, indent, inline),
            Expr::Call(callee, args) => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| self.print_expr(arg, indent, inline))
                    .collect();
                format!("{}({})", self.print_expr(callee, indent, inline), args.join(", "))
            }
            Expr::Arrow(arrow) => self.print_arrow(arrow, indent, inline),
            Expr::Await(inner) => format!("await {}", self.print_expr(inner, indent, inline)),
            Expr::Not(inner) => format!("!{}", self.print_expr(inner, indent, inline)),
            Expr::Jsx { tag, text } => format!("<{}>{}</{}>", tag, text, tag),
            Expr::Source(text) => text.clone(),
        }
    }

    fn print_array(&self, items: &[Expr], indent: &str, inline: bool) -> String {
        if items.is_empty() {
            return "[]".to_string();
        }
        if inline || !items.iter().any(|item| self.breaks(item)) {
            let parts: Vec<String> = items
                .iter()
                .map(|item| self.print_expr(item, indent, inline))
                .collect();
            return format!("[{}]", parts.join(", "));
        }

        let inner = self.indent(indent);
        let mut out = String::from("[");
        for item in items {
            out.push_str(self.newline);
            out.push_str(&inner);
            out.push_str(&self.print_expr(item, &inner, false));
            out.push(',');
        }
        out.push_str(self.newline);
        out.push_str(indent);
        out.push(']');
        out
    }

    fn print_object(&self, props: &[Property], indent: &str, inline: bool) -> String {
        if props.is_empty() {
            return "{}".to_string();
        }
        if inline {
            let parts: Vec<String> = props
                .iter()
                .map(|prop| self.print_property(prop, indent, true))
                .collect();
            return format!("{{ {} }}", parts.join(", "));
        }

        let inner = self.indent(indent);
        let mut out = String::from("{");
        for (idx, prop) in props.iter().enumerate() {
            if let Some(comment) = &prop.comment {
                if !self.json {
                    out.push_str(self.newline);
                    out.push_str(&inner);
                    out.push_str("// ");
                    out.push_str(comment);
                }
            }
            out.push_str(self.newline);
            out.push_str(&inner);
            out.push_str(&self.print_property(prop, &inner, false));
            if !self.json || idx + 1 < props.len() {
                out.push(',');
            }
        }
        out.push_str(self.newline);
        out.push_str(indent);
        out.push('}');
        out
    }

    /// `key: value` as it appears inside an object at `indent`
    pub fn property(&self, prop: &Property, indent: &str) -> String {
        self.print_property(prop, indent, false)
    }

    pub fn property_inline(&self, prop: &Property) -> String {
        self.print_property(prop, "", true)
    }

    fn print_property(&self, prop: &Property, indent: &str, inline: bool) -> String {
        if !self.json && prop.is_shorthand() {
            return prop.key.clone();
        }
        format!(
            "{}: {}",
            self.key(&prop.key),
            self.print_expr(&prop.value, indent, inline)
        )
    }

    fn print_arrow(&self, arrow: &Arrow, indent: &str, inline: bool) -> String {
        let mut out = String::new();
        if arrow.is_async {
            out.push_str("async ");
        }
        out.push_str(&self.params(&arrow.params));
        out.push_str(" => ");
        match &arrow.body {
            ArrowBody::Expr(Expr::Object(props)) => {
                out.push('(');
                out.push_str(&self.print_object(props, indent, inline));
                out.push(')');
            }
            ArrowBody::Expr(expr) => out.push_str(&self.print_expr(expr, indent, inline)),
            ArrowBody::Block(stmts) => out.push_str(&self.block(stmts, indent)),
        }
        out
    }

    pub fn params(&self, params: &[Param]) -> String {
        let parts: Vec<String> = params.iter().map(|p| self.param(p)).collect();
        format!("({})", parts.join(", "))
    }

    pub fn param(&self, param: &Param) -> String {
        let mut out = self.pattern(&param.pattern);
        if self.typescript {
            if let Some(annotation) = &param.type_annotation {
                out.push_str(": ");
                out.push_str(annotation);
            }
        }
        out
    }

    pub fn pattern(&self, pattern: &Pattern) -> String {
        match pattern {
            Pattern::Ident(name) => name.clone(),
            Pattern::Object(names) => format!("{{ {} }}", names.join(", ")),
        }
    }

    /// `{ ...statements }` with the closing brace at `indent`
    pub fn block(&self, stmts: &[Stmt], indent: &str) -> String {
        if stmts.is_empty() {
            return "{}".to_string();
        }
        let inner = self.indent(indent);
        let mut out = String::from("{");
        for stmt in stmts {
            out.push_str(self.newline);
            out.push_str(&inner);
            out.push_str(&self.stmt(stmt, &inner));
        }
        out.push_str(self.newline);
        out.push_str(indent);
        out.push('}');
        out
    }

    /// Several statements, one per line, all at `indent`
    pub fn stmts(&self, stmts: &[Stmt], indent: &str) -> String {
        let lines: Vec<String> = stmts.iter().map(|s| self.stmt(s, indent)).collect();
        lines.join(&format!("{}{}", self.newline, indent))
    }

    pub fn stmt(&self, stmt: &Stmt, indent: &str) -> String {
        match stmt {
            Stmt::Import(spec) => self.import(spec),
            Stmt::Expr(expr) => format!("{}{}", self.expr(expr, indent), self.semi()),
            Stmt::Const {
                export,
                pattern,
                type_annotation,
                value,
            } => {
                let mut out = String::new();
                if *export {
                    out.push_str("export ");
                }
                out.push_str("const ");
                out.push_str(&self.pattern(pattern));
                if let (true, Some(annotation)) = (self.typescript, type_annotation) {
                    out.push_str(": ");
                    out.push_str(annotation);
                }
                out.push_str(" = ");
                out.push_str(&self.expr(value, indent));
                out.push_str(self.semi());
                out
            }
            Stmt::If { test, then } => {
                format!("if ({}) {}", self.expr(test, indent), self.block(then, indent))
            }
            Stmt::Return(expr) => format!("return {}{}", self.expr(expr, indent), self.semi()),
            Stmt::Function {
                export,
                is_async,
                name,
                params,
                body,
            } => {
                let mut out = String::new();
                if *export {
                    out.push_str("export ");
                }
                if *is_async {
                    out.push_str("async ");
                }
                out.push_str("function ");
                out.push_str(name);
                out.push_str(&self.params(params));
                out.push(' ');
                out.push_str(&self.block(body, indent));
                out
            }
            Stmt::ExportDefault(expr) => {
                format!("export default {}{}", self.expr(expr, indent), self.semi())
            }
            Stmt::Comment(text) => format!("// {}", text),
        }
    }

    /// A single import or require statement
    pub fn import(&self, spec: &ImportSpec) -> String {
        match (&spec.imported, self.module_system) {
            (ImportedName::Named(_), _) => self.import_group(&spec.from_module, &[spec]),
            (ImportedName::Namespace, ModuleSystem::Esm) => format!(
                "import * as {} from {}{}",
                spec.local,
                self.string(&spec.from_module),
                self.semi()
            ),
            (ImportedName::Default, ModuleSystem::Esm) => format!(
                "import {} from {}{}",
                spec.local,
                self.string(&spec.from_module),
                self.semi()
            ),
            (_, ModuleSystem::CommonJs) => format!(
                "const {} = require({}){}",
                spec.local,
                self.string(&spec.from_module),
                self.semi()
            ),
        }
    }

    /// Several named bindings from one module in a single statement
    pub fn import_group(&self, from_module: &str, specs: &[&ImportSpec]) -> String {
        let names: Vec<String> = specs.iter().map(|s| self.import_specifier(s)).collect();
        match self.module_system {
            ModuleSystem::Esm => format!(
                "import {{ {} }} from {}{}",
                names.join(", "),
                self.string(from_module),
                self.semi()
            ),
            ModuleSystem::CommonJs => format!(
                "const {{ {} }} = require({}){}",
                names.join(", "),
                self.string(from_module),
                self.semi()
            ),
        }
    }

    /// `name`, `name as local` (ESM) or `name: local` (CommonJS)
    pub fn import_specifier(&self, spec: &ImportSpec) -> String {
        let name = match &spec.imported {
            ImportedName::Named(name) => name.as_str(),
            ImportedName::Default => "default",
            ImportedName::Namespace => return spec.local.clone(),
        };
        if name == spec.local {
            return name.to_string();
        }
        match self.module_system {
            ModuleSystem::Esm => format!("{} as {}", name, spec.local),
            ModuleSystem::CommonJs => format!("{}: {}", name, spec.local),
        }
    }

    /// Whether an expression prints over several lines
    fn breaks(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Object(props) => !props.is_empty(),
            Expr::Array(items) => items.iter().any(|item| self.breaks(item)),
            Expr::Call(callee, args) => self.breaks(callee) || args.iter().any(|a| self.breaks(a)),
            Expr::Arrow(arrow) => match &arrow.body {
                ArrowBody::Block(stmts) => !stmts.is_empty(),
                ArrowBody::Expr(expr) => self.breaks(expr),
            },
            Expr::Member(inner, _) | Expr::Await(inner) | Expr::Not(inner) => self.breaks(inner),
            Expr::Source(text) => text.contains('\n'),
            _ => false,
        }
    }
}

// ============ Style Detection ============

fn detect_indent(text: &str) -> String {
    let mut smallest: Option<usize> = None;
    for line in text.lines().take(500) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        if line.starts_with('\t') {
            return "\t".to_string();
        }
        let width = line.len() - trimmed.len();
        if width > 0 {
            smallest = Some(smallest.map_or(width, |s| s.min(width)));
        }
    }
    match smallest {
        Some(width) if width >= 2 => " ".repeat(width.min(8)),
        _ => "  ".to_string(),
    }
}

fn detect_quote(module: &SourceModule) -> char {
    first_string_quote(module.root(), module.source(), &mut 0).unwrap_or('"')
}

fn first_string_quote(node: Node, source: &[u8], visited: &mut usize) -> Option<char> {
    *visited += 1;
    if *visited > 2000 {
        return None;
    }
    if node.kind() == "string" && js_string_literal(node, source).is_some() {
        return get_node_text(node, source).chars().next();
    }
    // JSX attribute strings say nothing about the code style
    if node.kind().starts_with("jsx") {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| first_string_quote(child, source, visited))
}

fn detect_semicolons(module: &SourceModule) -> bool {
    let source = module.source();
    let mut with = 0usize;
    let mut without = 0usize;
    for statement in named_children(module.root()) {
        if !matches!(
            statement.kind(),
            "import_statement"
                | "expression_statement"
                | "lexical_declaration"
                | "variable_declaration"
                | "export_statement"
        ) {
            continue;
        }
        let text = get_node_text(statement, source).trim_end();
        if text.ends_with(';') {
            with += 1;
        } else if !text.ends_with('}') {
            without += 1;
        }
    }
    with >= without
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;
    use pretty_assertions::assert_eq;

    fn sentry_init() -> Expr {
        Expr::call_path(
            "Sentry.init",
            vec![Expr::object(vec![
                Property::new("dsn", Expr::string("https://key@o1.ingest.sentry.io/1")),
                Property::new("integrations", Expr::array(vec![])),
                Property::new("tracesSampleRate", Expr::number(1.0)),
            ])],
        )
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(Expr::number(1.0), Expr::Number("1.0".into()));
        assert_eq!(Expr::number(0.0), Expr::Number("0".into()));
        assert_eq!(Expr::number(0.1), Expr::Number("0.1".into()));
    }

    #[test]
    fn test_print_init_call_multiline() {
        let printer = Printer::default();
        let text = printer.stmt(&Stmt::expr(sentry_init()), "");
        assert_eq!(
            text,
            "Sentry.init({\n  dsn: \"https://key@o1.ingest.sentry.io/1\",\n  integrations: [],\n  tracesSampleRate: 1.0,\n});"
        );
    }

    #[test]
    fn test_print_inline_object() {
        let printer = Printer {
            quote: '\'',
            ..Printer::default()
        };
        let value = Expr::object(vec![Property::new(
            "customSerializer",
            Expr::call_path("createSentryMetroSerializer", vec![]),
        )]);
        assert_eq!(
            printer.expr_inline(&value),
            "{ customSerializer: createSentryMetroSerializer() }"
        );
    }

    #[test]
    fn test_print_imports_per_module_system() {
        let esm = Printer::default();
        let cjs = Printer {
            module_system: ModuleSystem::CommonJs,
            semicolons: false,
            quote: '\'',
            ..Printer::default()
        };
        let ns = ImportSpec::sentry("@sentry/node");
        let named = ImportSpec::named_as("@sentry/remix", "withSentry", "wrap");

        assert_eq!(esm.import(&ns), "import * as Sentry from \"@sentry/node\";");
        assert_eq!(esm.import(&named), "import { withSentry as wrap } from \"@sentry/remix\";");
        assert_eq!(cjs.import(&ns), "const Sentry = require('@sentry/node')");
        assert_eq!(cjs.import(&named), "const { withSentry: wrap } = require('@sentry/remix')");
    }

    #[test]
    fn test_print_arrow_with_block_and_shorthand() {
        let printer = Printer::default();
        let args = Expr::object(vec![
            Property::shorthand("viteConfig"),
            Property::shorthand("buildManifest"),
        ]);
        let arrow = Expr::arrow(Arrow {
            is_async: true,
            params: vec![Param::object(&["viteConfig", "buildManifest"])],
            body: ArrowBody::Block(vec![Stmt::expr(Expr::await_(Expr::call_path(
                "sentryOnBuildEnd",
                vec![args],
            )))]),
        });
        assert_eq!(
            printer.expr(&arrow, "  "),
            "async ({ viteConfig, buildManifest }) => {\n    await sentryOnBuildEnd({\n      viteConfig,\n      buildManifest,\n    });\n  }"
        );
    }

    #[test]
    fn test_quoted_keys_and_json_mode() {
        let printer = Printer::default();
        assert_eq!(printer.key("sentry:sourcemaps"), "\"sentry:sourcemaps\"");
        assert_eq!(printer.key("plugins"), "plugins");

        let json = Printer {
            json: true,
            ..Printer::default()
        };
        let obj = Expr::object(vec![Property::new("build", Expr::string("vite build"))]);
        assert_eq!(json.expr(&obj, ""), "{\n  \"build\": \"vite build\"\n}");
    }

    #[test]
    fn test_style_detection() {
        let module = SourceModule::parse(
            "import a from 'a'\n\nfunction f() {\n    return a\n}\n",
            SourceLanguage::JavaScript,
        )
        .unwrap();
        let printer = Printer::for_module(&module);
        assert_eq!(printer.quote, '\'');
        assert!(!printer.semicolons);
        assert_eq!(printer.indent_unit, "    ");
        assert_eq!(printer.module_system, ModuleSystem::Esm);
    }

    #[test]
    fn test_string_escaping() {
        let printer = Printer {
            quote: '\'',
            ..Printer::default()
        };
        assert_eq!(printer.string("it's"), "'it\\'s'");
    }
}
