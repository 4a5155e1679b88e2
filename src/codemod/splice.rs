//! Splicing builder output into an existing tree.
//!
//! Every helper returns [`Edit`]s against the current text; a [`Changeset`]
//! collects them together with the imports a transform needs and applies the
//! whole batch at once.

use std::collections::BTreeMap;

use tracing::debug;
use tree_sitter::Node;

use crate::codemod::builder::{Expr, ImportSpec, ImportedName, Printer, Property, Stmt};
use crate::codemod::common::{
    get_node_text, has_token, js_string_literal, line_indent, named_children, token_after,
};
use crate::codemod::detect::require_specifier;
use crate::codemod::locate::last_import_insertion;
use crate::codemod::source::{Edit, SourceModule};
use crate::error::Result;

// ============ Lists ============

/// Add a property at the end of an object literal, in the object's style
pub fn insert_property(
    module: &SourceModule,
    printer: &Printer,
    object: Node,
    property: &Property,
) -> Vec<Edit> {
    if printer.property_inline(property).contains('\n') {
        if let Some(edits) = spread_object(module, printer, object, property) {
            return edits;
        }
    }
    append_to_list(
        module,
        printer,
        object,
        |indent| printer.property(property, indent),
        || printer.property_inline(property),
        |indent| printer.expr(&Expr::object(vec![property.clone()]), indent),
    )
}

/// Lay a one-line object out one property per line and append `property`.
/// Objects with comments or already spanning lines are left to the caller.
fn spread_object(
    module: &SourceModule,
    printer: &Printer,
    object: Node,
    property: &Property,
) -> Option<Vec<Edit>> {
    let items = named_children(object);
    let (first, last) = (*items.first()?, *items.last()?);
    let mut cursor = object.walk();
    let has_comment = object.named_children(&mut cursor).any(|child| child.kind() == "comment");
    if has_comment || object.start_position().row != object.end_position().row {
        return None;
    }

    let nl = printer.newline;
    let list_indent = line_indent(module.text(), object.start_byte());
    let indent = printer.indent(list_indent);
    let trailing = if printer.json { "" } else { "," };

    let open = object.start_byte() + 1;
    let mut edits = vec![Edit::replace_range(open, first.start_byte(), format!("{}{}", nl, indent))];
    for pair in items.windows(2) {
        edits.push(Edit::replace_range(
            pair[0].end_byte(),
            pair[1].start_byte(),
            format!(",{}{}", nl, indent),
        ));
    }
    edits.push(Edit::replace_range(
        last.end_byte(),
        object.end_byte() - 1,
        format!(
            ",{}{}{}{}{}{}",
            nl,
            indent,
            printer.property(property, &indent),
            trailing,
            nl,
            list_indent
        ),
    ));
    Some(edits)
}

/// Add an element at the end of an array literal
pub fn append_element(module: &SourceModule, printer: &Printer, array: Node, element: &Expr) -> Vec<Edit> {
    append_to_list(
        module,
        printer,
        array,
        |indent| printer.expr(element, indent),
        || printer.expr(element, line_indent(module.text(), array.start_byte())),
        |indent| printer.expr(&Expr::array(vec![element.clone()]), indent),
    )
}

fn append_to_list(
    module: &SourceModule,
    printer: &Printer,
    list: Node,
    block_item: impl Fn(&str) -> String,
    inline_item: impl Fn() -> String,
    replacement: impl Fn(&str) -> String,
) -> Vec<Edit> {
    let text = module.text();
    let items = named_children(list);
    let list_indent = line_indent(text, list.start_byte());

    let Some(last) = items.last().copied() else {
        let inner = get_node_text(list, module.source());
        let body = &inner[1..inner.len().saturating_sub(1)];
        if body.trim().is_empty() {
            return vec![Edit::replace(list, replacement(list_indent))];
        }
        // Only comments inside: keep them and add the item after the bracket
        let indent = printer.indent(list_indent);
        let trailing = if printer.json { "" } else { "," };
        return vec![Edit::insert(
            list.start_byte() + 1,
            format!("{}{}{}{}", printer.newline, indent, block_item(&indent), trailing),
        )];
    };

    if last.start_position().row == list.start_position().row {
        return vec![Edit::insert(last.end_byte(), format!(", {}", inline_item()))];
    }

    let indent = line_indent(text, last.start_byte()).to_string();
    let comma = token_after(list, ",", last.end_byte());
    let keep_trailing_comma = comma.is_some() && !printer.json;
    let item = format!(
        "{}{}{}{}",
        printer.newline,
        indent,
        block_item(&indent),
        if keep_trailing_comma { "," } else { "" }
    );

    match comma {
        Some(comma) => {
            let at = same_line_comment_end(comma).unwrap_or(comma.end_byte());
            vec![Edit::insert(at, item)]
        }
        None => match same_line_comment_end(last) {
            Some(at) => vec![Edit::insert(last.end_byte(), ","), Edit::insert(at, item)],
            None => vec![Edit::insert(last.end_byte(), format!(",{}", item))],
        },
    }
}

fn same_line_comment_end(node: Node) -> Option<usize> {
    let next = node.next_sibling()?;
    (next.kind() == "comment" && next.start_position().row == node.end_position().row)
        .then(|| next.end_byte())
}

/// Replace `node` with `callee(node)`
pub fn wrap_node(module: &SourceModule, printer: &Printer, node: Node, callee: &str) -> Edit {
    let inner = Expr::Source(module.node_text(node).to_string());
    Edit::replace(node, printer.expr_inline(&Expr::call_path(callee, vec![inner])))
}

// ============ Existing Imports ============

/// Whether `spec` is already bound by a top-level import or require
pub fn is_import_bound(module: &SourceModule, spec: &ImportSpec) -> bool {
    let source = module.source();
    for statement in named_children(module.root()) {
        match statement.kind() {
            "import_statement" => {
                let from = statement
                    .child_by_field_name("source")
                    .and_then(|s| js_string_literal(s, source));
                if from.as_deref() != Some(spec.from_module.as_str()) {
                    continue;
                }
                let Some(clause) = named_children(statement)
                    .into_iter()
                    .find(|child| child.kind() == "import_clause")
                else {
                    continue;
                };
                if import_clause_binds(clause, source, spec) {
                    return true;
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(statement) {
                    if require_binds(declarator, source, spec) {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

fn import_clause_binds(clause: Node, source: &[u8], spec: &ImportSpec) -> bool {
    named_children(clause).into_iter().any(|binding| match binding.kind() {
        "identifier" => {
            spec.imported == ImportedName::Default && get_node_text(binding, source) == spec.local
        }
        "namespace_import" => {
            spec.imported == ImportedName::Namespace
                && named_children(binding)
                    .first()
                    .map(|id| get_node_text(*id, source) == spec.local)
                    .unwrap_or(false)
        }
        "named_imports" => named_children(binding).into_iter().any(|specifier| {
            let name = specifier
                .child_by_field_name("name")
                .map(|n| get_node_text(n, source));
            let local = specifier
                .child_by_field_name("alias")
                .map(|n| get_node_text(n, source))
                .or(name);
            matches!(&spec.imported, ImportedName::Named(n) if Some(n.as_str()) == name)
                && local == Some(spec.local.as_str())
        }),
        _ => false,
    })
}

fn require_binds(declarator: Node, source: &[u8], spec: &ImportSpec) -> bool {
    if declarator.kind() != "variable_declarator" {
        return false;
    }
    let from = declarator
        .child_by_field_name("value")
        .and_then(|value| require_specifier(value, source));
    if from.as_deref() != Some(spec.from_module.as_str()) {
        return false;
    }
    let Some(name) = declarator.child_by_field_name("name") else {
        return false;
    };
    match name.kind() {
        "identifier" => {
            !spec.is_named() && get_node_text(name, source) == spec.local
        }
        "object_pattern" => {
            let ImportedName::Named(imported) = &spec.imported else {
                return false;
            };
            named_children(name).into_iter().any(|binding| match binding.kind() {
                "shorthand_property_identifier_pattern" => {
                    get_node_text(binding, source) == imported && imported == &spec.local
                }
                "pair_pattern" => {
                    let key = binding.child_by_field_name("key").map(|k| get_node_text(k, source));
                    let value = binding.child_by_field_name("value").map(|v| get_node_text(v, source));
                    key == Some(imported.as_str()) && value == Some(spec.local.as_str())
                }
                _ => false,
            })
        }
        _ => false,
    }
}

/// The `{ ... }` binding list of an existing named import/require of `from`
fn named_binding_list<'t>(module: &'t SourceModule, from: &str) -> Option<Node<'t>> {
    let source = module.source();
    for statement in named_children(module.root()) {
        match statement.kind() {
            "import_statement" if !has_token(statement, "type") => {
                let matches = statement
                    .child_by_field_name("source")
                    .and_then(|s| js_string_literal(s, source))
                    .map(|s| s == from)
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
                let list = named_children(statement)
                    .into_iter()
                    .find(|child| child.kind() == "import_clause")
                    .and_then(|clause| {
                        named_children(clause)
                            .into_iter()
                            .find(|child| child.kind() == "named_imports")
                    });
                if let Some(list) = list.filter(|l| !named_children(*l).is_empty()) {
                    return Some(list);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(statement) {
                    let requires = declarator
                        .child_by_field_name("value")
                        .and_then(|v| require_specifier(v, source))
                        .map(|s| s == from)
                        .unwrap_or(false);
                    let pattern = declarator
                        .child_by_field_name("name")
                        .filter(|n| n.kind() == "object_pattern" && !named_children(*n).is_empty());
                    if let (true, Some(pattern)) = (requires, pattern) {
                        return Some(pattern);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

// ============ Changeset ============

/// Imports, top-level statements and raw edits applied as one batch
#[derive(Debug, Default)]
pub struct Changeset {
    imports: Vec<ImportSpec>,
    after_imports: Vec<Stmt>,
    edits: Vec<Edit>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an import binding; duplicates are dropped
    pub fn add_import(&mut self, spec: ImportSpec) {
        if !self.imports.contains(&spec) {
            self.imports.push(spec);
        }
    }

    /// A statement placed right after the imports
    pub fn insert_after_imports(&mut self, stmt: Stmt) {
        self.after_imports.push(stmt);
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn extend(&mut self, edits: impl IntoIterator<Item = Edit>) {
        self.edits.extend(edits);
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.after_imports.is_empty() && self.edits.is_empty()
    }

    /// Render and apply everything in one batch
    pub fn apply_to(self, module: &mut SourceModule) -> Result<()> {
        let edits = self.into_edits(module);
        module.apply(edits)
    }

    fn into_edits(self, module: &SourceModule) -> Vec<Edit> {
        let printer = Printer::for_module(module);
        let nl = printer.newline;

        let missing: Vec<&ImportSpec> = self
            .imports
            .iter()
            .filter(|spec| !is_import_bound(module, spec))
            .collect();

        let mut edits = Vec::new();
        let mut lines = Vec::new();
        let mut grouped: BTreeMap<&str, Vec<&ImportSpec>> = BTreeMap::new();
        let mut group_order: Vec<&str> = Vec::new();

        for spec in missing {
            if !spec.is_named() {
                lines.push(printer.import(spec));
                continue;
            }
            if !grouped.contains_key(spec.from_module.as_str()) {
                group_order.push(spec.from_module.as_str());
            }
            grouped.entry(spec.from_module.as_str()).or_default().push(spec);
        }

        for from in group_order {
            let specs = grouped.remove(from).unwrap_or_default();
            match named_binding_list(module, from) {
                Some(list) => {
                    let added: Vec<String> =
                        specs.iter().map(|s| printer.import_specifier(s)).collect();
                    if let Some(last) = named_children(list).last() {
                        edits.push(Edit::insert(last.end_byte(), format!(", {}", added.join(", "))));
                    }
                }
                None => lines.push(printer.import_group(from, &specs)),
            }
        }

        let statements: Vec<String> = self
            .after_imports
            .iter()
            .map(|stmt| printer.stmt(stmt, ""))
            .collect();

        if !lines.is_empty() || !statements.is_empty() {
            let point = last_import_insertion(module);
            let text = if point.at_start {
                let mut blocks = Vec::new();
                if !lines.is_empty() {
                    blocks.push(lines.join(nl));
                }
                blocks.extend(statements);
                let mut text = blocks.join(&format!("{}{}", nl, nl));
                text.push_str(nl);
                if !module.text().trim().is_empty() {
                    text.push_str(nl);
                }
                text
            } else {
                let mut text = String::new();
                for line in &lines {
                    text.push_str(nl);
                    text.push_str(line);
                }
                for statement in &statements {
                    text.push_str(nl);
                    text.push_str(nl);
                    text.push_str(statement);
                }
                text
            };
            debug!(
                imports = lines.len(),
                statements = self.after_imports.len(),
                byte = point.byte,
                "inserting after imports"
            );
            edits.insert(0, Edit::insert(point.byte, text));
        }

        edits.extend(self.edits);
        edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::builder::{Arrow, ArrowBody};
    use crate::codemod::common::named_children;
    use crate::codemod::locate::{default_config_object, find_property, PropertyMatch};
    use crate::codemod::source::SourceLanguage;
    use pretty_assertions::assert_eq;

    fn js(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::JavaScript).unwrap()
    }

    fn add_property(text: &str, property: Property) -> String {
        let mut module = js(text);
        let printer = Printer::for_module(&module);
        let config = default_config_object(&module).unwrap();
        let edits = insert_property(&module, &printer, config.object, &property);
        module.apply(edits).unwrap();
        module.print()
    }

    #[test]
    fn test_insert_property_inline() {
        let out = add_property(
            "module.exports = { other: 'config' }",
            Property::new("ssr", Expr::Bool(true)),
        );
        assert_eq!(out, "module.exports = { other: 'config', ssr: true }");
    }

    #[test]
    fn test_multiline_value_spreads_one_line_object() {
        let done = Expr::arrow(Arrow {
            is_async: false,
            params: vec![],
            body: ArrowBody::Block(vec![Stmt::expr(Expr::call_path("run", vec![]))]),
        });
        let out = add_property("module.exports = { a: 1, b: 2 };\n", Property::new("done", done));
        assert_eq!(
            out,
            "module.exports = {\n  a: 1,\n  b: 2,\n  done: () => {\n    run();\n  },\n};\n"
        );
    }

    #[test]
    fn test_one_line_object_with_comment_stays_inline() {
        let done = Expr::arrow(Arrow {
            is_async: false,
            params: vec![],
            body: ArrowBody::Block(vec![Stmt::expr(Expr::call_path("run", vec![]))]),
        });
        let out = add_property("module.exports = { a: 1 /* keep */ };\n", Property::new("done", done));
        assert!(out.contains("/* keep */"));
        assert!(out.starts_with("module.exports = { a: 1, done: () => {"));
    }

    #[test]
    fn test_insert_property_multiline_keeps_trailing_comma() {
        let out = add_property(
            "export default {\n  adapter: adapter(),\n};\n",
            Property::new("ssr", Expr::Bool(true)),
        );
        assert_eq!(out, "export default {\n  adapter: adapter(),\n  ssr: true,\n};\n");
    }

    #[test]
    fn test_insert_property_multiline_without_trailing_comma() {
        let out = add_property(
            "export default {\n    adapter: adapter() // keep\n};\n",
            Property::new("ssr", Expr::Bool(true)),
        );
        assert_eq!(out, "export default {\n    adapter: adapter(), // keep\n    ssr: true\n};\n");
    }

    #[test]
    fn test_insert_property_into_empty_object() {
        let out = add_property("export default {};\n", Property::new("ssr", Expr::Bool(true)));
        assert_eq!(out, "export default {\n  ssr: true,\n};\n");
    }

    #[test]
    fn test_append_element_inline() {
        let mut module = js("export default { plugins: [react()] };\n");
        let printer = Printer::for_module(&module);
        let config = default_config_object(&module).unwrap();
        let Some(PropertyMatch::Pair { value, .. }) =
            find_property(config.object, "plugins", module.source())
        else {
            panic!("plugins not found");
        };
        let edits = append_element(&module, &printer, value, &Expr::call_path("sentry", vec![]));
        module.apply(edits).unwrap();
        assert_eq!(module.print(), "export default { plugins: [react(), sentry()] };\n");
    }

    #[test]
    fn test_changeset_dedupes_and_groups_imports() {
        let mut module = js("import { a } from 'x';\n\nfoo();\n");
        let mut changes = Changeset::new();
        changes.add_import(ImportSpec::named("@sentry/react-router", "sentryOnBuildEnd"));
        changes.add_import(ImportSpec::named("@sentry/react-router", "sentryOnBuildEnd"));
        changes.add_import(ImportSpec::named("@sentry/react-router", "other"));
        changes.add_import(ImportSpec::named("x", "a"));
        changes.apply_to(&mut module).unwrap();
        assert_eq!(
            module.print(),
            "import { a } from 'x';\nimport { sentryOnBuildEnd, other } from '@sentry/react-router';\n\nfoo();\n"
        );
    }

    #[test]
    fn test_changeset_extends_existing_named_import() {
        let mut module = js("import { Links, Meta } from \"@remix-run/react\";\n\nfoo();\n");
        let mut changes = Changeset::new();
        changes.add_import(ImportSpec::named("@remix-run/react", "useRouteError"));
        changes.apply_to(&mut module).unwrap();
        assert_eq!(
            module.print(),
            "import { Links, Meta, useRouteError } from \"@remix-run/react\";\n\nfoo();\n"
        );
    }

    #[test]
    fn test_changeset_statement_after_imports() {
        let mut module = js("import a from 'a';\n\nfoo();\n");
        let mut changes = Changeset::new();
        changes.add_import(ImportSpec::sentry("@sentry/node"));
        changes.insert_after_imports(Stmt::expr(Expr::call_path("Sentry.init", vec![])));
        changes.apply_to(&mut module).unwrap();
        assert_eq!(
            module.print(),
            "import a from 'a';\nimport * as Sentry from '@sentry/node';\n\nSentry.init();\n\nfoo();\n"
        );
    }

    #[test]
    fn test_changeset_at_start_of_file() {
        let mut module = js("foo();\n");
        let mut changes = Changeset::new();
        changes.add_import(ImportSpec::sentry("@sentry/node"));
        changes.insert_after_imports(Stmt::expr(Expr::call_path("Sentry.init", vec![])));
        changes.apply_to(&mut module).unwrap();
        assert_eq!(
            module.print(),
            "import * as Sentry from \"@sentry/node\";\n\nSentry.init();\n\nfoo();\n"
        );
        assert_eq!(named_children(module.root()).len(), 3);
    }

    #[test]
    fn test_commonjs_require_is_recognized_as_bound() {
        let module = js("const { withSentry: wrap } = require('@sentry/remix');\n");
        assert!(is_import_bound(
            &module,
            &ImportSpec::named_as("@sentry/remix", "withSentry", "wrap")
        ));
        assert!(!is_import_bound(&module, &ImportSpec::named("@sentry/remix", "withSentry")));
    }
}
