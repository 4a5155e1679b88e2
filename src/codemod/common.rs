//! Common node helpers shared by the locators and the transforms.

use tree_sitter::Node;

// ============ Text ============

/// Exact source text of a node
pub fn get_node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    let slice = source.get(node.start_byte()..node.end_byte()).unwrap_or(&[]);
    std::str::from_utf8(slice).unwrap_or("")
}

/// Value of a plain string literal (no template interpolation)
pub fn js_string_literal(node: Node, source: &[u8]) -> Option<String> {
    if !matches!(node.kind(), "string" | "template_string") {
        return None;
    }
    let raw = get_node_text(node, source);
    if raw.contains("${") {
        return None;
    }
    strip_js_string_quotes(raw)
}

fn strip_js_string_quotes(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 {
        return None;
    }
    let first = trimmed.chars().next()?;
    let last = trimmed.chars().last()?;
    if (first == '"' && last == '"') || (first == '\'' && last == '\'') || (first == '`' && last == '`') {
        return Some(trimmed[1..trimmed.len() - 1].to_string());
    }
    None
}

/// Start of the line containing `byte`
pub fn line_start(text: &str, byte: usize) -> usize {
    text[..byte.min(text.len())]
        .rfind('\n')
        .map(|pos| pos + 1)
        .unwrap_or(0)
}

/// Leading whitespace of the line containing `byte`
pub fn line_indent(text: &str, byte: usize) -> &str {
    let start = line_start(text, byte);
    let rest = &text[start..];
    let len = rest
        .char_indices()
        .find(|(_, ch)| *ch != ' ' && *ch != '\t')
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len());
    &rest[..len]
}

// ============ Children ============

/// Named children without comments
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// Check for an anonymous token child such as `default` or `,`
pub fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

/// The first anonymous token of the given kind after `byte`
pub fn token_after<'t>(node: Node<'t>, token: &str, byte: usize) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| !child.is_named() && child.kind() == token && child.start_byte() >= byte);
    found
}

// ============ Expressions ============

/// Strip parentheses and TypeScript assertions (`satisfies`, `as`, `!`)
pub fn unwrap_expression(node: Node) -> Node {
    let mut current = node;
    loop {
        match current.kind() {
            "parenthesized_expression" | "satisfies_expression" | "as_expression"
            | "non_null_expression" | "type_assertion" => {
                let Some(inner) = named_children(current)
                    .into_iter()
                    .find(|child| !is_type_node(child.kind()))
                else {
                    return current;
                };
                current = inner;
            }
            _ => return current,
        }
    }
}

fn is_type_node(kind: &str) -> bool {
    kind.ends_with("_type")
        || matches!(
            kind,
            "type_identifier" | "type_arguments" | "predefined_type" | "type_annotation"
        )
}

pub fn is_function_like(kind: &str) -> bool {
    matches!(
        kind,
        "function_declaration" | "function_expression" | "function" | "arrow_function"
            | "generator_function_declaration" | "generator_function"
    )
}

/// Callee name of a call: the identifier, or the last member segment
pub fn js_call_callee_name<'a>(call: Node, source: &'a [u8]) -> Option<&'a str> {
    if call.kind() != "call_expression" {
        return None;
    }
    let callee = call.child_by_field_name("function")?;
    match callee.kind() {
        "identifier" => Some(get_node_text(callee, source)),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|prop| get_node_text(prop, source)),
        _ => None,
    }
}

/// Positional arguments of a call
pub fn js_call_arguments(call: Node) -> Vec<Node> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Whether `node` contains a call to one of `names`, bare or member-accessed.
/// Nested functions are searched too.
pub fn contains_call(node: Node, source: &[u8], names: &[&str]) -> bool {
    if let Some(callee) = js_call_callee_name(node, source) {
        if names.contains(&callee) {
            return true;
        }
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| contains_call(child, source, names));
    found
}

/// Whether an expression is a reference to one of `names` (`x` or `Sentry.x`)
pub fn is_reference_to(node: Node, source: &[u8], names: &[&str]) -> bool {
    match node.kind() {
        "identifier" => names.contains(&get_node_text(node, source)),
        "member_expression" => node
            .child_by_field_name("property")
            .map(|prop| names.contains(&get_node_text(prop, source)))
            .unwrap_or(false),
        _ => false,
    }
}

/// Property key as a plain name (`foo`, `"foo"`, `'foo'`)
pub fn js_property_key(key: Node, source: &[u8]) -> Option<String> {
    match key.kind() {
        "property_identifier" | "identifier" | "number" | "private_property_identifier" => {
            Some(get_node_text(key, source).to_string())
        }
        "string" => js_string_literal(key, source),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::{SourceLanguage, SourceModule};

    #[test]
    fn test_line_indent() {
        let text = "a\n    b: 1,\n\tc";
        assert_eq!(line_indent(text, 6), "    ");
        assert_eq!(line_indent(text, 0), "");
        assert_eq!(line_indent(text, text.len() - 1), "\t");
    }

    #[test]
    fn test_unwrap_satisfies_and_parens() {
        let module = SourceModule::parse(
            "export default ({ ssr: true } satisfies Config);\n",
            SourceLanguage::TypeScript,
        )
        .unwrap();
        let export = named_children(module.root())[0];
        let value = export.child_by_field_name("value").unwrap();
        assert_eq!(unwrap_expression(value).kind(), "object");
    }

    #[test]
    fn test_contains_call_matches_member_and_bare() {
        let module = SourceModule::parse(
            "function f(e) { if (x) { Sentry.captureException(e); } }\n",
            SourceLanguage::JavaScript,
        )
        .unwrap();
        assert!(contains_call(module.root(), module.source(), &["captureException"]));
        assert!(!contains_call(module.root(), module.source(), &["captureMessage"]));
    }

    fn find_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        children.into_iter().find_map(|child| find_kind(child, kind))
    }

    #[test]
    fn test_string_literal() {
        let module = SourceModule::parse("const a = '@sentry/node';\n", SourceLanguage::JavaScript)
            .unwrap();
        let node = find_kind(module.root(), "string").unwrap();
        assert_eq!(js_string_literal(node, module.source()).as_deref(), Some("@sentry/node"));
    }
}
