//! Anchor locators.
//!
//! Pure lookups over a parsed module. Results borrow the module's tree, so
//! they must be re-queried after the module is mutated.

use tree_sitter::Node;

use crate::codemod::common::{
    contains_call, get_node_text, has_token, is_function_like, is_reference_to, js_call_arguments,
    js_property_key, named_children, unwrap_expression,
};
use crate::codemod::detect::require_specifier;
use crate::codemod::source::SourceModule;
use crate::error::{CodemodError, Result};

// How many identifier hops the config resolver follows
const MAX_RESOLVE_DEPTH: usize = 4;

// ============ Last Import ============

/// Where new top-level declarations go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    /// Statement index the new code will occupy
    pub index: usize,
    /// Byte offset of the insertion
    pub byte: usize,
    /// True when nothing precedes the insertion point
    pub at_start: bool,
}

/// Position right after the leading run of imports/requires.
///
/// Hashbang lines and directive prologues (`"use client"`) are skipped so they
/// stay first. A comment on the same line as the last import stays with it.
pub fn last_import_insertion(module: &SourceModule) -> InsertionPoint {
    let root = module.root();
    let source = module.source();
    let statements = named_children(root);

    let mut anchor: Option<Node> = None;
    let mut index = 0;
    let mut in_prologue = true;

    for statement in &statements {
        if statement.kind() == "hash_bang_line" {
            anchor = Some(*statement);
            index += 1;
            continue;
        }
        if in_prologue && is_directive(*statement) {
            anchor = Some(*statement);
            index += 1;
            continue;
        }
        in_prologue = false;
        if is_import_like(*statement, source) {
            anchor = Some(*statement);
            index += 1;
            continue;
        }
        break;
    }

    match anchor {
        Some(node) => InsertionPoint {
            index,
            byte: trailing_comment_end(node).unwrap_or(node.end_byte()),
            at_start: false,
        },
        None => InsertionPoint {
            index: 0,
            byte: 0,
            at_start: true,
        },
    }
}

fn is_directive(statement: Node) -> bool {
    statement.kind() == "expression_statement"
        && named_children(statement)
            .first()
            .map(|child| child.kind() == "string")
            .unwrap_or(false)
}

/// `import ...`, `const x = require("x")`, or a bare `require("x")`
pub fn is_import_like(statement: Node, source: &[u8]) -> bool {
    match statement.kind() {
        "import_statement" => true,
        "lexical_declaration" | "variable_declaration" => {
            let declarators: Vec<Node> = named_children(statement)
                .into_iter()
                .filter(|child| child.kind() == "variable_declarator")
                .collect();
            !declarators.is_empty()
                && declarators.iter().all(|declarator| {
                    declarator
                        .child_by_field_name("value")
                        .map(|value| is_require_expression(value, source))
                        .unwrap_or(false)
                })
        }
        "expression_statement" => named_children(statement)
            .first()
            .map(|expr| require_specifier(*expr, source).is_some())
            .unwrap_or(false),
        _ => false,
    }
}

/// `require("x")`, `require("x").y`, `require("x")(...)`
fn is_require_expression(node: Node, source: &[u8]) -> bool {
    let node = unwrap_expression(node);
    if require_specifier(node, source).is_some() {
        return true;
    }
    match node.kind() {
        "member_expression" => node
            .child_by_field_name("object")
            .map(|object| is_require_expression(object, source))
            .unwrap_or(false),
        "call_expression" => node
            .child_by_field_name("function")
            .map(|callee| is_require_expression(callee, source))
            .unwrap_or(false),
        _ => false,
    }
}

fn trailing_comment_end(statement: Node) -> Option<usize> {
    let next = statement.next_sibling()?;
    (next.kind() == "comment" && next.start_position().row == statement.end_position().row)
        .then(|| next.end_byte())
}

// ============ Default Export ============

/// The `export default ...` statement, or a `module.exports = ...` assignment
pub fn default_export(module: &SourceModule) -> Option<Node<'_>> {
    let source = module.source();
    named_children(module.root()).into_iter().find(|statement| {
        match statement.kind() {
            "export_statement" => has_token(*statement, "default"),
            "expression_statement" => module_exports_value(*statement, source).is_some(),
            _ => false,
        }
    })
}

/// Right-hand side of `module.exports = <value>`
pub fn module_exports_value<'t>(statement: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
    let assignment = named_children(statement).into_iter().next()?;
    if assignment.kind() != "assignment_expression" {
        return None;
    }
    let left = assignment.child_by_field_name("left")?;
    if get_node_text(left, source).replace(char::is_whitespace, "") != "module.exports" {
        return None;
    }
    assignment.child_by_field_name("right")
}

/// Exported expression of a default export statement
pub fn default_export_value<'t>(statement: Node<'t>, source: &[u8]) -> Option<Node<'t>> {
    match statement.kind() {
        "export_statement" => statement
            .child_by_field_name("value")
            .or_else(|| statement.child_by_field_name("declaration")),
        _ => module_exports_value(statement, source),
    }
}

/// The closed set of default-export forms the wrappers understand
#[derive(Debug, Clone, Copy)]
pub enum DefaultExportShape<'t> {
    /// `export default function App() {}`
    FunctionDeclaration {
        statement: Node<'t>,
        declaration: Node<'t>,
        name: &'t str,
    },
    /// `export default App;`
    Identifier {
        statement: Node<'t>,
        value: Node<'t>,
        name: &'t str,
    },
    /// `export default withSentry(App);`
    Wrapped {
        statement: Node<'t>,
        call: Node<'t>,
    },
    Unrecognized {
        statement: Node<'t>,
    },
}

/// Classify the default export against the wrapper call names
pub fn default_export_shape<'t>(
    module: &'t SourceModule,
    wrappers: &[&str],
) -> Result<DefaultExportShape<'t>> {
    let source = module.source();
    let statement =
        default_export(module).ok_or_else(|| CodemodError::not_found("default export"))?;

    if let Some(declaration) = statement.child_by_field_name("declaration") {
        if declaration.kind() == "function_declaration" {
            if let Some(name) = declaration.child_by_field_name("name") {
                return Ok(DefaultExportShape::FunctionDeclaration {
                    statement,
                    declaration,
                    name: get_node_text(name, source),
                });
            }
        }
        return Ok(DefaultExportShape::Unrecognized { statement });
    }

    let Some(value) = default_export_value(statement, source) else {
        return Ok(DefaultExportShape::Unrecognized { statement });
    };
    let value = unwrap_expression(value);
    let shape = match value.kind() {
        "identifier" => DefaultExportShape::Identifier {
            statement,
            value,
            name: get_node_text(value, source),
        },
        "call_expression" if contains_call(value, source, wrappers) => {
            DefaultExportShape::Wrapped {
                statement,
                call: value,
            }
        }
        _ => DefaultExportShape::Unrecognized { statement },
    };
    Ok(shape)
}

// ============ Named Exports ============

#[derive(Debug, Clone, Copy)]
pub enum NamedExportKind<'t> {
    /// `export function name() {}`
    Function(Node<'t>),
    /// `export const name = value`
    Variable {
        declarator: Node<'t>,
        value: Option<Node<'t>>,
    },
    /// `export { name }`, the binding lives elsewhere
    Clause(Node<'t>),
}

#[derive(Debug, Clone, Copy)]
pub struct NamedExport<'t> {
    pub statement: Node<'t>,
    pub kind: NamedExportKind<'t>,
}

/// Find `export function <name>`, `export const <name>` or `export { <name> }`
pub fn find_named_export<'t>(module: &'t SourceModule, name: &str) -> Option<NamedExport<'t>> {
    let source = module.source();
    for statement in named_children(module.root()) {
        if statement.kind() != "export_statement" || has_token(statement, "default") {
            continue;
        }

        if let Some(declaration) = statement.child_by_field_name("declaration") {
            match declaration.kind() {
                "function_declaration" | "generator_function_declaration" => {
                    let matches = declaration
                        .child_by_field_name("name")
                        .map(|n| get_node_text(n, source) == name)
                        .unwrap_or(false);
                    if matches {
                        return Some(NamedExport {
                            statement,
                            kind: NamedExportKind::Function(declaration),
                        });
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    if let Some(declarator) = find_declarator(declaration, name, source) {
                        return Some(NamedExport {
                            statement,
                            kind: NamedExportKind::Variable {
                                declarator,
                                value: declarator.child_by_field_name("value"),
                            },
                        });
                    }
                }
                _ => {}
            }
            continue;
        }

        for clause in named_children(statement) {
            if clause.kind() != "export_clause" {
                continue;
            }
            for specifier in named_children(clause) {
                let exported = specifier
                    .child_by_field_name("alias")
                    .or_else(|| specifier.child_by_field_name("name"));
                if exported.map(|n| get_node_text(n, source) == name).unwrap_or(false) {
                    return Some(NamedExport {
                        statement,
                        kind: NamedExportKind::Clause(specifier),
                    });
                }
            }
        }
    }
    None
}

fn find_declarator<'t>(declaration: Node<'t>, name: &str, source: &[u8]) -> Option<Node<'t>> {
    named_children(declaration).into_iter().find(|declarator| {
        declarator.kind() == "variable_declarator"
            && declarator
                .child_by_field_name("name")
                .map(|n| n.kind() == "identifier" && get_node_text(n, source) == name)
                .unwrap_or(false)
    })
}

/// A top-level `const/let/var <name> = ...` declarator
pub fn find_top_level_declarator<'t>(module: &'t SourceModule, name: &str) -> Option<Node<'t>> {
    let source = module.source();
    named_children(module.root())
        .into_iter()
        .filter_map(|statement| match statement.kind() {
            "lexical_declaration" | "variable_declaration" => Some(statement),
            "export_statement" => statement.child_by_field_name("declaration"),
            _ => None,
        })
        .find_map(|declaration| find_declarator(declaration, name, source))
}

// ============ Functions ============

/// A uniform view of function declarations, function expressions and arrows
#[derive(Debug, Clone, Copy)]
pub struct FunctionShape<'t> {
    pub node: Node<'t>,
    /// `formal_parameters`, absent for `x => ...`
    pub parameters: Option<Node<'t>>,
    /// The bare parameter of `x => ...`
    pub single_param: Option<Node<'t>>,
    pub body: Node<'t>,
}

impl<'t> FunctionShape<'t> {
    pub fn of(node: Node<'t>) -> Option<Self> {
        let node = unwrap_expression(node);
        if !is_function_like(node.kind()) {
            return None;
        }
        Some(Self {
            node,
            parameters: node.child_by_field_name("parameters"),
            single_param: node
                .child_by_field_name("parameter")
                .filter(|p| p.kind() == "identifier"),
            body: node.child_by_field_name("body")?,
        })
    }

    pub fn is_block(&self) -> bool {
        self.body.kind() == "statement_block"
    }

    pub fn is_async(&self) -> bool {
        has_token(self.node, "async")
    }

    /// Binding patterns of the parameters, in order
    pub fn params(&self) -> Vec<Node<'t>> {
        if let Some(single) = self.single_param {
            return vec![single];
        }
        self.parameters
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(param_pattern)
            .collect()
    }

    /// Top-level statements of a block body
    pub fn statements(&self) -> Vec<Node<'t>> {
        if self.is_block() {
            named_children(self.body)
        } else {
            Vec::new()
        }
    }

    /// The last top-level `return` of a block body
    pub fn last_return(&self) -> Option<Node<'t>> {
        self.statements()
            .into_iter()
            .rev()
            .find(|statement| statement.kind() == "return_statement")
    }
}

/// Strip TypeScript parameter wrappers and defaults down to the binding pattern
pub fn param_pattern(param: Node) -> Node {
    match param.kind() {
        "required_parameter" | "optional_parameter" => {
            param.child_by_field_name("pattern").unwrap_or(param)
        }
        "assignment_pattern" => param.child_by_field_name("left").unwrap_or(param),
        _ => param,
    }
}

/// The function behind a named export
pub fn exported_function<'t>(export: &NamedExport<'t>) -> Option<FunctionShape<'t>> {
    match export.kind {
        NamedExportKind::Function(declaration) => FunctionShape::of(declaration),
        NamedExportKind::Variable { value, .. } => value.and_then(FunctionShape::of),
        NamedExportKind::Clause(_) => None,
    }
}

// ============ Config Objects ============

/// A config object literal and how it was reached
#[derive(Debug, Clone, Copy)]
pub struct ConfigObject<'t> {
    pub object: Node<'t>,
    /// The `defineConfig(...)`-style call the object was passed to
    pub define_call: Option<Node<'t>>,
    /// The function returning the object, if any
    pub function: Option<Node<'t>>,
}

/// Resolve the default-exported config down to its object literal.
///
/// Accepts bare objects, `satisfies`/`as` assertions, `defineConfig(...)`
/// calls, functions returning an object, and identifiers bound at the top
/// level to any of those.
pub fn default_config_object(module: &SourceModule) -> Result<ConfigObject<'_>> {
    let statement =
        default_export(module).ok_or_else(|| CodemodError::not_found("default export"))?;
    let value = default_export_value(statement, module.source())
        .ok_or_else(|| CodemodError::not_found("default export value"))?;
    resolve_config_object(module, value)
}

pub fn resolve_config_object<'t>(module: &'t SourceModule, value: Node<'t>) -> Result<ConfigObject<'t>> {
    let mut found = ConfigObject {
        object: value,
        define_call: None,
        function: None,
    };
    let object = resolve_into(module, value, &mut found, 0)
        .ok_or_else(|| CodemodError::not_found("config object literal"))?;
    found.object = object;
    Ok(found)
}

fn resolve_into<'t>(
    module: &'t SourceModule,
    node: Node<'t>,
    found: &mut ConfigObject<'t>,
    depth: usize,
) -> Option<Node<'t>> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }
    let node = unwrap_expression(node);
    match node.kind() {
        "object" => Some(node),
        "call_expression" => {
            if found.define_call.is_none() {
                found.define_call = Some(node);
            }
            // `defineConfig(config)` first, then `mergeConfig(defaults, config)`
            let args = js_call_arguments(node);
            let (first, rest) = args.split_first()?;
            std::iter::once(first)
                .chain(rest.iter().rev())
                .find_map(|arg| {
                    let function = found.function;
                    let resolved = resolve_into(module, *arg, found, depth + 1);
                    if resolved.is_none() {
                        found.function = function;
                    }
                    resolved
                })
        }
        "identifier" => {
            let name = get_node_text(node, module.source());
            let value = find_top_level_declarator(module, name)?.child_by_field_name("value")?;
            resolve_into(module, value, found, depth + 1)
        }
        kind if is_function_like(kind) => {
            let function = FunctionShape::of(node)?;
            if found.function.is_none() {
                found.function = Some(node);
            }
            if function.is_block() {
                let returned = named_children(function.last_return()?).into_iter().next()?;
                resolve_into(module, returned, found, depth + 1)
            } else {
                resolve_into(module, function.body, found, depth + 1)
            }
        }
        _ => None,
    }
}

// ============ Properties ============

#[derive(Debug, Clone, Copy)]
pub enum PropertyMatch<'t> {
    /// `key: value`
    Pair { pair: Node<'t>, value: Node<'t> },
    /// `{ key }`
    Shorthand(Node<'t>),
    /// `key() {}`
    Method(Node<'t>),
}

impl<'t> PropertyMatch<'t> {
    /// The whole property node
    pub fn node(&self) -> Node<'t> {
        match self {
            PropertyMatch::Pair { pair, .. } => *pair,
            PropertyMatch::Shorthand(node) | PropertyMatch::Method(node) => *node,
        }
    }
}

/// Find a property by key in an object literal (JS `object` or JSON `object`)
pub fn find_property<'t>(object: Node<'t>, key: &str, source: &[u8]) -> Option<PropertyMatch<'t>> {
    for property in named_children(object) {
        match property.kind() {
            "pair" => {
                let Some(key_node) = property.child_by_field_name("key") else {
                    continue;
                };
                if js_property_key(key_node, source).as_deref() == Some(key) {
                    let value = property.child_by_field_name("value")?;
                    return Some(PropertyMatch::Pair {
                        pair: property,
                        value,
                    });
                }
            }
            "shorthand_property_identifier" if get_node_text(property, source) == key => {
                return Some(PropertyMatch::Shorthand(property));
            }
            "method_definition" => {
                let matches = property
                    .child_by_field_name("name")
                    .and_then(|name| js_property_key(name, source))
                    .map(|name| name == key)
                    .unwrap_or(false);
                if matches {
                    return Some(PropertyMatch::Method(property));
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether a call's callee is one of `names` (bare or member-accessed)
pub fn is_call_to(node: Node, source: &[u8], names: &[&str]) -> bool {
    let node = unwrap_expression(node);
    node.kind() == "call_expression"
        && node
            .child_by_field_name("function")
            .map(|callee| is_reference_to(callee, source, names))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;

    fn ts(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::TypeScriptTsx).unwrap()
    }

    #[test]
    fn test_insertion_after_imports_and_requires() {
        let module = ts("import a from 'a';\nconst b = require('b');\n\nfoo();\n");
        let point = last_import_insertion(&module);
        assert_eq!(point.index, 2);
        assert_eq!(&module.text()[..point.byte], "import a from 'a';\nconst b = require('b');");
        assert!(!point.at_start);
    }

    #[test]
    fn test_insertion_without_imports_is_at_start() {
        let module = ts("foo();\n");
        let point = last_import_insertion(&module);
        assert_eq!(point, InsertionPoint { index: 0, byte: 0, at_start: true });
    }

    #[test]
    fn test_insertion_keeps_directive_first() {
        let module = ts("\"use client\";\nfoo();\n");
        let point = last_import_insertion(&module);
        assert_eq!(&module.text()[..point.byte], "\"use client\";");
    }

    #[test]
    fn test_insertion_keeps_trailing_comment() {
        let module = ts("import a from 'a'; // side effects\nfoo();\n");
        let point = last_import_insertion(&module);
        assert_eq!(&module.text()[..point.byte], "import a from 'a'; // side effects");
    }

    #[test]
    fn test_default_export_shapes() {
        let module = ts("export default function App() { return null; }\n");
        assert!(matches!(
            default_export_shape(&module, &["withSentry"]).unwrap(),
            DefaultExportShape::FunctionDeclaration { name: "App", .. }
        ));

        let module = ts("function App() { return null; }\nexport default App;\n");
        assert!(matches!(
            default_export_shape(&module, &["withSentry"]).unwrap(),
            DefaultExportShape::Identifier { name: "App", .. }
        ));

        let module = ts("export default Sentry.withSentry(App);\n");
        assert!(matches!(
            default_export_shape(&module, &["withSentry"]).unwrap(),
            DefaultExportShape::Wrapped { .. }
        ));

        let module = ts("export default () => null;\n");
        assert!(matches!(
            default_export_shape(&module, &["withSentry"]).unwrap(),
            DefaultExportShape::Unrecognized { .. }
        ));

        let module = ts("const App = 1;\n");
        assert!(default_export_shape(&module, &["withSentry"]).unwrap_err().is_anchor_error());
    }

    #[test]
    fn test_find_named_export_forms() {
        let module = ts(
            "export function handle() {}\nexport const handleError = () => {};\nconst x = 1;\nexport { x as ErrorBoundary };\n",
        );
        assert!(matches!(
            find_named_export(&module, "handle").unwrap().kind,
            NamedExportKind::Function(_)
        ));
        assert!(matches!(
            find_named_export(&module, "handleError").unwrap().kind,
            NamedExportKind::Variable { value: Some(_), .. }
        ));
        assert!(matches!(
            find_named_export(&module, "ErrorBoundary").unwrap().kind,
            NamedExportKind::Clause(_)
        ));
        assert!(find_named_export(&module, "missing").is_none());
    }

    #[test]
    fn test_function_shape_params() {
        let module = ts("export const handleError = (error: unknown, { request }) => {};\n");
        let export = find_named_export(&module, "handleError").unwrap();
        let shape = exported_function(&export).unwrap();
        let params = shape.params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].kind(), "identifier");
        assert_eq!(params[1].kind(), "object_pattern");
        assert!(shape.is_block());
    }

    #[test]
    fn test_resolve_config_through_wrappers() {
        let cases = [
            "export default { ssr: false };\n",
            "export default { ssr: false } satisfies Config;\n",
            "export default defineConfig({ ssr: false });\n",
            "export default defineConfig(() => ({ ssr: false }));\n",
            "export default defineConfig(({ mode }) => {\n  const x = 1;\n  return { ssr: false };\n});\n",
            "const config = { ssr: false };\nexport default config;\n",
            "module.exports = { ssr: false };\n",
        ];
        for case in cases {
            let module = ts(case);
            let config = default_config_object(&module)
                .unwrap_or_else(|e| panic!("{}: {}", case, e));
            assert!(
                find_property(config.object, "ssr", module.source()).is_some(),
                "no ssr in {}",
                case
            );
        }
    }

    #[test]
    fn test_define_call_is_recorded() {
        let module = ts("export default defineConfig({ plugins: [] });\n");
        let config = default_config_object(&module).unwrap();
        assert!(config.define_call.is_some());
        assert!(config.function.is_none());
    }

    #[test]
    fn test_find_property_variants() {
        let module = ts("export default { plugins: [], adapter, 'quoted-key': 1, buildEnd() {} };\n");
        let config = default_config_object(&module).unwrap();
        let source = module.source();
        assert!(matches!(find_property(config.object, "plugins", source), Some(PropertyMatch::Pair { .. })));
        assert!(matches!(find_property(config.object, "adapter", source), Some(PropertyMatch::Shorthand(_))));
        assert!(matches!(find_property(config.object, "quoted-key", source), Some(PropertyMatch::Pair { .. })));
        assert!(matches!(find_property(config.object, "buildEnd", source), Some(PropertyMatch::Method(_))));
        assert!(find_property(config.object, "kit", source).is_none());
    }

    #[test]
    fn test_json_property_lookup() {
        let module = SourceModule::parse(
            "{\n  \"scripts\": { \"build\": \"vite build\" }\n}\n",
            SourceLanguage::Json,
        )
        .unwrap();
        let object = named_children(module.root())[0];
        let Some(PropertyMatch::Pair { value, .. }) = find_property(object, "scripts", module.source())
        else {
            panic!("scripts not found");
        };
        assert!(find_property(value, "build", module.source()).is_some());
    }
}
