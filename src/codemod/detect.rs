//! Detection of existing SDK usage and of the file's module system.

use tree_sitter::Node;

use crate::codemod::common::{get_node_text, js_call_arguments, js_string_literal, named_children};
use crate::codemod::source::SourceModule;

/// Package scope every SDK package lives under
pub const SENTRY_SCOPE: &str = "@sentry";

/// Whether the module imports, requires or re-exports any `@sentry/*` package.
/// This is the idempotence guard run before every transform.
pub fn has_sentry_content(module: &SourceModule) -> bool {
    has_package_content(module, SENTRY_SCOPE)
}

/// Whether any import/require source is `scope` itself or a path below it.
/// Matches whole path segments: `@sentry/vite-plugin` is in `@sentry`,
/// `webpack-plugin-@sentry` and `@sentry-internal/x` are not.
pub fn has_package_content(module: &SourceModule, scope: &str) -> bool {
    if module.language().is_json() {
        return false;
    }
    let mut found = false;
    visit_module_sources(module.root(), module.source(), &mut |specifier: &str| {
        if is_in_scope(specifier, scope) {
            found = true;
        }
    });
    found
}

pub fn is_in_scope(specifier: &str, scope: &str) -> bool {
    specifier == scope
        || specifier
            .strip_prefix(scope)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}

/// Call `visit` with every module specifier: static imports, re-exports,
/// `require("x")` and `import("x")` calls anywhere in the tree.
fn visit_module_sources(node: Node, source: &[u8], visit: &mut dyn FnMut(&str)) {
    match node.kind() {
        "import_statement" | "export_statement" => {
            if let Some(spec) = node
                .child_by_field_name("source")
                .and_then(|s| js_string_literal(s, source))
            {
                visit(&spec);
            }
        }
        "call_expression" => {
            if let Some(spec) = require_specifier(node, source) {
                visit(&spec);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_module_sources(child, source, visit);
    }
}

/// `require("x")` or dynamic `import("x")` with a literal first argument
pub fn require_specifier(call: Node, source: &[u8]) -> Option<String> {
    if call.kind() != "call_expression" {
        return None;
    }
    let callee = call.child_by_field_name("function")?;
    let is_loader = match callee.kind() {
        "identifier" => get_node_text(callee, source) == "require",
        "import" => true,
        _ => false,
    };
    if !is_loader {
        return None;
    }
    let first = js_call_arguments(call).into_iter().next()?;
    js_string_literal(first, source)
}

// ============ Module System ============

/// How imports must be written in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleSystem {
    Esm,
    CommonJs,
}

/// ESM when the file uses import/export, CommonJS when it uses `require` or
/// `module.exports`; otherwise decided by a `.cjs`/`.cts` extension.
pub fn module_system(module: &SourceModule) -> ModuleSystem {
    let source = module.source();
    let mut saw_commonjs = false;

    for statement in named_children(module.root()) {
        match statement.kind() {
            "import_statement" | "export_statement" => return ModuleSystem::Esm,
            "expression_statement" | "lexical_declaration" | "variable_declaration" => {
                let text = get_node_text(statement, source);
                if text.contains("require(")
                    || text.contains("module.exports")
                    || text.starts_with("exports.")
                {
                    saw_commonjs = true;
                }
            }
            _ => {}
        }
    }

    if saw_commonjs {
        return ModuleSystem::CommonJs;
    }

    let commonjs_ext = module
        .path()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|ext| matches!(ext, "cjs" | "cts"))
        .unwrap_or(false);
    if commonjs_ext {
        ModuleSystem::CommonJs
    } else {
        ModuleSystem::Esm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;

    fn js(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::JavaScript).unwrap()
    }

    #[test]
    fn test_detects_esm_import() {
        assert!(has_sentry_content(&js("import * as Sentry from '@sentry/remix';\n")));
        assert!(has_sentry_content(&js("import { sentryVitePlugin } from \"@sentry/vite-plugin\";\n")));
    }

    #[test]
    fn test_detects_require_anywhere() {
        assert!(has_sentry_content(&js(
            "const { withSentryConfig } = require('@sentry/nextjs');\nmodule.exports = {};\n"
        )));
        assert!(has_sentry_content(&js(
            "function load() { return require('@sentry/node'); }\n"
        )));
    }

    #[test]
    fn test_no_substring_false_positive() {
        assert!(!has_sentry_content(&js("import x from 'webpack-plugin-@sentry';\n")));
        assert!(!has_sentry_content(&js("import x from '@sentry-internal/tracing';\n")));
        assert!(!has_sentry_content(&js("const s = '@sentry/react';\n")));
    }

    #[test]
    fn test_scope_matching() {
        assert!(is_in_scope("@sentry/vite-plugin", SENTRY_SCOPE));
        assert!(is_in_scope("@sentry", SENTRY_SCOPE));
        assert!(!is_in_scope("@sentryx/foo", SENTRY_SCOPE));
    }

    #[test]
    fn test_module_system() {
        assert_eq!(module_system(&js("import a from 'a';\n")), ModuleSystem::Esm);
        assert_eq!(
            module_system(&js("const a = require('a');\nmodule.exports = a;\n")),
            ModuleSystem::CommonJs
        );
        assert_eq!(module_system(&js("foo();\n")), ModuleSystem::Esm);
    }
}
