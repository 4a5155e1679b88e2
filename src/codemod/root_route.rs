//! Root route instrumentation: the `ErrorBoundary` export and the default
//! export wrapper.

use tracing::debug;
use tree_sitter::Node;

use crate::codemod::builder::{Arrow, ArrowBody, Expr, ImportSpec, Param, Printer, Stmt};
use crate::codemod::common::{contains_call, get_node_text, line_indent, named_children};
use crate::codemod::locate::{
    default_export, default_export_shape, exported_function, find_named_export,
    DefaultExportShape, FunctionShape, NamedExportKind,
};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::{wrap_node, Changeset};
use crate::error::{CodemodError, Result};

const ERROR_BOUNDARY: &str = "ErrorBoundary";
const REMIX_RUNTIME: &str = "@remix-run/react";
const ROUTE_ERROR_HOOK: &str = "useRouteError";
const FALLBACK_TEXT: &str = "Something went wrong";

/// How the framework hands the error to the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFlavor {
    /// `const error = useRouteError()`
    Remix,
    /// `function ErrorBoundary({ error })`
    ReactRouter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRouteTarget {
    pub flavor: BoundaryFlavor,
    pub sdk_package: String,
    /// Wrapper for the default export, if the framework needs one
    pub wrap_with: Option<String>,
}

impl RootRouteTarget {
    pub fn remix() -> Self {
        Self {
            flavor: BoundaryFlavor::Remix,
            sdk_package: "@sentry/remix".to_string(),
            wrap_with: Some("withSentry".to_string()),
        }
    }

    pub fn react_router() -> Self {
        Self {
            flavor: BoundaryFlavor::ReactRouter,
            sdk_package: "@sentry/react-router".to_string(),
            wrap_with: None,
        }
    }

    fn capture_function(&self) -> &'static str {
        match self.flavor {
            BoundaryFlavor::Remix => "captureRemixErrorBoundaryError",
            BoundaryFlavor::ReactRouter => "captureException",
        }
    }
}

/// Capture calls that count as an instrumented boundary
const CAPTURE_CALLS: &[&str] = &["captureRemixErrorBoundaryError", "captureException"];

/// Ensure the error boundary reports to Sentry, then wrap the default export
pub fn instrument_root_route(module: &mut SourceModule, target: &RootRouteTarget) -> Result<()> {
    instrument_error_boundary(module, target)?;
    if let Some(wrapper) = &target.wrap_with {
        wrap_default_export(module, wrapper, &target.sdk_package)?;
    }
    Ok(())
}

// ============ Error Boundary ============

pub fn instrument_error_boundary(module: &mut SourceModule, target: &RootRouteTarget) -> Result<()> {
    let printer = Printer::for_module(module);
    let mut changes = Changeset::new();

    match find_named_export(module, ERROR_BOUNDARY) {
        None => {
            let template = boundary_template(target);
            let text = printer.stmt(&template, "");
            let nl = printer.newline;
            match default_export(module) {
                Some(statement) => {
                    changes.push(Edit::insert(statement.start_byte(), format!("{}{}{}", text, nl, nl)))
                }
                None => changes.push(append_at_end(module, &text, nl)),
            }
            if target.flavor == BoundaryFlavor::Remix {
                changes.add_import(ImportSpec::named(REMIX_RUNTIME, ROUTE_ERROR_HOOK));
            }
            debug!(path = %module.display_path(), "adding ErrorBoundary export");
        }
        Some(export) => {
            if let NamedExportKind::Clause(_) = export.kind {
                return Err(CodemodError::ambiguous(
                    ERROR_BOUNDARY,
                    "exported through an export list",
                ));
            }
            let shape = exported_function(&export).ok_or_else(|| {
                CodemodError::ambiguous(ERROR_BOUNDARY, "the export is not a function")
            })?;
            if contains_call(shape.node, module.source(), CAPTURE_CALLS) {
                debug!(path = %module.display_path(), "ErrorBoundary already captures errors");
                return Ok(());
            }
            merge_capture(module, &printer, &shape, target, &mut changes)?;
        }
    }

    changes.add_import(ImportSpec::named(&target.sdk_package, target.capture_function()));
    changes.apply_to(module)
}

fn boundary_template(target: &RootRouteTarget) -> Stmt {
    let capture = Stmt::expr(Expr::call_path(
        target.capture_function(),
        vec![Expr::ident("error")],
    ));
    let fallback = Stmt::Return(Expr::jsx("div", FALLBACK_TEXT));

    match target.flavor {
        BoundaryFlavor::Remix => Stmt::export_const(
            ERROR_BOUNDARY,
            Expr::arrow(Arrow {
                is_async: false,
                params: vec![],
                body: ArrowBody::Block(vec![
                    Stmt::constant("error", Expr::call_path(ROUTE_ERROR_HOOK, vec![])),
                    capture,
                    fallback,
                ]),
            }),
        ),
        BoundaryFlavor::ReactRouter => Stmt::Function {
            export: true,
            is_async: false,
            name: ERROR_BOUNDARY.to_string(),
            params: vec![Param::object(&["error"]).typed("{ error: unknown }")],
            body: vec![capture, fallback],
        },
    }
}

/// Thread the error value into an existing boundary and capture it as soon
/// as it is bound, ahead of every return path
fn merge_capture(
    module: &SourceModule,
    printer: &Printer,
    shape: &FunctionShape,
    target: &RootRouteTarget,
    changes: &mut Changeset,
) -> Result<()> {
    if !shape.is_block() {
        return Err(CodemodError::ambiguous(ERROR_BOUNDARY, "expression-bodied function"));
    }
    let source = module.source();
    let first = shape
        .statements()
        .first()
        .copied()
        .ok_or_else(|| CodemodError::ambiguous(ERROR_BOUNDARY, "empty function body"))?;
    let first_indent = line_indent(module.text(), first.start_byte()).to_string();
    let nl = printer.newline;

    let mut prelude = Vec::new();
    let mut bound_by = None;
    let error = match error_from_params(shape, source) {
        Some(name) => name,
        None => match target.flavor {
            BoundaryFlavor::Remix => match hook_binding(shape, source) {
                Some((statement, name)) => {
                    bound_by = Some(statement);
                    name
                }
                None => {
                    prelude.push(Stmt::constant("error", Expr::call_path(ROUTE_ERROR_HOOK, vec![])));
                    changes.add_import(ImportSpec::named(REMIX_RUNTIME, ROUTE_ERROR_HOOK));
                    "error".to_string()
                }
            },
            BoundaryFlavor::ReactRouter => {
                changes.extend(thread_error_param(module, shape)?);
                "error".to_string()
            }
        },
    };

    let capture = Stmt::expr(Expr::call_path(target.capture_function(), vec![Expr::path(&error)]));
    match bound_by {
        Some(statement) => {
            let indent = line_indent(module.text(), statement.start_byte());
            changes.push(Edit::insert(
                statement.end_byte(),
                format!("{}{}{}", nl, indent, printer.stmt(&capture, indent)),
            ));
        }
        None => {
            prelude.push(capture);
            let text: String = prelude
                .iter()
                .map(|stmt| format!("{}{}{}", printer.stmt(stmt, &first_indent), nl, first_indent))
                .collect();
            changes.push(Edit::insert(first.start_byte(), text));
        }
    }
    debug!(path = %module.display_path(), error = %error, "capturing in existing ErrorBoundary");
    Ok(())
}

/// `{ error }`, `{ error: e }` or `props` (as `props.error`) in the first parameter
fn error_from_params(shape: &FunctionShape, source: &[u8]) -> Option<String> {
    let first = shape.params().into_iter().next()?;
    match first.kind() {
        "object_pattern" => named_children(first).into_iter().find_map(|binding| {
            match binding.kind() {
                "shorthand_property_identifier_pattern"
                    if get_node_text(binding, source) == "error" =>
                {
                    Some("error".to_string())
                }
                "pair_pattern" => {
                    let key = binding.child_by_field_name("key")?;
                    let value = binding.child_by_field_name("value")?;
                    (get_node_text(key, source) == "error" && value.kind() == "identifier")
                        .then(|| get_node_text(value, source).to_string())
                }
                _ => None,
            }
        }),
        "identifier" => Some(format!("{}.error", get_node_text(first, source))),
        _ => None,
    }
}

/// `const <name> = useRouteError()` among the top-level statements, with the
/// declaring statement
fn hook_binding<'t>(shape: &FunctionShape<'t>, source: &[u8]) -> Option<(Node<'t>, String)> {
    shape.statements().into_iter().find_map(|statement| {
        if !matches!(statement.kind(), "lexical_declaration" | "variable_declaration") {
            return None;
        }
        named_children(statement).into_iter().find_map(|declarator| {
            let value = declarator.child_by_field_name("value")?;
            let name = declarator.child_by_field_name("name")?;
            (name.kind() == "identifier" && contains_call(value, source, &[ROUTE_ERROR_HOOK]))
                .then(|| (statement, get_node_text(name, source).to_string()))
        })
    })
}

/// Make `error` available as a destructured prop
fn thread_error_param(module: &SourceModule, shape: &FunctionShape) -> Result<Vec<Edit>> {
    let raw_params = shape.parameters.map(named_children).unwrap_or_default();
    match raw_params.first() {
        None => {
            let parameters = shape
                .parameters
                .ok_or_else(|| CodemodError::ambiguous(ERROR_BOUNDARY, "unexpected parameters"))?;
            Ok(vec![Edit::replace(parameters, "({ error })")])
        }
        Some(_) => {
            let pattern = shape.params()[0];
            if pattern.kind() != "object_pattern" {
                return Err(CodemodError::ambiguous(
                    ERROR_BOUNDARY,
                    format!("unsupported props parameter `{}`", module.node_text(pattern)),
                ));
            }
            match named_children(pattern).last() {
                Some(last) => Ok(vec![Edit::insert(last.end_byte(), ", error")]),
                None => Ok(vec![Edit::replace(pattern, "{ error }")]),
            }
        }
    }
}

fn append_at_end(module: &SourceModule, text: &str, nl: &str) -> Edit {
    let current = module.text();
    let lead = if current.is_empty() {
        ""
    } else if current.ends_with('\n') {
        nl
    } else {
        "\n\n"
    };
    Edit::insert(current.len(), format!("{}{}{}", lead, text, nl))
}

// ============ Default Export ============

/// Wrap the default export in `wrapper(...)`, importing it from `from_module`.
/// An export that already goes through the wrapper is left alone.
pub fn wrap_default_export(module: &mut SourceModule, wrapper: &str, from_module: &str) -> Result<()> {
    let printer = Printer::for_module(module);
    let nl = printer.newline;
    let mut changes = Changeset::new();

    match default_export_shape(module, &[wrapper])? {
        DefaultExportShape::Wrapped { .. } => {
            debug!(path = %module.display_path(), "default export already wrapped");
            return Ok(());
        }
        DefaultExportShape::FunctionDeclaration {
            statement,
            declaration,
            name,
        } => {
            // Hoist the declaration and export the wrapped binding below it
            let export = Stmt::ExportDefault(Expr::wrap(wrapper, Expr::ident(name)));
            changes.push(Edit::replace_range(statement.start_byte(), declaration.start_byte(), ""));
            changes.push(Edit::insert(
                statement.end_byte(),
                format!("{}{}{}", nl, nl, printer.stmt(&export, "")),
            ));
        }
        DefaultExportShape::Identifier { value, .. } => {
            changes.push(wrap_node(module, &printer, value, wrapper));
        }
        DefaultExportShape::Unrecognized { statement } => {
            let first_line = module.node_text(statement).lines().next().unwrap_or("").to_string();
            return Err(CodemodError::ambiguous("default export", first_line));
        }
    }

    changes.add_import(ImportSpec::named(from_module, wrapper));
    changes.apply_to(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;
    use pretty_assertions::assert_eq;

    fn tsx(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::TypeScriptTsx).unwrap()
    }

    const REMIX_ROOT: &str = r#"import { Outlet } from "@remix-run/react";

export default function App() {
  return <Outlet />;
}
"#;

    #[test]
    fn test_remix_root_gets_boundary_and_wrapper() {
        let mut module = tsx(REMIX_ROOT);
        instrument_root_route(&mut module, &RootRouteTarget::remix()).unwrap();
        assert_eq!(
            module.print(),
            r#"import { Outlet, useRouteError } from "@remix-run/react";
import { captureRemixErrorBoundaryError, withSentry } from "@sentry/remix";

export const ErrorBoundary = () => {
  const error = useRouteError();
  captureRemixErrorBoundaryError(error);
  return <div>Something went wrong</div>;
};

function App() {
  return <Outlet />;
}

export default withSentry(App);
"#
        );
    }

    #[test]
    fn test_existing_boundary_gets_hook_and_capture() {
        let mut module = tsx(
            "export function ErrorBoundary() {\n  return <p>Oops</p>;\n}\n\nexport default App;\n",
        );
        instrument_error_boundary(&mut module, &RootRouteTarget::remix()).unwrap();
        assert_eq!(
            module.print(),
            "import { useRouteError } from \"@remix-run/react\";\nimport { captureRemixErrorBoundaryError } from \"@sentry/remix\";\n\nexport function ErrorBoundary() {\n  const error = useRouteError();\n  captureRemixErrorBoundaryError(error);\n  return <p>Oops</p>;\n}\n\nexport default App;\n"
        );
    }

    #[test]
    fn test_existing_hook_binding_is_reused() {
        let mut module = tsx(
            "import { useRouteError } from \"@remix-run/react\";\n\nexport const ErrorBoundary = () => {\n  const err = useRouteError();\n  return <p>{String(err)}</p>;\n};\n",
        );
        instrument_error_boundary(&mut module, &RootRouteTarget::remix()).unwrap();
        let text = module.print();
        assert!(text.contains("  const err = useRouteError();\n  captureRemixErrorBoundaryError(err);\n  return"));
        assert_eq!(text.matches("useRouteError()").count(), 1);
    }

    #[test]
    fn test_capture_precedes_early_returns() {
        let mut module = tsx(
            "import { isRouteErrorResponse, useRouteError } from \"@remix-run/react\";\n\nexport function ErrorBoundary() {\n  const error = useRouteError();\n  if (isRouteErrorResponse(error)) {\n    return <p>{error.status}</p>;\n  }\n  return <p>oops</p>;\n}\n",
        );
        instrument_error_boundary(&mut module, &RootRouteTarget::remix()).unwrap();
        let text = module.print();
        assert!(text.contains(
            "  const error = useRouteError();\n  captureRemixErrorBoundaryError(error);\n  if (isRouteErrorResponse(error)) {"
        ));
        assert_eq!(text.matches("captureRemixErrorBoundaryError(error)").count(), 1);
    }

    #[test]
    fn test_prop_error_is_captured_before_branches() {
        let mut module = tsx(
            "export function ErrorBoundary({ error }) {\n  if (!error) {\n    return null;\n  }\n  return <p>oops</p>;\n}\n",
        );
        instrument_error_boundary(&mut module, &RootRouteTarget::react_router()).unwrap();
        assert!(module
            .print()
            .contains("export function ErrorBoundary({ error }) {\n  captureException(error);\n  if (!error) {"));
    }

    #[test]
    fn test_react_router_boundary_threads_error_prop() {
        let mut module = tsx("export function ErrorBoundary() {\n  return <p>Oops</p>;\n}\n");
        instrument_error_boundary(&mut module, &RootRouteTarget::react_router()).unwrap();
        let text = module.print();
        assert!(text.contains("export function ErrorBoundary({ error }) {\n  captureException(error);\n  return <p>Oops</p>;"));
        assert!(text.starts_with("import { captureException } from \"@sentry/react-router\";"));
    }

    #[test]
    fn test_react_router_boundary_with_props_object() {
        let mut module = tsx("export function ErrorBoundary({ error: e }) {\n  return <p>{e.message}</p>;\n}\n");
        instrument_error_boundary(&mut module, &RootRouteTarget::react_router()).unwrap();
        assert!(module.print().contains("  captureException(e);\n  return"));
    }

    #[test]
    fn test_existing_capture_is_not_duplicated() {
        let text = "import * as Sentry from \"@sentry/remix\";\nexport function ErrorBoundary() {\n  Sentry.captureRemixErrorBoundaryError(useRouteError());\n  return null;\n}\n";
        let mut module = tsx(text);
        instrument_error_boundary(&mut module, &RootRouteTarget::remix()).unwrap();
        assert_eq!(module.print(), text);
    }

    #[test]
    fn test_expression_bodied_boundary_is_ambiguous() {
        let mut module = tsx("export const ErrorBoundary = () => <p>Oops</p>;\n");
        let err = instrument_error_boundary(&mut module, &RootRouteTarget::remix()).unwrap_err();
        assert!(err.is_anchor_error());
    }

    #[test]
    fn test_wrap_identifier_export() {
        let mut module = tsx("function App() {\n  return null;\n}\n\nexport default App;\n");
        wrap_default_export(&mut module, "withSentry", "@sentry/remix").unwrap();
        assert_eq!(
            module.print(),
            "import { withSentry } from \"@sentry/remix\";\n\nfunction App() {\n  return null;\n}\n\nexport default withSentry(App);\n"
        );
    }

    #[test]
    fn test_wrap_unrecognized_export_fails() {
        let mut module = tsx("export default () => null;\n");
        let err = wrap_default_export(&mut module, "withSentry", "@sentry/remix").unwrap_err();
        assert!(matches!(err, CodemodError::AmbiguousShape { .. }));
        assert!(!module.is_modified());
    }
}
