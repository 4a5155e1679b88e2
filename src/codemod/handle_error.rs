//! Server `handleError` instrumentation.
//!
//! Adds a reporting `handleError` export, or merges a guarded
//! `Sentry.captureException` into the user's existing one.

use tracing::debug;
use tree_sitter::Node;

use crate::codemod::builder::{Arrow, ArrowBody, Expr, ImportSpec, Param, Printer, Stmt};
use crate::codemod::common::{contains_call, get_node_text, line_indent, named_children, unwrap_expression};
use crate::codemod::locate::{
    exported_function, find_named_export, is_call_to, FunctionShape, NamedExportKind,
};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::Changeset;
use crate::error::{CodemodError, Result};

const HANDLE_ERROR: &str = "handleError";

/// Calls that mean the handler already reports to Sentry
const DELEGATES: &[&str] = &[
    "sentryHandleError",
    "wrapHandleErrorWithSentry",
    "handleErrorWithSentry",
    "captureException",
    "captureRemixServerException",
];

/// The statements reporting `error` unless the request was aborted
fn guarded_capture(error: &str, request: &str, log: bool) -> Stmt {
    let mut then = vec![Stmt::expr(Expr::call_path(
        "Sentry.captureException",
        vec![Expr::path(error)],
    ))];
    if log {
        then.push(Stmt::expr(Expr::call_path("console.error", vec![Expr::path(error)])));
    }
    Stmt::If {
        test: Expr::not(Expr::path(&format!("{}.signal.aborted", request))),
        then,
    }
}

pub fn default_handle_error() -> Stmt {
    Stmt::export_const(
        HANDLE_ERROR,
        Expr::arrow(Arrow {
            is_async: false,
            params: vec![Param::ident("error"), Param::object(&["request"])],
            body: ArrowBody::Block(vec![
                Stmt::comment("Aborted requests are interrupted navigations, not errors"),
                guarded_capture("error", "request", true),
            ]),
        }),
    )
}

/// Ensure the exported `handleError` reports errors to Sentry
pub fn instrument_handle_error(module: &mut SourceModule, sdk_package: &str) -> Result<()> {
    let printer = Printer::for_module(module);
    let mut changes = Changeset::new();

    match find_named_export(module, HANDLE_ERROR) {
        None => {
            debug!(path = %module.display_path(), "adding default handleError");
            changes.insert_after_imports(default_handle_error());
        }
        Some(export) => {
            if let NamedExportKind::Variable { value: Some(value), .. } = export.kind {
                if delegates(value, module.source()) {
                    debug!(path = %module.display_path(), "handleError already delegates to Sentry");
                    return Ok(());
                }
            }
            let shape = exported_function(&export).ok_or_else(|| {
                CodemodError::ambiguous(HANDLE_ERROR, "the export is not a function")
            })?;
            if contains_call(shape.node, module.source(), DELEGATES) {
                debug!(path = %module.display_path(), "handleError already captures errors");
                return Ok(());
            }
            merge_handler(module, &printer, &shape, &mut changes)?;
        }
    }

    changes.add_import(ImportSpec::sentry(sdk_package));
    changes.apply_to(module)
}

fn delegates(value: Node, source: &[u8]) -> bool {
    let value = unwrap_expression(value);
    match value.kind() {
        "member_expression" => {
            let text = get_node_text(value, source);
            DELEGATES.iter().any(|name| text.ends_with(name))
        }
        "call_expression" => is_call_to(value, source, DELEGATES),
        _ => false,
    }
}

/// Keep the user's statements, make sure error and request are bound, and
/// prepend the guarded capture
fn merge_handler(
    module: &SourceModule,
    printer: &Printer,
    shape: &FunctionShape,
    changes: &mut Changeset,
) -> Result<()> {
    if !shape.is_block() {
        return Err(CodemodError::ambiguous(HANDLE_ERROR, "expression-bodied function"));
    }
    let source = module.source();
    let raw_params = shape.parameters.map(named_children).unwrap_or_default();
    let patterns = shape.params();

    let error = match patterns.first() {
        None => "error".to_string(),
        Some(p) if p.kind() == "identifier" => get_node_text(*p, source).to_string(),
        Some(p) => {
            return Err(CodemodError::ambiguous(
                HANDLE_ERROR,
                format!("unsupported error parameter `{}`", get_node_text(*p, source)),
            ))
        }
    };

    let request = match (patterns.len(), shape.single_param) {
        (0, _) => {
            let parameters = shape
                .parameters
                .ok_or_else(|| CodemodError::ambiguous(HANDLE_ERROR, "unexpected parameters"))?;
            changes.push(Edit::replace(parameters, "(error, { request })"));
            "request".to_string()
        }
        (1, Some(single)) => {
            changes.push(Edit::replace(
                single,
                format!("({}, {{ request }})", get_node_text(single, source)),
            ));
            "request".to_string()
        }
        (1, None) => {
            let first = raw_params[0];
            changes.push(Edit::insert(first.end_byte(), ", { request }"));
            "request".to_string()
        }
        _ => request_binding(patterns[1], source, changes)?,
    };

    let body_statements = named_children(shape.body);
    let guard = guarded_capture(&error, &request, false);
    match body_statements.first() {
        Some(first) => {
            let indent = line_indent(module.text(), first.start_byte());
            changes.push(Edit::insert(
                first.start_byte(),
                format!("{}{}{}", printer.stmt(&guard, indent), printer.newline, indent),
            ));
        }
        None => {
            let indent = line_indent(module.text(), shape.body.start_byte());
            changes.push(Edit::replace(shape.body, printer.block(&[guard], indent)));
        }
    }
    debug!(path = %module.display_path(), error = %error, request = %request, "merging handleError");
    Ok(())
}

/// How the request is reachable from the second parameter
fn request_binding(pattern: Node, source: &[u8], changes: &mut Changeset) -> Result<String> {
    match pattern.kind() {
        "identifier" => Ok(format!("{}.request", get_node_text(pattern, source))),
        "object_pattern" => {
            let bindings = named_children(pattern);
            for binding in &bindings {
                match binding.kind() {
                    "shorthand_property_identifier_pattern"
                        if get_node_text(*binding, source) == "request" =>
                    {
                        return Ok("request".to_string());
                    }
                    "pair_pattern" => {
                        let key = binding.child_by_field_name("key").map(|k| get_node_text(k, source));
                        let value = binding.child_by_field_name("value");
                        if let (Some("request"), Some(value)) = (key, value) {
                            if value.kind() != "identifier" {
                                return Err(CodemodError::ambiguous(
                                    HANDLE_ERROR,
                                    "nested request destructuring",
                                ));
                            }
                            return Ok(get_node_text(value, source).to_string());
                        }
                    }
                    _ => {}
                }
            }
            match bindings.last() {
                Some(last) if last.kind() == "rest_pattern" => Err(CodemodError::ambiguous(
                    HANDLE_ERROR,
                    "rest pattern in context parameter",
                )),
                Some(last) => {
                    changes.push(Edit::insert(last.end_byte(), ", request"));
                    Ok("request".to_string())
                }
                None => {
                    changes.push(Edit::replace(pattern, "{ request }"));
                    Ok("request".to_string())
                }
            }
        }
        _ => Err(CodemodError::ambiguous(
            HANDLE_ERROR,
            format!("unsupported context parameter `{}`", get_node_text(pattern, source)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;
    use pretty_assertions::assert_eq;

    fn ts(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::TypeScript).unwrap()
    }

    #[test]
    fn test_missing_handler_is_added_after_imports() {
        let mut module = ts("import { ServerRouter } from \"react-router\";\n\nexport default handleRequest;\n");
        instrument_handle_error(&mut module, "@sentry/react-router").unwrap();
        assert_eq!(
            module.print(),
            r#"import { ServerRouter } from "react-router";
import * as Sentry from "@sentry/react-router";

export const handleError = (error, { request }) => {
  // Aborted requests are interrupted navigations, not errors
  if (!request.signal.aborted) {
    Sentry.captureException(error);
    console.error(error);
  }
};

export default handleRequest;
"#
        );
    }

    #[test]
    fn test_delegating_handler_is_left_alone() {
        let text = "export const handleError = Sentry.sentryHandleError;\n";
        let mut module = ts(text);
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert_eq!(module.print(), text);

        let text = "export const handleError = wrapHandleErrorWithSentry((error) => {\n  log(error);\n});\n";
        let mut module = ts(text);
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert_eq!(module.print(), text);
    }

    #[test]
    fn test_merge_into_function_declaration_adds_request() {
        let mut module = ts("export function handleError(err: unknown) {\n  log(err);\n}\n");
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert_eq!(
            module.print(),
            "import * as Sentry from \"@sentry/remix\";\n\nexport function handleError(err: unknown, { request }) {\n  if (!request.signal.aborted) {\n    Sentry.captureException(err);\n  }\n  log(err);\n}\n"
        );
    }

    #[test]
    fn test_merge_into_arrow_with_context_pattern() {
        let mut module = ts("export const handleError = (error, { params }) => {\n  report(error, params);\n};\n");
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        let text = module.print();
        assert!(text.contains("(error, { params, request }) => {\n  if (!request.signal.aborted) {"));
        assert!(text.contains("  report(error, params);\n};"));
    }

    #[test]
    fn test_merge_reuses_renamed_request_and_context_identifier() {
        let mut module = ts("export const handleError = (e, { request: req }) => {\n  log(e);\n};\n");
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert!(module.print().contains("if (!req.signal.aborted) {\n    Sentry.captureException(e);"));

        let mut module = ts("export function handleError(e, ctx) {\n  log(e);\n}\n");
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert!(module.print().contains("if (!ctx.request.signal.aborted) {"));
    }

    #[test]
    fn test_merge_adds_both_parameters() {
        let mut module = ts("export const handleError = () => {\n  notify();\n};\n");
        instrument_handle_error(&mut module, "@sentry/remix").unwrap();
        assert!(module.print().contains("export const handleError = (error, { request }) => {\n  if (!request.signal.aborted) {\n    Sentry.captureException(error);\n  }\n  notify();"));
    }

    #[test]
    fn test_expression_body_is_ambiguous() {
        let mut module = ts("export const handleError = (e) => log(e);\n");
        let err = instrument_handle_error(&mut module, "@sentry/remix").unwrap_err();
        assert!(err.is_anchor_error());
    }
}
