//! SvelteKit `hooks.client` / `hooks.server` instrumentation.

use tracing::debug;
use tree_sitter::Node;

use crate::codemod::builder::{Expr, ImportSpec, Printer, Stmt};
use crate::codemod::common::{contains_call, js_call_arguments, line_indent, unwrap_expression};
use crate::codemod::entry::{build_init_call, EntryTarget};
use crate::codemod::locate::{find_named_export, is_call_to, NamedExportKind};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::Changeset;
use crate::error::{CodemodError, Result};
use crate::options::CodemodContext;

const SDK: &str = "@sentry/sveltekit";
const KIT_HOOKS: &str = "@sveltejs/kit/hooks";
const HANDLE_ERROR_WRAPPER: &str = "handleErrorWithSentry";
const SENTRY_HANDLE: &str = "sentryHandle";
const SEQUENCE: &str = "sequence";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HooksSide {
    Client,
    Server,
}

/// Which hooks file and whether it should initialize the SDK itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HooksTarget {
    pub side: HooksSide,
    pub init: bool,
}

impl HooksTarget {
    pub fn client() -> Self {
        Self {
            side: HooksSide::Client,
            init: true,
        }
    }

    /// Server init lives in `instrumentation.server`
    pub fn server() -> Self {
        Self {
            side: HooksSide::Server,
            init: false,
        }
    }
}

/// Wrap `handleError` (and `handle` on the server) with the SDK helpers
pub fn instrument_sveltekit_hooks(
    module: &mut SourceModule,
    target: HooksTarget,
    ctx: &CodemodContext,
) -> Result<()> {
    let printer = Printer::for_module(module);
    let mut changes = Changeset::new();
    let mut appended = Vec::new();

    if target.init {
        let entry = match target.side {
            HooksSide::Client => EntryTarget::sveltekit_client(),
            HooksSide::Server => EntryTarget::sveltekit_server(),
        };
        changes.add_import(ImportSpec::sentry(SDK));
        changes.insert_after_imports(Stmt::expr(build_init_call(&entry, ctx)));
    }

    let handle_error = HookWrap {
        name: "handleError",
        wrapper: HANDLE_ERROR_WRAPPER,
        composer: None,
    };
    if handle_error.plan(module, &printer, &mut changes, &mut appended)? {
        changes.add_import(ImportSpec::named(SDK, HANDLE_ERROR_WRAPPER));
    }

    if target.side == HooksSide::Server {
        let handle = HookWrap {
            name: "handle",
            wrapper: SENTRY_HANDLE,
            composer: Some(SEQUENCE),
        };
        if handle.plan(module, &printer, &mut changes, &mut appended)? {
            changes.add_import(ImportSpec::named(SDK, SENTRY_HANDLE));
            changes.add_import(ImportSpec::named(KIT_HOOKS, SEQUENCE));
        }
    }

    if !appended.is_empty() {
        let current = module.text();
        let nl = printer.newline;
        let lead = if current.trim().is_empty() {
            ""
        } else if current.ends_with('\n') {
            nl
        } else {
            "\n\n"
        };
        let body = appended
            .iter()
            .map(|stmt| printer.stmt(stmt, ""))
            .collect::<Vec<_>>()
            .join(&format!("{}{}", nl, nl));
        changes.push(Edit::insert(current.len(), format!("{}{}{}", lead, body, nl)));
    }

    changes.apply_to(module)
}

/// One exported hook to route through an SDK helper
struct HookWrap {
    name: &'static str,
    /// `handleErrorWithSentry(...)` style wrapper, or `sentryHandle()` when composed
    wrapper: &'static str,
    /// `sequence(sentryHandle(), ...)` composition
    composer: Option<&'static str>,
}

impl HookWrap {
    /// The instrumented expression around `inner`
    fn wrapped(&self, inner: Option<Expr>) -> Expr {
        match self.composer {
            Some(composer) => {
                let mut args = vec![Expr::call_path(self.wrapper, vec![])];
                args.extend(inner);
                Expr::call_path(composer, args)
            }
            None => Expr::call_path(self.wrapper, inner.into_iter().collect()),
        }
    }

    /// Queue the edits for this hook; false when it is already instrumented
    fn plan(
        &self,
        module: &SourceModule,
        printer: &Printer,
        changes: &mut Changeset,
        appended: &mut Vec<Stmt>,
    ) -> Result<bool> {
        let source = module.source();
        let Some(export) = find_named_export(module, self.name) else {
            debug!(path = %module.display_path(), hook = self.name, "adding hook export");
            appended.push(Stmt::export_const(self.name, self.wrapped(None)));
            return Ok(true);
        };

        match export.kind {
            NamedExportKind::Function(declaration) => {
                // The declaration becomes a named function expression
                let function = Expr::Source(module.node_text(declaration).to_string());
                let stmt = Stmt::export_const(self.name, self.wrapped(Some(function)));
                changes.push(Edit::replace(export.statement, printer.stmt(&stmt, "")));
            }
            NamedExportKind::Variable {
                value: Some(value), ..
            } => {
                if contains_call(value, source, &[self.wrapper]) {
                    debug!(path = %module.display_path(), hook = self.name, "hook already wrapped");
                    return Ok(false);
                }
                match self.composer {
                    Some(composer) if is_call_to(value, source, &[composer]) => {
                        changes.push(prepend_argument(
                            unwrap_expression(value),
                            printer.expr_inline(&Expr::call_path(self.wrapper, vec![])),
                        )?);
                    }
                    _ => {
                        let inner = Expr::Source(module.node_text(value).to_string());
                        let indent = line_indent(module.text(), value.start_byte());
                        changes.push(Edit::replace(value, printer.expr(&self.wrapped(Some(inner)), indent)));
                    }
                }
            }
            NamedExportKind::Variable { value: None, .. } | NamedExportKind::Clause(_) => {
                return Err(CodemodError::ambiguous(
                    self.name,
                    "the hook is not defined in its export statement",
                ));
            }
        }
        debug!(path = %module.display_path(), hook = self.name, "wrapping hook");
        Ok(true)
    }
}

/// Insert `text` as the first argument of `call`
fn prepend_argument(call: Node, text: String) -> Result<Edit> {
    let arguments = call
        .child_by_field_name("arguments")
        .ok_or_else(|| CodemodError::ambiguous("sequence", "call without arguments"))?;
    Ok(match js_call_arguments(call).first() {
        Some(first) => Edit::insert(first.start_byte(), format!("{}, ", text)),
        None => Edit::insert(arguments.start_byte() + 1, text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;
    use crate::options::{FeatureSelection, ProjectInfo};
    use pretty_assertions::assert_eq;

    fn ctx() -> CodemodContext {
        CodemodContext::new(FeatureSelection::none(), ProjectInfo::new("dsn", "acme", "web"))
    }

    fn ts(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::TypeScript).unwrap()
    }

    #[test]
    fn test_empty_server_hooks_get_both_exports() {
        let mut module = ts("");
        instrument_sveltekit_hooks(&mut module, HooksTarget::server(), &ctx()).unwrap();
        assert_eq!(
            module.print(),
            "import { handleErrorWithSentry, sentryHandle } from \"@sentry/sveltekit\";\nimport { sequence } from \"@sveltejs/kit/hooks\";\nexport const handleError = handleErrorWithSentry();\n\nexport const handle = sequence(sentryHandle());\n"
        );
    }

    #[test]
    fn test_function_declarations_become_wrapped_expressions() {
        let mut module = ts(
            "import type { Handle } from \"@sveltejs/kit\";\n\nexport async function handle({ event, resolve }) {\n  return resolve(event);\n}\n\nexport function handleError({ error }) {\n  console.error(error);\n}\n",
        );
        instrument_sveltekit_hooks(&mut module, HooksTarget::server(), &ctx()).unwrap();
        let text = module.print();
        assert!(text.contains("export const handle = sequence(sentryHandle(), async function handle({ event, resolve }) {\n  return resolve(event);\n});"));
        assert!(text.contains("export const handleError = handleErrorWithSentry(function handleError({ error }) {\n  console.error(error);\n});"));
    }

    #[test]
    fn test_existing_sequence_gains_sentry_handle() {
        let mut module = ts("export const handle = sequence(auth, logger);\nexport const handleError = ({ error }) => console.error(error);\n");
        instrument_sveltekit_hooks(&mut module, HooksTarget::server(), &ctx()).unwrap();
        let text = module.print();
        assert!(text.contains("export const handle = sequence(sentryHandle(), auth, logger);"));
        assert!(text.contains("export const handleError = handleErrorWithSentry(({ error }) => console.error(error));"));
    }

    #[test]
    fn test_client_hooks_get_init() {
        let mut module = ts("import { dev } from \"$app/environment\";\n");
        instrument_sveltekit_hooks(&mut module, HooksTarget::client(), &ctx()).unwrap();
        let text = module.print();
        assert!(text.contains("import * as Sentry from \"@sentry/sveltekit\";"));
        assert!(text.contains("Sentry.init({"));
        assert!(text.ends_with("export const handleError = handleErrorWithSentry();\n"));
        assert!(!text.contains("sentryHandle"));
    }

    #[test]
    fn test_export_list_is_ambiguous() {
        let mut module = ts("const handleError = () => {};\nexport { handleError };\n");
        let err = instrument_sveltekit_hooks(&mut module, HooksTarget::client(), &ctx()).unwrap_err();
        assert!(err.is_anchor_error());
    }
}
