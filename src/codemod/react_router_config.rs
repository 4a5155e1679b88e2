//! `react-router.config.ts`: force SSR on and install the `buildEnd` hook
//! that uploads source maps.

use serde::Serialize;
use tracing::debug;

use crate::codemod::builder::{Arrow, ArrowBody, Expr, ImportSpec, Param, Printer, Property, Stmt};
use crate::codemod::common::{contains_call, unwrap_expression};
use crate::codemod::locate::{default_config_object, find_property, PropertyMatch};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::{insert_property, Changeset};
use crate::error::{CodemodError, Result};

const SDK: &str = "@sentry/react-router";
const BUILD_END: &str = "buildEnd";
const BUILD_END_HOOK: &str = "sentryOnBuildEnd";
const BUILD_END_ARGS: [&str; 3] = ["viteConfig", "reactRouterConfig", "buildManifest"];

/// Whether the `ssr` flag had to be flipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrChange {
    pub ssr_was_changed: bool,
}

fn build_end_hook() -> Expr {
    let args = Expr::object(BUILD_END_ARGS.iter().map(|name| Property::shorthand(name)).collect());
    Expr::arrow(Arrow {
        is_async: true,
        params: vec![Param::object(&BUILD_END_ARGS)],
        body: ArrowBody::Block(vec![Stmt::expr(Expr::await_(Expr::call_path(
            BUILD_END_HOOK,
            vec![args],
        )))]),
    })
}

/// Set `ssr: true` and add `buildEnd` calling `sentryOnBuildEnd`.
///
/// An existing `buildEnd` with other logic is never overwritten:
/// that is a [`CodemodError::HookAlreadyExists`].
pub fn instrument_react_router_config(module: &mut SourceModule) -> Result<SsrChange> {
    let printer = Printer::for_module(module);
    let source = module.source();
    let config = default_config_object(module)?;
    let mut changes = Changeset::new();
    let mut outcome = SsrChange::default();

    let needs_hook = match find_property(config.object, BUILD_END, source) {
        None => true,
        Some(existing) if contains_call(existing.node(), source, &[BUILD_END_HOOK]) => {
            debug!(path = %module.display_path(), "buildEnd already calls sentryOnBuildEnd");
            false
        }
        Some(_) => return Err(CodemodError::HookAlreadyExists(BUILD_END.to_string())),
    };

    match find_property(config.object, "ssr", source) {
        Some(PropertyMatch::Pair { value, .. }) => match unwrap_expression(value).kind() {
            "false" => {
                changes.push(Edit::replace(value, "true"));
                outcome.ssr_was_changed = true;
            }
            "true" => {}
            _ => {
                return Err(CodemodError::ambiguous(
                    "ssr",
                    format!("expected a boolean, found `{}`", module.node_text(value)),
                ))
            }
        },
        Some(_) => return Err(CodemodError::ambiguous("ssr", "not a plain property")),
        // SSR is on by default
        None => {}
    }

    if needs_hook {
        changes.extend(insert_property(
            module,
            &printer,
            config.object,
            &Property::new(BUILD_END, build_end_hook()),
        ));
        changes.add_import(ImportSpec::named(SDK, BUILD_END_HOOK));
    }

    changes.apply_to(module)?;
    debug!(
        path = %module.display_path(),
        ssr_was_changed = outcome.ssr_was_changed,
        "instrumented react-router config"
    );
    Ok(outcome)
}
