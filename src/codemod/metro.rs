//! React Native Metro config: route bundles through the Sentry serializer.

use tracing::debug;

use crate::codemod::builder::{Expr, ImportSpec, Printer, Property};
use crate::codemod::common::unwrap_expression;
use crate::codemod::locate::{default_config_object, find_property, is_call_to, PropertyMatch};
use crate::codemod::source::SourceModule;
use crate::codemod::splice::{insert_property, Changeset};
use crate::error::{CodemodError, Result};

pub const METRO_SERIALIZER_MODULE: &str = "@sentry/react-native/dist/js/tools/sentryMetroSerializer";
const SERIALIZER_FACTORY: &str = "createSentryMetroSerializer";

fn serializer_call() -> Expr {
    Expr::call_path(SERIALIZER_FACTORY, vec![])
}

/// Add `serializer.customSerializer: createSentryMetroSerializer()` to the
/// exported Metro config
pub fn instrument_metro_config(module: &mut SourceModule) -> Result<()> {
    let printer = Printer::for_module(module);
    let source = module.source();
    let config = default_config_object(module)?;
    let mut changes = Changeset::new();

    match find_property(config.object, "serializer", source) {
        None => {
            let serializer = Property::new(
                "serializer",
                Expr::object(vec![Property::new("customSerializer", serializer_call())]),
            );
            changes.extend(insert_property(module, &printer, config.object, &serializer));
        }
        Some(PropertyMatch::Pair { value, .. }) => {
            let serializer = unwrap_expression(value);
            if serializer.kind() != "object" {
                return Err(CodemodError::ambiguous(
                    "serializer",
                    format!("expected an object literal, found `{}`", module.node_text(serializer)),
                ));
            }
            match find_property(serializer, "customSerializer", source) {
                None => changes.extend(insert_property(
                    module,
                    &printer,
                    serializer,
                    &Property::new("customSerializer", serializer_call()),
                )),
                Some(PropertyMatch::Pair { value, .. })
                    if is_call_to(value, source, &[SERIALIZER_FACTORY]) =>
                {
                    debug!(path = %module.display_path(), "Sentry serializer already configured");
                    return Ok(());
                }
                Some(other) => {
                    return Err(CodemodError::ambiguous(
                        "serializer.customSerializer",
                        format!("a custom serializer is already set: `{}`", module.node_text(other.node())),
                    ))
                }
            }
        }
        Some(_) => return Err(CodemodError::ambiguous("serializer", "not a plain property")),
    }

    changes.add_import(ImportSpec::named(METRO_SERIALIZER_MODULE, SERIALIZER_FACTORY));
    changes.apply_to(module)
}
