//! Nested boolean flags in config objects (`kit.experimental.tracing.server`).

use tracing::debug;

use crate::codemod::builder::{Expr, Printer, Property};
use crate::codemod::common::{line_indent, unwrap_expression};
use crate::codemod::locate::{default_config_object, find_property, PropertyMatch};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::insert_property;
use crate::error::{CodemodError, Result};

pub const MAX_FLAG_DEPTH: usize = 4;

/// A flag to switch on, addressed from the default-exported config object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    pub path: Vec<String>,
    /// Line comment placed above the leaf when an explicit `false` is flipped
    pub comment: String,
    /// String leaves (`sourcemap: "hidden"`) already count as enabled
    pub accept_strings: bool,
}

impl FlagSpec {
    pub fn new(path: &str, comment: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            comment: comment.to_string(),
            accept_strings: false,
        }
    }

    pub fn accepting_strings(mut self) -> Self {
        self.accept_strings = true;
        self
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }

    pub fn sveltekit_tracing() -> Self {
        Self::new(
            "kit.experimental.tracing.server",
            "Enabled to send server-side traces to Sentry",
        )
    }

    pub fn sveltekit_instrumentation() -> Self {
        Self::new(
            "kit.experimental.instrumentation.server",
            "Enabled to load instrumentation.server.js before the app",
        )
    }

    pub fn vite_sourcemaps() -> Self {
        Self::new("build.sourcemap", "Enabled to upload source maps to Sentry").accepting_strings()
    }
}

/// What happened to a flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagChange {
    AlreadyEnabled,
    /// The flag (and possibly its parents) were added
    Added,
    /// An explicit `false` became `true`
    Overwritten,
}

/// Walk the config object along `flag.path`, creating missing objects, and
/// set the leaf to `true`
pub fn enable_nested_flag(module: &mut SourceModule, flag: &FlagSpec) -> Result<FlagChange> {
    if flag.path.is_empty() || flag.path.len() > MAX_FLAG_DEPTH {
        return Err(CodemodError::ambiguous(
            flag.dotted(),
            format!("flag paths must have 1 to {} segments", MAX_FLAG_DEPTH),
        ));
    }

    let printer = Printer::for_module(module);
    let source = module.source();
    let mut object = default_config_object(module)?.object;
    let (leaf, parents) = flag.path.split_last().ok_or_else(|| CodemodError::not_found("flag"))?;

    for (depth, segment) in parents.iter().enumerate() {
        match find_property(object, segment, source) {
            Some(PropertyMatch::Pair { value, .. }) => {
                let value = unwrap_expression(value);
                if value.kind() != "object" {
                    return Err(CodemodError::ambiguous(
                        flag.path[..=depth].join("."),
                        format!("expected an object literal, found `{}`", module.node_text(value)),
                    ));
                }
                object = value;
            }
            Some(_) => {
                return Err(CodemodError::ambiguous(
                    flag.path[..=depth].join("."),
                    "not a plain property",
                ))
            }
            None => {
                let property = nested_property(&flag.path[depth..]);
                let edits = insert_property(module, &printer, object, &property);
                debug!(flag = %flag.dotted(), created = %segment, "creating nested config object");
                module.apply(edits)?;
                return Ok(FlagChange::Added);
            }
        }
    }

    match find_property(object, leaf, source) {
        None => {
            let edits = insert_property(module, &printer, object, &Property::new(leaf, Expr::Bool(true)));
            module.apply(edits)?;
            Ok(FlagChange::Added)
        }
        Some(PropertyMatch::Pair { pair, value }) => match value.kind() {
            "true" => Ok(FlagChange::AlreadyEnabled),
            "string" | "template_string" if flag.accept_strings => Ok(FlagChange::AlreadyEnabled),
            "false" => {
                let indent = line_indent(module.text(), pair.start_byte()).to_string();
                let comment = if pair.start_position().row == object.start_position().row {
                    format!("/* {} */ ", flag.comment)
                } else {
                    format!("// {}{}{}", flag.comment, printer.newline, indent)
                };
                let edits = vec![Edit::insert(pair.start_byte(), comment), Edit::replace(value, "true")];
                debug!(flag = %flag.dotted(), "overwriting explicit false");
                module.apply(edits)?;
                Ok(FlagChange::Overwritten)
            }
            _ => Err(CodemodError::ambiguous(
                flag.dotted(),
                format!("expected a boolean, found `{}`", module.node_text(value)),
            )),
        },
        Some(_) => Err(CodemodError::ambiguous(flag.dotted(), "not a plain property")),
    }
}

/// `a: { b: { c: true } }` for the remaining segments
fn nested_property(segments: &[String]) -> Property {
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => return Property::new("", Expr::Bool(true)),
    };
    let mut property = Property::new(leaf, Expr::Bool(true));
    for segment in parents.iter().rev() {
        property = Property::new(segment, Expr::object(vec![property]));
    }
    property
}

/// Enable both SvelteKit server flags needed for tracing
pub fn enable_sveltekit_tracing(module: &mut SourceModule) -> Result<(FlagChange, FlagChange)> {
    let tracing = enable_nested_flag(module, &FlagSpec::sveltekit_tracing())?;
    let instrumentation = enable_nested_flag(module, &FlagSpec::sveltekit_instrumentation())?;
    Ok((tracing, instrumentation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codemod::source::SourceLanguage;
    use pretty_assertions::assert_eq;

    fn js(text: &str) -> SourceModule {
        SourceModule::parse(text, SourceLanguage::JavaScript).unwrap()
    }

    #[test]
    fn test_creates_missing_objects() {
        let mut module = js(
            "import adapter from '@sveltejs/adapter-auto';\n\nconst config = {\n  kit: {\n    adapter: adapter(),\n  },\n};\n\nexport default config;\n",
        );
        let changes = enable_sveltekit_tracing(&mut module).unwrap();
        assert_eq!(changes, (FlagChange::Added, FlagChange::Added));
        assert_eq!(
            module.print(),
            "import adapter from '@sveltejs/adapter-auto';\n\nconst config = {\n  kit: {\n    adapter: adapter(),\n    experimental: {\n      tracing: {\n        server: true,\n      },\n      instrumentation: {\n        server: true,\n      },\n    },\n  },\n};\n\nexport default config;\n"
        );
    }

    #[test]
    fn test_true_leaf_is_noop() {
        let text = "export default { kit: { experimental: { tracing: { server: true } } } };\n";
        let mut module = js(text);
        let change = enable_nested_flag(&mut module, &FlagSpec::sveltekit_tracing()).unwrap();
        assert_eq!(change, FlagChange::AlreadyEnabled);
        assert_eq!(module.print(), text);
    }

    #[test]
    fn test_false_leaf_is_overwritten_with_comment() {
        let mut module = js("export default {\n  build: {\n    sourcemap: false,\n  },\n};\n");
        let change = enable_nested_flag(&mut module, &FlagSpec::vite_sourcemaps()).unwrap();
        assert_eq!(change, FlagChange::Overwritten);
        assert_eq!(
            module.print(),
            "export default {\n  build: {\n    // Enabled to upload source maps to Sentry\n    sourcemap: true,\n  },\n};\n"
        );
    }

    #[test]
    fn test_string_sourcemap_counts_as_enabled() {
        let mut module = js("export default { build: { sourcemap: 'hidden' } };\n");
        let change = enable_nested_flag(&mut module, &FlagSpec::vite_sourcemaps()).unwrap();
        assert_eq!(change, FlagChange::AlreadyEnabled);
        assert!(!module.is_modified());
    }

    #[test]
    fn test_unexpected_value_is_ambiguous() {
        let mut module = js("export default { kit: getKit() };\n");
        let err = enable_nested_flag(&mut module, &FlagSpec::sveltekit_tracing()).unwrap_err();
        assert!(matches!(err, CodemodError::AmbiguousShape { .. }));

        let mut module = js("export default { build: { sourcemap: process.env.MAPS } };\n");
        let err = enable_nested_flag(&mut module, &FlagSpec::vite_sourcemaps()).unwrap_err();
        assert!(matches!(err, CodemodError::AmbiguousShape { .. }));
    }

    #[test]
    fn test_path_depth_is_limited() {
        let mut module = js("export default {};\n");
        let err = enable_nested_flag(&mut module, &FlagSpec::new("a.b.c.d.e", "x")).unwrap_err();
        assert!(err.is_anchor_error());
    }
}
