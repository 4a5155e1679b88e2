//! Bundler plugin registration in build-tool configs.

use tracing::debug;

use crate::codemod::builder::{Expr, ImportSpec, Param, Printer, Property};
use crate::codemod::common::{
    contains_call, get_node_text, line_indent, named_children, unwrap_expression,
};
use crate::codemod::flags::{enable_nested_flag, FlagSpec};
use crate::codemod::locate::{default_config_object, find_property, FunctionShape, PropertyMatch};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::{append_element, insert_property, Changeset};
use crate::error::{CodemodError, Result};
use crate::options::CodemodContext;

const CONFIG_PARAM: &str = "config";

/// Which plugin to register and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlerPlugin {
    pub import: ImportSpec,
    pub callee: String,
    /// Pass the config function's argument as a second plugin argument
    pub thread_config: bool,
    /// Put the plugin first in `plugins`
    pub prepend: bool,
    /// Also switch on `build.sourcemap`
    pub enable_sourcemaps: bool,
}

impl BundlerPlugin {
    fn new(package: &str, callee: &str) -> Self {
        Self {
            import: ImportSpec::named(package, callee),
            callee: callee.to_string(),
            thread_config: false,
            prepend: false,
            enable_sourcemaps: false,
        }
    }

    pub fn vite() -> Self {
        Self {
            enable_sourcemaps: true,
            ..Self::new("@sentry/vite-plugin", "sentryVitePlugin")
        }
    }

    pub fn react_router() -> Self {
        Self {
            thread_config: true,
            ..Self::new("@sentry/react-router", "sentryReactRouter")
        }
    }

    pub fn sveltekit() -> Self {
        Self {
            prepend: true,
            ..Self::new("@sentry/sveltekit", "sentrySvelteKit")
        }
    }

    fn call(&self, ctx: &CodemodContext, config_arg: Option<&str>) -> Expr {
        let mut options = vec![
            Property::new("org", Expr::string(&ctx.project.org_slug)),
            Property::new("project", Expr::string(&ctx.project.project_slug)),
        ];
        if let Some(url) = ctx.project.upload_url() {
            options.push(Property::new("url", Expr::string(url)));
        }
        options.push(
            Property::new("authToken", Expr::path("process.env.SENTRY_AUTH_TOKEN"))
                .with_comment("Keep the auth token out of version control"),
        );

        let mut args = vec![Expr::object(options)];
        if let Some(arg) = config_arg {
            args.push(Expr::ident(arg));
        }
        Expr::call_path(&self.callee, args)
    }
}

/// Register the plugin in the default-exported config's `plugins` array
pub fn register_bundler_plugin(
    module: &mut SourceModule,
    plugin: &BundlerPlugin,
    ctx: &CodemodContext,
) -> Result<()> {
    let config_arg = if plugin.thread_config {
        Some(ensure_config_function(module)?)
    } else {
        None
    };

    let printer = Printer::for_module(module);
    let source = module.source();
    let config = default_config_object(module)?;
    let call = plugin.call(ctx, config_arg.as_deref());
    let mut changes = Changeset::new();

    match find_property(config.object, "plugins", source) {
        None => {
            changes.extend(insert_property(
                module,
                &printer,
                config.object,
                &Property::new("plugins", Expr::array(vec![call])),
            ));
        }
        Some(PropertyMatch::Pair { value, .. }) => {
            let array = unwrap_expression(value);
            if array.kind() != "array" {
                return Err(CodemodError::ambiguous(
                    "plugins",
                    format!("expected an array literal, found `{}`", get_node_text(array, source)),
                ));
            }
            if contains_call(array, source, &[plugin.callee.as_str()]) {
                debug!(path = %module.display_path(), plugin = %plugin.callee, "plugin already registered");
                return Ok(());
            }
            match named_children(array).first() {
                Some(first) if plugin.prepend => {
                    let text = printer.expr(&call, line_indent(module.text(), first.start_byte()));
                    changes.push(Edit::insert(first.start_byte(), format!("{}, ", text)));
                }
                _ => changes.extend(append_element(module, &printer, array, &call)),
            }
        }
        Some(_) => return Err(CodemodError::ambiguous("plugins", "not a plain property")),
    }

    changes.add_import(plugin.import.clone());
    changes.apply_to(module)?;
    debug!(path = %module.display_path(), plugin = %plugin.callee, "registered bundler plugin");

    if plugin.enable_sourcemaps {
        enable_nested_flag(module, &FlagSpec::vite_sourcemaps())?;
    }
    Ok(())
}

/// Make the exported config a function and return its argument's name.
///
/// A bare object becomes `(config) => ({ ... })`; a function without
/// parameters gains one.
fn ensure_config_function(module: &mut SourceModule) -> Result<String> {
    let printer = Printer::for_module(module);
    let config = default_config_object(module)?;

    let Some(function) = config.function.and_then(FunctionShape::of) else {
        let object_text = module.node_text(config.object).to_string();
        let arrow = format!(
            "{} => ({})",
            printer.params(&[Param::ident(CONFIG_PARAM)]),
            object_text
        );
        let edit = Edit::replace(config.object, arrow);
        module.apply(vec![edit])?;
        return Ok(CONFIG_PARAM.to_string());
    };

    match function.params().first() {
        Some(param) if param.kind() == "identifier" => {
            Ok(get_node_text(*param, module.source()).to_string())
        }
        Some(param) => Err(CodemodError::ambiguous(
            "config function",
            format!("destructured parameter `{}`", get_node_text(*param, module.source())),
        )),
        None => {
            let parameters = function
                .parameters
                .ok_or_else(|| CodemodError::ambiguous("config function", "unexpected parameters"))?;
            let edit = Edit::replace(parameters, format!("({})", CONFIG_PARAM));
            module.apply(vec![edit])?;
            Ok(CONFIG_PARAM.to_string())
        }
    }
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
    fn test_vite_plugin_appended_and_sourcemaps_enabled() {
        let mut module = ts(
            "import { defineConfig } from \"vite\";\nimport react from \"@vitejs/plugin-react\";\n\nexport default defineConfig({\n  plugins: [react()],\n});\n",
        );
        register_bundler_plugin(&mut module, &BundlerPlugin::vite(), &ctx()).unwrap();
        assert_eq!(
            module.print(),
            r#"import { defineConfig } from "vite";
import react from "@vitejs/plugin-react";
import { sentryVitePlugin } from "@sentry/vite-plugin";

export default defineConfig({
  plugins: [react(), sentryVitePlugin({
    org: "acme",
    project: "web",
    // Keep the auth token out of version control
    authToken: process.env.SENTRY_AUTH_TOKEN,
  })],
  build: {
    sourcemap: true,
  },
});
"#
        );
    }

    #[test]
    fn test_missing_plugins_array_is_created() {
        let mut module = ts("export default {};\n");
        let plugin = BundlerPlugin {
            enable_sourcemaps: false,
            ..BundlerPlugin::vite()
        };
        register_bundler_plugin(&mut module, &plugin, &ctx()).unwrap();
        let text = module.print();
        assert!(text.contains("  plugins: [\n    sentryVitePlugin({\n      org: \"acme\","));
    }

    #[test]
    fn test_react_router_converts_object_to_function() {
        let mut module = ts(
            "import { reactRouter } from \"@react-router/dev/vite\";\nimport { defineConfig } from \"vite\";\n\nexport default defineConfig({\n  plugins: [reactRouter()],\n});\n",
        );
        register_bundler_plugin(&mut module, &BundlerPlugin::react_router(), &ctx()).unwrap();
        let text = module.print();
        assert!(text.contains("export default defineConfig((config) => ({\n  plugins: [reactRouter(), sentryReactRouter({"));
        assert!(text.contains("  }, config)],\n}));\n"));
        assert!(text.contains("import { sentryReactRouter } from \"@sentry/react-router\";"));
    }

    #[test]
    fn test_react_router_reuses_function_parameter() {
        let mut module = ts("export default defineConfig((env) => ({ plugins: [] }));\n");
        register_bundler_plugin(&mut module, &BundlerPlugin::react_router(), &ctx()).unwrap();
        assert!(module.print().contains("  }, env),\n]"));
    }

    #[test]
    fn test_sveltekit_plugin_goes_first() {
        let mut module = ts("export default defineConfig({\n  plugins: [sveltekit()],\n});\n");
        register_bundler_plugin(&mut module, &BundlerPlugin::sveltekit(), &ctx()).unwrap();
        assert!(module.print().contains("plugins: [sentrySvelteKit({"));
        assert!(module.print().contains("}), sveltekit()],"));
    }

    #[test]
    fn test_self_hosted_url_is_passed() {
        let mut context = ctx();
        context.project.self_hosted = true;
        context.project.url = "https://sentry.acme.dev/".to_string();
        let text = Printer::default().expr_inline(&BundlerPlugin::vite().call(&context, None));
        assert!(text.contains("url: \"https://sentry.acme.dev/\""));
    }

    #[test]
    fn test_non_array_plugins_is_ambiguous() {
        let mut module = ts("export default { plugins: getPlugins() };\n");
        let err = register_bundler_plugin(&mut module, &BundlerPlugin::vite(), &ctx()).unwrap_err();
        assert!(matches!(err, CodemodError::AmbiguousShape { .. }));
    }
}
