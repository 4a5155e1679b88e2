//! Codemods: tree-sitter based source transformations that instrument a
//! project with the Sentry SDK.
//!
//! ## Architecture
//!
//! ```text
//! codemod/
//! ├── mod.rs          - Transform dispatch and the fail-closed runner
//! ├── source.rs       - Lossless parse / edit / print of one file
//! ├── detect.rs       - Existing SDK usage, module system
//! ├── locate.rs       - Anchor locators (imports, exports, config objects)
//! ├── builder.rs      - Node builders and the style-aware printer
//! ├── splice.rs       - List insertion, wrapping, import changesets
//! ├── fallback.rs     - Copy-paste diff snippets
//! ├── commit.rs       - Write-back
//! └── <role>.rs       - One file per instrumented file role
//! ```
//!
//! Every role follows the same flow: parse, skip if the SDK is already
//! referenced, locate anchors, splice, and either report the new text or
//! fail closed with a snippet the user can apply by hand.

pub mod builder;
pub mod bundler;
pub mod commit;
pub mod common;
pub mod detect;
pub mod entry;
pub mod fallback;
pub mod flags;
pub mod handle_error;
pub mod hooks;
pub mod locate;
pub mod manifest;
pub mod metro;
pub mod react_router_config;
pub mod root_route;
pub mod source;
pub mod splice;

use tracing::{debug, info, warn};

use crate::error::{CodemodError, Result};
use crate::options::CodemodContext;

pub use bundler::BundlerPlugin;
pub use entry::{EntryTarget, Runtime};
pub use fallback::Snippet;
pub use hooks::HooksTarget;
pub use manifest::{PackageManifest, SourcemapScripts};
pub use root_route::RootRouteTarget;
pub use source::{SourceLanguage, SourceModule};

// ============ Outcomes ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnchangedReason {
    /// The file already references an `@sentry/*` package
    AlreadyInstrumented,
    /// Every anchor was found already in the wanted state
    AlreadyConfigured,
}

/// What a single transform did to a single file
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    Modified(String),
    Unchanged(UnchangedReason),
    /// Nothing was edited; `fallback` shows the manual change
    Failed { reason: CodemodError, fallback: String },
}

impl TransformOutcome {
    pub fn is_modified(&self) -> bool {
        matches!(self, TransformOutcome::Modified(_))
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, TransformOutcome::Unchanged(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransformOutcome::Failed { .. })
    }

    /// New file text, for `Modified`
    pub fn text(&self) -> Option<&str> {
        match self {
            TransformOutcome::Modified(text) => Some(text),
            _ => None,
        }
    }

    pub fn fallback(&self) -> Option<&str> {
        match self {
            TransformOutcome::Failed { fallback, .. } => Some(fallback),
            _ => None,
        }
    }
}

// ============ Transforms ============

/// One file role and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// `Sentry.init` in a client or server entry
    Entry(EntryTarget),
    /// Error boundary plus `withSentry` on the root route
    RootRoute(RootRouteTarget),
    WrapDefaultExport { wrapper: String, from_module: String },
    /// Server `handleError` export
    HandleError { sdk_package: String },
    BundlerPlugin(BundlerPlugin),
    /// `kit.experimental.{tracing,instrumentation}.server` in `svelte.config.js`
    SvelteKitTracing,
    SvelteKitHooks(HooksTarget),
    MetroSerializer,
    ReactRouterConfig,
    SourcemapScripts(SourcemapScripts),
    /// Several roles applied to one file under a single guard
    Chain(Vec<Transform>),
}

const BROWSER_ENTRY: &str = "import { hydrateRoot } from \"react-dom/client\";\n\nhydrateRoot(document, app);\n";
const SERVER_ENTRY: &str = "import { createServer } from \"node:http\";\n\ncreateServer(handler).listen(3000);\n";
const REMIX_ROOT: &str = "import { Outlet } from \"@remix-run/react\";\n\nexport default function App() {\n  return <Outlet />;\n}\n";
const REACT_ROUTER_ROOT: &str = "import { Outlet } from \"react-router\";\n\nexport default function App() {\n  return <Outlet />;\n}\n";
const APP_COMPONENT: &str = "function App() {\n  return null;\n}\n\nexport default App;\n";
const SERVER_REQUEST_HANDLER: &str = "import { ServerRouter } from \"react-router\";\n\nexport default function handleRequest(request) {\n  return new Response(null);\n}\n";
const VITE_CONFIG: &str = "import { defineConfig } from \"vite\";\n\nexport default defineConfig({\n  plugins: [],\n});\n";
const SVELTE_CONFIG: &str = "const config = {\n  kit: {},\n};\n\nexport default config;\n";
const HOOKS_SERVER: &str = "export const handle = async ({ event, resolve }) => resolve(event);\n";
const HOOKS_CLIENT: &str = "import { dev } from \"$app/environment\";\n";
const METRO_CONFIG: &str = "module.exports = {\n  transformer: {},\n};\n";
const REACT_ROUTER_CONFIG: &str = "import type { Config } from \"@react-router/dev/config\";\n\nexport default {\n  ssr: true,\n} satisfies Config;\n";
const PACKAGE_JSON: &str = "{\n  \"scripts\": {\n    \"build\": \"vite build\"\n  }\n}\n";

impl Transform {
    /// Remix `entry.server`: init plus `handleError` in one pass
    pub fn remix_server_entry() -> Self {
        Transform::Chain(vec![
            Transform::Entry(EntryTarget::remix_server()),
            Transform::HandleError {
                sdk_package: "@sentry/remix".to_string(),
            },
        ])
    }

    pub fn wrap_default_export(wrapper: &str, from_module: &str) -> Self {
        Transform::WrapDefaultExport {
            wrapper: wrapper.to_string(),
            from_module: from_module.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Entry(_) => "entry",
            Transform::RootRoute(_) => "root-route",
            Transform::WrapDefaultExport { .. } => "wrap-default-export",
            Transform::HandleError { .. } => "handle-error",
            Transform::BundlerPlugin(_) => "bundler-plugin",
            Transform::SvelteKitTracing => "sveltekit-tracing",
            Transform::SvelteKitHooks(_) => "sveltekit-hooks",
            Transform::MetroSerializer => "metro-serializer",
            Transform::ReactRouterConfig => "react-router-config",
            Transform::SourcemapScripts(_) => "sourcemap-scripts",
            Transform::Chain(_) => "chain",
        }
    }

    /// Edit `module` in place. Errors may leave partial edits behind;
    /// [`apply_transform`] resets the module when that happens.
    pub fn apply(&self, module: &mut SourceModule, ctx: &CodemodContext) -> Result<()> {
        match self {
            Transform::Entry(target) => entry::instrument_entry(module, target, ctx),
            Transform::RootRoute(target) => root_route::instrument_root_route(module, target),
            Transform::WrapDefaultExport { wrapper, from_module } => {
                root_route::wrap_default_export(module, wrapper, from_module)
            }
            Transform::HandleError { sdk_package } => {
                handle_error::instrument_handle_error(module, sdk_package)
            }
            Transform::BundlerPlugin(plugin) => bundler::register_bundler_plugin(module, plugin, ctx),
            Transform::SvelteKitTracing => {
                let (server_tracing, instrumentation) = flags::enable_sveltekit_tracing(module)?;
                debug!(?server_tracing, ?instrumentation, "sveltekit experimental flags");
                Ok(())
            }
            Transform::SvelteKitHooks(target) => hooks::instrument_sveltekit_hooks(module, *target, ctx),
            Transform::MetroSerializer => metro::instrument_metro_config(module),
            Transform::ReactRouterConfig => {
                let change = react_router_config::instrument_react_router_config(module)?;
                if change.ssr_was_changed {
                    info!(path = %module.display_path(), "turned on server-side rendering");
                }
                Ok(())
            }
            Transform::SourcemapScripts(scripts) => manifest::add_sourcemap_scripts(module, scripts, ctx),
            Transform::Chain(steps) => steps.iter().try_for_each(|step| step.apply(module, ctx)),
        }
    }

    /// The smallest file of this role the transform succeeds on
    pub fn canonical_template(&self) -> (&'static str, SourceLanguage) {
        match self {
            Transform::Entry(target) => match target.runtime {
                Runtime::Browser => (BROWSER_ENTRY, SourceLanguage::JavaScript),
                Runtime::Server => (SERVER_ENTRY, SourceLanguage::JavaScript),
            },
            Transform::RootRoute(target) => match target.flavor {
                root_route::BoundaryFlavor::Remix => (REMIX_ROOT, SourceLanguage::TypeScriptTsx),
                root_route::BoundaryFlavor::ReactRouter => (REACT_ROUTER_ROOT, SourceLanguage::TypeScriptTsx),
            },
            Transform::WrapDefaultExport { .. } => (APP_COMPONENT, SourceLanguage::JavaScriptJsx),
            Transform::HandleError { .. } => (SERVER_REQUEST_HANDLER, SourceLanguage::JavaScript),
            Transform::BundlerPlugin(_) => (VITE_CONFIG, SourceLanguage::TypeScript),
            Transform::SvelteKitTracing => (SVELTE_CONFIG, SourceLanguage::JavaScript),
            Transform::SvelteKitHooks(target) => match target.side {
                hooks::HooksSide::Client => (HOOKS_CLIENT, SourceLanguage::JavaScript),
                hooks::HooksSide::Server => (HOOKS_SERVER, SourceLanguage::JavaScript),
            },
            Transform::MetroSerializer => (METRO_CONFIG, SourceLanguage::JavaScript),
            Transform::ReactRouterConfig => (REACT_ROUTER_CONFIG, SourceLanguage::TypeScript),
            Transform::SourcemapScripts(_) => (PACKAGE_JSON, SourceLanguage::Json),
            Transform::Chain(steps) => steps
                .first()
                .map(Transform::canonical_template)
                .unwrap_or((SERVER_ENTRY, SourceLanguage::JavaScript)),
        }
    }

    /// Rendered diff of the canonical template before and after this transform.
    /// Without a diff to show, the whole template is offered as code to add.
    pub fn fallback_snippet(&self, ctx: &CodemodContext) -> String {
        let (template, language) = self.canonical_template();
        let diff = SourceModule::parse(template, language)
            .and_then(|mut module| {
                self.apply(&mut module, ctx)?;
                Ok(Snippet::from_diff(template, module.text()))
            })
            .unwrap_or_else(|err| {
                debug!(transform = self.name(), %err, "canonical template did not transform");
                Snippet::default()
            });
        let snippet = if diff.has_changes() {
            diff
        } else {
            debug!(transform = self.name(), "no template diff, showing the template");
            Snippet::added(template)
        };
        snippet.render(ctx.render)
    }
}

// ============ Runner ============

/// Run one transform on a parsed module, never returning an error.
///
/// On failure the module is reset to its original text.
pub fn apply_transform(
    transform: &Transform,
    module: &mut SourceModule,
    ctx: &CodemodContext,
) -> TransformOutcome {
    if detect::has_sentry_content(module) {
        debug!(path = %module.display_path(), transform = transform.name(), "already instrumented");
        return TransformOutcome::Unchanged(UnchangedReason::AlreadyInstrumented);
    }

    match transform.apply(module, ctx) {
        Ok(()) if module.is_modified() => {
            info!(path = %module.display_path(), transform = transform.name(), "instrumented");
            TransformOutcome::Modified(module.print())
        }
        Ok(()) => {
            debug!(path = %module.display_path(), transform = transform.name(), "already configured");
            TransformOutcome::Unchanged(UnchangedReason::AlreadyConfigured)
        }
        Err(reason) => {
            module.reset();
            warn!(
                path = %module.display_path(),
                transform = transform.name(),
                %reason,
                "could not instrument automatically, falling back to manual instructions"
            );
            TransformOutcome::Failed {
                reason,
                fallback: transform.fallback_snippet(ctx),
            }
        }
    }
}

/// Parse `text` and run one transform on it
pub fn transform_source(
    transform: &Transform,
    text: &str,
    language: SourceLanguage,
    ctx: &CodemodContext,
) -> TransformOutcome {
    match SourceModule::parse(text, language) {
        Ok(mut module) => apply_transform(transform, &mut module, ctx),
        Err(reason) => fail_before_parse(transform, reason, ctx),
    }
}

/// `Failed` for a file that could not be read or parsed
pub(crate) fn fail_before_parse(
    transform: &Transform,
    reason: CodemodError,
    ctx: &CodemodContext,
) -> TransformOutcome {
    warn!(transform = transform.name(), %reason, "could not load file");
    TransformOutcome::Failed {
        reason,
        fallback: transform.fallback_snippet(ctx),
    }
}
