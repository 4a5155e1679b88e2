//! Client/server entry instrumentation: `Sentry.init({...})` after the imports.

use tracing::debug;

use crate::codemod::builder::{Expr, ImportSpec, Property, Stmt};
use crate::codemod::source::SourceModule;
use crate::codemod::splice::Changeset;
use crate::error::Result;
use crate::options::CodemodContext;

const PROFILING_PACKAGE: &str = "@sentry/profiling-node";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Browser,
    Server,
}

/// Whether an empty `integrations: []` is still written out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationsStyle {
    Always,
    OmitWhenEmpty,
}

/// Which SDK an entry file initializes and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTarget {
    pub sdk_package: String,
    pub runtime: Runtime,
    pub integrations: IntegrationsStyle,
    /// Tracing integration factory on the SDK namespace
    pub tracing_integration: String,
}

impl EntryTarget {
    pub fn new(sdk_package: &str, runtime: Runtime) -> Self {
        Self {
            sdk_package: sdk_package.to_string(),
            runtime,
            integrations: IntegrationsStyle::Always,
            tracing_integration: "browserTracingIntegration".to_string(),
        }
    }

    pub fn remix_client() -> Self {
        Self::new("@sentry/remix", Runtime::Browser)
    }

    pub fn remix_server() -> Self {
        Self::new("@sentry/remix", Runtime::Server)
    }

    pub fn react_router_client() -> Self {
        Self {
            tracing_integration: "reactRouterTracingIntegration".to_string(),
            ..Self::new("@sentry/react-router", Runtime::Browser)
        }
    }

    pub fn react_router_server() -> Self {
        Self::new("@sentry/react-router", Runtime::Server)
    }

    pub fn sveltekit_client() -> Self {
        Self::new("@sentry/sveltekit", Runtime::Browser)
    }

    pub fn sveltekit_server() -> Self {
        Self::new("@sentry/sveltekit", Runtime::Server)
    }

    pub fn nextjs_client() -> Self {
        Self::new("@sentry/nextjs", Runtime::Browser)
    }

    pub fn nextjs_server() -> Self {
        Self {
            integrations: IntegrationsStyle::OmitWhenEmpty,
            ..Self::new("@sentry/nextjs", Runtime::Server)
        }
    }

    pub fn node() -> Self {
        Self::new("@sentry/node", Runtime::Server)
    }

    fn profiling(&self, ctx: &CodemodContext) -> bool {
        self.runtime == Runtime::Server && ctx.features.profiling()
    }
}

/// The `Sentry.init({...})` call for the selected features
pub fn build_init_call(target: &EntryTarget, ctx: &CodemodContext) -> Expr {
    let features = &ctx.features;
    let mut props = vec![
        Property::new("dsn", Expr::string(&ctx.project.dsn)),
        Property::new("sendDefaultPii", Expr::Bool(true))
            .with_comment("Adds request headers and IP for users"),
    ];

    let mut integrations = Vec::new();
    match target.runtime {
        Runtime::Browser => {
            if features.performance {
                integrations.push(Expr::call_path(
                    &format!("Sentry.{}", target.tracing_integration),
                    vec![],
                ));
            }
            if features.replay {
                integrations.push(Expr::call_path("Sentry.replayIntegration", vec![]));
            }
        }
        Runtime::Server => {
            if target.profiling(ctx) {
                integrations.push(Expr::call_path("nodeProfilingIntegration", vec![]));
            }
        }
    }
    if !integrations.is_empty() || target.integrations == IntegrationsStyle::Always {
        props.push(Property::new("integrations", Expr::array(integrations)));
    }

    if features.logs {
        props.push(
            Property::new("enableLogs", Expr::Bool(true))
                .with_comment("Send logs to Sentry"),
        );
    }
    if features.performance {
        props.push(
            Property::new("tracesSampleRate", Expr::number(1.0))
                .with_comment("Capture 100% of the transactions, reduce in production"),
        );
    }
    if target.profiling(ctx) {
        props.push(Property::new("profilesSampleRate", Expr::number(1.0)));
    }
    if features.replay && target.runtime == Runtime::Browser {
        props.push(
            Property::new("replaysSessionSampleRate", Expr::number(0.1))
                .with_comment("Record 10% of sessions and every session with an error"),
        );
        props.push(Property::new("replaysOnErrorSampleRate", Expr::number(1.0)));
    }

    Expr::call_path("Sentry.init", vec![Expr::object(props)])
}

/// Import the SDK and call `Sentry.init` right after the last import
pub fn instrument_entry(
    module: &mut SourceModule,
    target: &EntryTarget,
    ctx: &CodemodContext,
) -> Result<()> {
    let mut changes = Changeset::new();
    changes.add_import(ImportSpec::sentry(&target.sdk_package));
    if target.profiling(ctx) {
        changes.add_import(ImportSpec::named(PROFILING_PACKAGE, "nodeProfilingIntegration"));
    }
    changes.insert_after_imports(Stmt::expr(build_init_call(target, ctx)));

    debug!(path = %module.display_path(), sdk = %target.sdk_package, "adding Sentry.init");
    changes.apply_to(module)
}
