//! `package.json`: source-map upload scripts (edited through the JSON tree so
//! formatting survives) and read-only dependency inspection.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::codemod::builder::{Expr, Printer, Property};
use crate::codemod::common::{js_string_literal, named_children};
use crate::codemod::detect::{is_in_scope, SENTRY_SCOPE};
use crate::codemod::locate::{find_property, PropertyMatch};
use crate::codemod::source::{Edit, SourceModule};
use crate::codemod::splice::{insert_property, Changeset};
use crate::error::{CodemodError, Result};
use crate::options::CodemodContext;

pub const SOURCEMAPS_SCRIPT: &str = "sentry:sourcemaps";

/// How the upload script is run and what it uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcemapScripts {
    pub package_manager: String,
    pub assets_dir: String,
}

impl Default for SourcemapScripts {
    fn default() -> Self {
        Self {
            package_manager: "npm".to_string(),
            assets_dir: "./build".to_string(),
        }
    }
}

impl SourcemapScripts {
    pub fn new(package_manager: &str, assets_dir: &str) -> Self {
        Self {
            package_manager: package_manager.to_string(),
            assets_dir: assets_dir.to_string(),
        }
    }

    /// `sentry-cli sourcemaps inject ... && sentry-cli sourcemaps upload ...`
    pub fn command(&self, ctx: &CodemodContext) -> String {
        let cli = match ctx.project.upload_url() {
            Some(url) => format!("sentry-cli --url {}", url),
            None => "sentry-cli".to_string(),
        };
        let target = format!(
            "--org {} --project {} {}",
            ctx.project.org_slug, ctx.project.project_slug, self.assets_dir
        );
        format!(
            "{cli} sourcemaps inject {target} && {cli} sourcemaps upload {target}",
            cli = cli,
            target = target
        )
    }

    fn chain(&self) -> String {
        format!(" && {} run {}", self.package_manager, SOURCEMAPS_SCRIPT)
    }
}

/// Add the `sentry:sourcemaps` script and chain it onto `build`
pub fn add_sourcemap_scripts(
    module: &mut SourceModule,
    scripts: &SourcemapScripts,
    ctx: &CodemodContext,
) -> Result<()> {
    let printer = Printer::for_module(module);
    let source = module.source();
    let root = named_children(module.root())
        .into_iter()
        .find(|node| node.kind() == "object")
        .ok_or_else(|| CodemodError::not_found("package.json object"))?;
    let mut changes = Changeset::new();
    let upload = Property::new(SOURCEMAPS_SCRIPT, Expr::string(&scripts.command(ctx)));

    match find_property(root, "scripts", source) {
        None => {
            let property = Property::new("scripts", Expr::object(vec![upload]));
            changes.extend(insert_property(module, &printer, root, &property));
        }
        Some(PropertyMatch::Pair { value, .. }) if value.kind() == "object" => {
            if find_property(value, SOURCEMAPS_SCRIPT, source).is_none() {
                changes.extend(insert_property(module, &printer, value, &upload));
            }
            match find_property(value, "build", source) {
                Some(PropertyMatch::Pair { value: build, .. }) if build.kind() == "string" => {
                    let current = js_string_literal(build, source).unwrap_or_default();
                    if !current.contains(SOURCEMAPS_SCRIPT) {
                        // Before the closing quote, keeping the original escapes
                        changes.push(Edit::insert(build.end_byte() - 1, scripts.chain()));
                    }
                }
                Some(_) => {
                    return Err(CodemodError::ambiguous("scripts.build", "expected a string"))
                }
                None => debug!(path = %module.display_path(), "no build script to chain onto"),
            }
        }
        Some(_) => return Err(CodemodError::ambiguous("scripts", "expected an object")),
    }

    changes.apply_to(module)
}

// ============ Manifest Inspection ============

/// The parts of `package.json` the wizard reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CodemodError::Parse {
            path: "package.json".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| CodemodError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Declared version range, from `dependencies` first, then `devDependencies`
    pub fn dependency_version(&self, package: &str) -> Option<&str> {
        self.dependencies
            .get(package)
            .or_else(|| self.dev_dependencies.get(package))
            .map(String::as_str)
    }

    pub fn has_dependency(&self, package: &str) -> bool {
        self.dependency_version(package).is_some()
    }

    /// Whether any `@sentry/*` package is declared
    pub fn has_sentry_sdk(&self) -> bool {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .any(|name| is_in_scope(name, SENTRY_SCOPE))
    }
}
