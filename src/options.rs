//! Inputs handed to every transform: selected features, project metadata and
//! how fallback snippets should be rendered.

use serde::{Deserialize, Serialize};

use crate::error::{CodemodError, Result};

/// Optional SDK capabilities the user picked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSelection {
    pub performance: bool,
    pub replay: bool,
    pub logs: bool,
    #[serde(default)]
    pub profiling: Option<bool>,
}

impl FeatureSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            performance: true,
            replay: true,
            logs: true,
            profiling: Some(true),
        }
    }

    pub fn profiling(&self) -> bool {
        self.profiling.unwrap_or(false)
    }
}

/// Project metadata that ends up as literals in generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub dsn: String,
    pub org_slug: String,
    pub project_slug: String,
    #[serde(default)]
    pub self_hosted: bool,
    #[serde(default = "default_url")]
    pub url: String,
}

fn default_url() -> String {
    "https://sentry.io/".to_string()
}

impl ProjectInfo {
    pub fn new(dsn: &str, org_slug: &str, project_slug: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            org_slug: org_slug.to_string(),
            project_slug: project_slug.to_string(),
            self_hosted: false,
            url: default_url(),
        }
    }

    /// The URL to pass to upload tooling, only for self-hosted instances
    pub fn upload_url(&self) -> Option<&str> {
        if self.self_hosted {
            Some(self.url.as_str())
        } else {
            None
        }
    }
}

/// How fallback snippets are rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderStyle {
    #[serde(default)]
    pub color: bool,
}

/// Everything a transform reads besides the file itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodemodContext {
    pub features: FeatureSelection,
    pub project: ProjectInfo,
    #[serde(default)]
    pub render: RenderStyle,
}

impl CodemodContext {
    pub fn new(features: FeatureSelection, project: ProjectInfo) -> Self {
        Self {
            features,
            project,
            render: RenderStyle::default(),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.render.color = color;
        self
    }

    /// Parse the wizard's JSON hand-off
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CodemodError::InvalidConfig(e.to_string()))
    }
}
