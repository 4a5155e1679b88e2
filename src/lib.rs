//! Source transformations that wire the Sentry SDK into JavaScript and
//! TypeScript projects.
//!
//! The wizard decides *which* files to touch; this crate parses each one with
//! tree-sitter, edits it without disturbing surrounding formatting, and
//! either writes it back or returns copy-paste instructions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

pub mod codemod;
pub mod error;
pub mod options;
pub mod project;


pub use codemod::{
    apply_transform, transform_source, Transform, TransformOutcome, UnchangedReason,
};
pub use error::{CodemodError, Result};
pub use options::{CodemodContext, FeatureSelection, ProjectInfo, RenderStyle};

use codemod::commit::commit;
use codemod::SourceModule;

/// Read, transform and write back one file
pub fn transform_file(path: &Path, transform: &Transform, ctx: &CodemodContext) -> TransformOutcome {
    let mut module = match SourceModule::from_path(path) {
        Ok(module) => module,
        Err(reason) => return codemod::fail_before_parse(transform, reason, ctx),
    };

    let outcome = apply_transform(transform, &mut module, ctx);
    if outcome.is_modified() {
        if let Err(reason) = commit(&module) {
            return codemod::fail_before_parse(transform, reason, ctx);
        }
    }
    outcome
}

/// One file and the transform to run on it
#[derive(Debug, Clone)]
pub struct TransformJob {
    pub path: PathBuf,
    pub transform: Transform,
}

impl TransformJob {
    pub fn new(path: impl Into<PathBuf>, transform: Transform) -> Self {
        Self {
            path: path.into(),
            transform,
        }
    }
}

/// Run many jobs. Distinct files are processed in parallel; jobs for the same
/// file run one after another in the given order. Results keep input order.
pub fn transform_files(jobs: &[TransformJob], ctx: &CodemodContext) -> Vec<(PathBuf, TransformOutcome)> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_path: HashMap<&Path, usize> = HashMap::new();
    for (index, job) in jobs.iter().enumerate() {
        let group = *by_path.entry(job.path.as_path()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(index);
    }
    debug!(jobs = jobs.len(), files = groups.len(), "running transforms");

    let mut results: Vec<(usize, TransformOutcome)> = groups
        .par_iter()
        .flat_map_iter(|group| {
            group
                .iter()
                .map(|&index| {
                    let job = &jobs[index];
                    (index, transform_file(&job.path, &job.transform, ctx))
                })
                .collect::<Vec<_>>()
        })
        .collect();
    results.sort_by_key(|(index, _)| *index);

    results
        .into_iter()
        .map(|(index, outcome)| (jobs[index].path.clone(), outcome))
        .collect()
}
