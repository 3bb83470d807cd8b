//! Pipeline factory: turns groups into source pipelines.
//!
//! The factory never reads files. It hands each group's patterns to an
//! externally supplied [`SourceStep`] when the pipeline is invoked.

use std::sync::Arc;

use tracing::{debug, instrument};

use recipeloader_shared::{Group, Result, SourceMeta, SourceSpec};

use crate::compose::merge_pipelines;
use crate::normalize::normalize;
use crate::partition::partition;
use crate::pipeline::{LazyPipeline, PipeStream};

/// Options handed to a [`SourceStep`] alongside a group's patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub base: String,
    pub read: bool,
}

/// External constructor of the stream behind one group, e.g. a
/// filesystem glob reader.
pub trait SourceStep<T>: Send + Sync {
    fn open(&self, patterns: &[String], options: &SourceOptions) -> PipeStream<T>;
}

impl<T, F> SourceStep<T> for F
where
    F: Fn(&[String], &SourceOptions) -> PipeStream<T> + Send + Sync,
{
    fn open(&self, patterns: &[String], options: &SourceOptions) -> PipeStream<T> {
        self(patterns, options)
    }
}

/// Build one source pipeline per group.
pub fn build_pipelines<T: Send + 'static>(
    groups: &[Group],
    step: &Arc<dyn SourceStep<T>>,
) -> Vec<LazyPipeline<T>> {
    groups
        .iter()
        .map(|group| {
            let step = Arc::clone(step);
            let patterns = group.patterns.clone();
            let options = SourceOptions {
                base: group.base.clone(),
                read: group.read,
            };
            LazyPipeline::origin(SourceMeta::from_group(group), move || {
                step.open(&patterns, &options)
            })
        })
        .collect()
}

/// Collapse built pipelines into one: the single pipeline as is, the empty
/// pipeline for none, or their merge.
pub fn finalize<T: Send + 'static>(mut pipelines: Vec<LazyPipeline<T>>) -> LazyPipeline<T> {
    match pipelines.len() {
        0 => LazyPipeline::empty(),
        1 => pipelines.remove(0),
        _ => merge_pipelines(pipelines),
    }
}

/// Normalize, partition and build `spec` into one source pipeline.
///
/// Any [`RecipeError::InvalidSpec`](recipeloader_shared::RecipeError::InvalidSpec)
/// surfaces here, before a pipeline is constructed.
#[instrument(skip_all, fields(default_base = %default_base))]
pub fn make_source<T: Send + 'static>(
    spec: &SourceSpec,
    step: Arc<dyn SourceStep<T>>,
    default_base: &str,
) -> Result<LazyPipeline<T>> {
    let entries = normalize(spec)?;
    let groups = partition(&entries, default_base);
    debug!(
        entries = entries.len(),
        groups = groups.len(),
        "building source pipeline"
    );
    Ok(finalize(build_pipelines(&groups, &step)))
}
