//! Watch fan-out: one watch pipeline per watchable distinct group.

use std::sync::Arc;

use tracing::debug;

use recipeloader_shared::{DistinctGroup, SourceMeta};

use crate::factory::finalize;
use crate::pipeline::{LazyPipeline, PipeStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub base: String,
    pub read: bool,
}

/// External file watcher. The returned stream is expected to be endless,
/// emitting an item per filesystem change.
pub trait WatchStep<T>: Send + Sync {
    fn watch(&self, globs: &[String], options: &WatchOptions) -> PipeStream<T>;
}

impl<T, F> WatchStep<T> for F
where
    F: Fn(&[String], &WatchOptions) -> PipeStream<T> + Send + Sync,
{
    fn watch(&self, globs: &[String], options: &WatchOptions) -> PipeStream<T> {
        self(globs, options)
    }
}

/// Merge of one watcher pipeline per distinct group of `sources`.
///
/// Groups declared with `watch = false` are skipped, as are groups several
/// sources share.
pub fn watch_sources<T: Send + 'static>(
    sources: &[LazyPipeline<T>],
    watcher: Arc<dyn WatchStep<T>>,
) -> LazyPipeline<T> {
    let mut groups: Vec<&DistinctGroup> = Vec::new();
    for group in sources.iter().flat_map(|s| s.distinct()) {
        if group.watch && !groups.contains(&group) {
            groups.push(group);
        }
    }
    debug!(sources = sources.len(), watched = groups.len(), "watching sources");

    let pipelines = groups
        .into_iter()
        .map(|group| {
            let watcher = Arc::clone(&watcher);
            let globs = group.globs.clone();
            let options = WatchOptions {
                base: group.base.clone(),
                read: group.read,
            };
            LazyPipeline::origin(SourceMeta::from_distinct(group), move || {
                watcher.watch(&globs, &options)
            })
        })
        .collect();
    finalize(pipelines)
}
