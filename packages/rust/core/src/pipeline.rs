//! Lazy pipelines: repeatable deferred stream constructors with frozen metadata.
//!
//! A [`LazyPipeline`] is a stage: given an upstream stream it builds a fresh
//! output stream each time it runs. Origins (sources, merges, queues) emit
//! any upstream items first and then their own.

use std::fmt;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use recipeloader_shared::{DistinctGroup, Result, SourceMeta};

/// The stream every pipeline stage consumes and produces.
pub type PipeStream<T> = BoxStream<'static, Result<T>>;

type Body<T> = Arc<dyn Fn(PipeStream<T>) -> PipeStream<T> + Send + Sync>;

/// A deferred, repeatable data-producing stage plus immutable metadata.
pub struct LazyPipeline<T> {
    body: Body<T>,
    meta: Arc<SourceMeta>,
}

impl<T> Clone for LazyPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
            meta: Arc::clone(&self.meta),
        }
    }
}

impl<T> fmt::Debug for LazyPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyPipeline")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> LazyPipeline<T> {
    /// Wrap a transform stage.
    pub fn from_step<F>(meta: SourceMeta, step: F) -> Self
    where
        F: Fn(PipeStream<T>) -> PipeStream<T> + Send + Sync + 'static,
    {
        Self {
            body: Arc::new(step),
            meta: Arc::new(meta),
        }
    }

    /// Wrap an origin: `produce` runs on every invocation and its items
    /// follow whatever arrives from upstream.
    pub fn origin<F>(meta: SourceMeta, produce: F) -> Self
    where
        F: Fn() -> PipeStream<T> + Send + Sync + 'static,
    {
        Self::from_step(meta, move |input: PipeStream<T>| {
            input.chain(produce()).boxed()
        })
    }

    /// A pipeline whose invocation ends immediately with zero items.
    pub fn empty() -> Self {
        Self::origin(SourceMeta::default(), || stream::empty().boxed())
    }

    /// A stage that passes its input through unchanged.
    pub fn identity() -> Self {
        Self::from_step(SourceMeta::default(), |input| input)
    }

    /// Run the pipeline with no upstream input.
    pub fn invoke(&self) -> PipeStream<T> {
        (self.body)(stream::empty().boxed())
    }

    /// Run the pipeline on `input`.
    pub fn run(&self, input: PipeStream<T>) -> PipeStream<T> {
        (self.body)(input)
    }

    /// Append `next` as a streaming stage. The result carries the union of
    /// both pipelines' metadata.
    pub fn pipe(&self, next: &LazyPipeline<T>) -> LazyPipeline<T> {
        let first = self.clone();
        let second = next.clone();
        let meta = SourceMeta::union([self.meta(), next.meta()]);
        Self::from_step(meta, move |input| second.run(first.run(input)))
    }

    /// Append a transform closure as a streaming stage, keeping this
    /// pipeline's metadata.
    pub fn pipe_step<F>(&self, step: F) -> LazyPipeline<T>
    where
        F: Fn(PipeStream<T>) -> PipeStream<T> + Send + Sync + 'static,
    {
        let first = self.clone();
        Self::from_step(self.meta().clone(), move |input| step(first.run(input)))
    }
}

impl<T> LazyPipeline<T> {
    pub fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    pub fn globs(&self) -> &[String] {
        &self.meta.globs
    }

    pub fn bases(&self) -> &[String] {
        &self.meta.bases
    }

    pub fn watch(&self) -> bool {
        self.meta.watch
    }

    pub fn distinct(&self) -> &[DistinctGroup] {
        &self.meta.distinct
    }
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

/// End the stream right after the first error item.
pub(crate) fn fuse_on_error<T: Send + 'static>(input: PipeStream<T>) -> PipeStream<T> {
    input
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}

/// Collect `upstream` completely, then build the downstream from its items.
/// An upstream error is forwarded instead and `then` never runs.
pub(crate) fn after_drain<T, F>(upstream: PipeStream<T>, then: F) -> PipeStream<T>
where
    T: Send + 'static,
    F: FnOnce(Vec<T>) -> PipeStream<T> + Send + 'static,
{
    stream::once(async move {
        match drain(upstream).await {
            Ok(items) => then(items),
            Err(e) => stream::iter([Err(e)]).boxed(),
        }
    })
    .flatten()
    .boxed()
}

async fn drain<T>(mut upstream: PipeStream<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while let Some(item) = upstream.next().await {
        items.push(item?);
    }
    Ok(items)
}

/// Feed already-collected items back into a stage.
pub(crate) fn replay<T: Send + 'static>(items: Vec<T>) -> PipeStream<T> {
    stream::iter(items.into_iter().map(Ok)).boxed()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    use futures::executor::block_on;

    #[test]
    fn empty_pipeline_ends_immediately() {
        let empty = LazyPipeline::<String>::empty();
        assert!(empty.globs().is_empty());
        assert!(empty.bases().is_empty());
        assert!(empty.distinct().is_empty());
        assert!(!empty.watch());

        let produced = block_on(collect_ok(empty.invoke()));
        assert!(produced.is_empty());
    }

    #[test]
    fn invocations_are_independent() {
        let pipeline = items(&["a", "b"]);
        let first = block_on(collect_ok(pipeline.invoke()));
        let second = block_on(collect_ok(pipeline.invoke()));
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(first, second);
    }

    #[test]
    fn origin_follows_upstream_items() {
        let pipeline = items(&["own"]);
        let produced = block_on(collect_ok(pipeline.run(replay(vec!["up".to_string()]))));
        assert_eq!(produced, vec!["up", "own"]);
    }

    #[test]
    fn pipe_chains_stages() {
        let upper = LazyPipeline::<String>::identity()
            .pipe_step(|input| input.map(|item| item.map(|s| s.to_uppercase())).boxed());
        let pipeline = items(&["a", "b"]).pipe(&upper);
        assert_eq!(block_on(collect_ok(pipeline.invoke())), vec!["A", "B"]);
    }

    #[test]
    fn fuse_on_error_stops_after_first_error() {
        let stream = fuse_on_error(
            failing(&["a"])
                .invoke()
                .chain(replay(vec!["late".to_string()]))
                .boxed(),
        );
        let produced: Vec<_> = block_on(stream.collect::<Vec<_>>());
        assert_eq!(produced.len(), 2);
        assert!(produced[0].is_ok());
        assert!(produced[1].is_err());
    }

    #[test]
    fn after_drain_waits_for_upstream() {
        let stream = after_drain(items(&["a", "b"]).invoke(), |collected| {
            replay(vec![collected.join("+")])
        });
        assert_eq!(block_on(collect_ok(stream)), vec!["a+b"]);

        let failed: Vec<_> = block_on(
            after_drain(failing(&["a"]).invoke(), |_| unreachable!())
                .collect::<Vec<_>>(),
        );
        assert_eq!(failed.len(), 1);
        assert!(failed[0].is_err());
    }
}
