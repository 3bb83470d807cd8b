//! Composition engine: merge, sequence, and queue lazy pipelines.
//!
//! - **merge**: every input runs concurrently; outputs interleave.
//! - **sequence**: inputs sorted by order key, each stage drains the
//!   previous one before it is built.
//! - **queue**: inputs sorted by order key and run concurrently; output is
//!   released strictly in order, later inputs buffered until their turn.
//!
//! Merge takes plain inputs, sequence and queue take order-tagged ones. A
//! mismatch is rejected with [`RecipeError::InvalidComposition`] before any
//! pipeline runs.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

use recipeloader_shared::{ComposeConfig, RecipeError, Result, SourceMeta};

use crate::pipeline::{LazyPipeline, PipeStream, after_drain, fuse_on_error, replay};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A composition input: either a plain pipeline or one tagged with an
/// explicit order key.
pub enum ComposeInput<T> {
    Plain(LazyPipeline<T>),
    Ordered { order: i64, pipeline: LazyPipeline<T> },
}

impl<T> Clone for ComposeInput<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(pipeline) => Self::Plain(pipeline.clone()),
            Self::Ordered { order, pipeline } => Self::Ordered {
                order: *order,
                pipeline: pipeline.clone(),
            },
        }
    }
}

impl<T> std::fmt::Debug for ComposeInput<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(pipeline) => f.debug_tuple("Plain").field(pipeline).finish(),
            Self::Ordered { order, pipeline } => f
                .debug_struct("Ordered")
                .field("order", order)
                .field("pipeline", pipeline)
                .finish(),
        }
    }
}

impl<T> ComposeInput<T> {
    pub fn plain(pipeline: LazyPipeline<T>) -> Self {
        Self::Plain(pipeline)
    }

    pub fn ordered(order: i64, pipeline: LazyPipeline<T>) -> Self {
        Self::Ordered { order, pipeline }
    }

    pub fn pipeline(&self) -> &LazyPipeline<T> {
        match self {
            Self::Plain(pipeline) | Self::Ordered { pipeline, .. } => pipeline,
        }
    }
}

impl<T> From<LazyPipeline<T>> for ComposeInput<T> {
    fn from(pipeline: LazyPipeline<T>) -> Self {
        Self::Plain(pipeline)
    }
}

impl<T> From<(i64, LazyPipeline<T>)> for ComposeInput<T> {
    fn from((order, pipeline): (i64, LazyPipeline<T>)) -> Self {
        Self::Ordered { order, pipeline }
    }
}

fn into_plain<T>(inputs: Vec<ComposeInput<T>>, policy: &str) -> Result<Vec<LazyPipeline<T>>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| match input {
            ComposeInput::Plain(pipeline) => Ok(pipeline),
            ComposeInput::Ordered { order, .. } => Err(RecipeError::invalid_composition(format!(
                "{policy} takes plain pipelines, input {i} is tagged with order {order}"
            ))),
        })
        .collect()
}

/// Unwrap order-tagged inputs, sorted ascending by key. Equal keys keep
/// their input order.
fn into_ordered<T>(inputs: Vec<ComposeInput<T>>, policy: &str) -> Result<Vec<LazyPipeline<T>>> {
    let mut tagged = inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| match input {
            ComposeInput::Ordered { order, pipeline } => Ok((order, pipeline)),
            ComposeInput::Plain(_) => Err(RecipeError::invalid_composition(format!(
                "{policy} needs order-tagged pipelines, input {i} has no order key"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    tagged.sort_by_key(|(order, _)| *order);
    Ok(tagged.into_iter().map(|(_, pipeline)| pipeline).collect())
}

fn union_meta<T>(pipelines: &[LazyPipeline<T>]) -> SourceMeta {
    SourceMeta::union(pipelines.iter().map(|p| p.meta()))
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge plain inputs into one concurrently-running pipeline.
pub fn merge<T: Send + 'static>(inputs: Vec<ComposeInput<T>>) -> Result<LazyPipeline<T>> {
    Ok(merge_pipelines(into_plain(inputs, "merge")?))
}

/// Merge already-validated pipelines. Zero pipelines give the empty pipeline.
pub fn merge_pipelines<T: Send + 'static>(pipelines: Vec<LazyPipeline<T>>) -> LazyPipeline<T> {
    if pipelines.is_empty() {
        return LazyPipeline::empty();
    }

    debug!(inputs = pipelines.len(), policy = "merge", "composing pipelines");
    let meta = union_meta(&pipelines);
    LazyPipeline::origin(meta, move || {
        let streams: Vec<PipeStream<T>> = pipelines.iter().map(|p| p.invoke()).collect();
        fuse_on_error(stream::select_all(streams).boxed())
    })
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Chain order-tagged inputs: each stage receives the full output of the
/// previous one and is only built once that output has completed.
///
/// Zero inputs give an identity stage.
pub fn sequence<T: Send + 'static>(inputs: Vec<ComposeInput<T>>) -> Result<LazyPipeline<T>> {
    let stages = into_ordered(inputs, "sequence")?;
    if stages.is_empty() {
        return Ok(LazyPipeline::identity());
    }

    debug!(inputs = stages.len(), policy = "sequence", "composing pipelines");
    let meta = union_meta(&stages);
    Ok(LazyPipeline::from_step(meta, move |input| {
        stages.iter().fold(input, |upstream, stage| {
            let stage = stage.clone();
            after_drain(upstream, move |items| stage.run(replay(items)))
        })
    }))
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Buffering policy for queued composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Items held per waiting input before it stops being polled.
    /// `None` buffers without limit.
    pub buffer_limit: Option<usize>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            buffer_limit: Some(1024),
        }
    }
}

impl From<&ComposeConfig> for QueueOptions {
    fn from(config: &ComposeConfig) -> Self {
        Self {
            buffer_limit: (config.queue_buffer > 0).then_some(config.queue_buffer),
        }
    }
}

/// Run order-tagged inputs concurrently, emitting each one's full output
/// in order-key order. Zero inputs give the empty pipeline.
pub fn queue<T: Send + 'static>(
    inputs: Vec<ComposeInput<T>>,
    options: QueueOptions,
) -> Result<LazyPipeline<T>> {
    let ordered = into_ordered(inputs, "queue")?;
    if ordered.is_empty() {
        return Ok(LazyPipeline::empty());
    }

    debug!(
        inputs = ordered.len(),
        policy = "queue",
        buffer_limit = ?options.buffer_limit,
        "composing pipelines"
    );
    let meta = union_meta(&ordered);
    Ok(LazyPipeline::origin(meta, move || {
        let lanes = ordered.iter().map(|p| Lane::new(p.invoke())).collect();
        QueueStream {
            lanes,
            head: 0,
            buffer_limit: options.buffer_limit,
            failed: false,
        }
        .boxed()
    }))
}

struct Lane<T> {
    /// `None` once the input has ended or failed.
    stream: Option<PipeStream<T>>,
    buffered: VecDeque<Result<T>>,
}

impl<T> Lane<T> {
    fn new(stream: PipeStream<T>) -> Self {
        Self {
            stream: Some(stream),
            buffered: VecDeque::new(),
        }
    }

    /// Pull whatever is ready into the buffer, up to `limit` items.
    fn fill(&mut self, cx: &mut Context<'_>, limit: Option<usize>) {
        while let Some(stream) = self.stream.as_mut() {
            if limit.is_some_and(|limit| self.buffered.len() >= limit) {
                break;
            }
            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => {
                    if item.is_err() {
                        self.stream = None;
                    }
                    self.buffered.push_back(item);
                }
                Poll::Ready(None) => self.stream = None,
                Poll::Pending => break,
            }
        }
    }
}

/// Ordered fan-in. The head lane is forwarded directly; lanes behind it are
/// polled into their buffers so they keep producing in the background.
struct QueueStream<T> {
    lanes: Vec<Lane<T>>,
    head: usize,
    buffer_limit: Option<usize>,
    failed: bool,
}

// Fields are never pinned structurally.
impl<T> Unpin for QueueStream<T> {}

impl<T> Stream for QueueStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.failed {
            return Poll::Ready(None);
        }

        let limit = this.buffer_limit;
        for lane in this.lanes.iter_mut().skip(this.head + 1) {
            lane.fill(cx, limit);
        }

        while let Some(lane) = this.lanes.get_mut(this.head) {
            if let Some(item) = lane.buffered.pop_front() {
                this.failed = item.is_err();
                return Poll::Ready(Some(item));
            }

            let Some(stream) = lane.stream.as_mut() else {
                this.head += 1;
                continue;
            };

            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => {
                    this.failed = item.is_err();
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => {
                    lane.stream = None;
                    this.head += 1;
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        Poll::Ready(None)
    }
}
