//! Source pipelines and their composition for recipeloader.
//!
//! A source specification is normalized into atomic entries, partitioned
//! into groups, and built into a [`LazyPipeline`] that opens its groups
//! through an external [`SourceStep`] each time it is invoked. Pipelines
//! are combined with [`merge`], [`sequence`] and [`queue`].

pub mod catalog;
pub mod compose;
pub mod events;
pub mod factory;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod registry;
pub mod steps;
pub mod watch;

pub use catalog::PipeCatalog;
pub use compose::{ComposeInput, QueueOptions, merge, merge_pipelines, queue, sequence};
pub use events::{Subscription, TaskEvent, TaskEventBus, TaskRunner, run_subtasks};
pub use factory::{SourceOptions, SourceStep, build_pipelines, finalize, make_source};
pub use normalize::normalize;
pub use partition::partition;
pub use pipeline::{LazyPipeline, PipeStream};
pub use registry::SourceRegistry;
pub use watch::{WatchOptions, WatchStep, watch_sources};
