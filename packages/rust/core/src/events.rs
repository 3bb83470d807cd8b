//! Task lifecycle events and the subtask runner built on them.
//!
//! A [`TaskEventBus`] fans task start/stop notifications out to its
//! subscribers. [`run_subtasks`] asks an external [`TaskRunner`] to start a
//! set of tasks and waits on the bus until every one of them has stopped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::oneshot;
use tracing::{debug, instrument};

use recipeloader_shared::{RecipeError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Start { task: String },
    Stop { task: String },
}

impl TaskEvent {
    pub fn task(&self) -> &str {
        match self {
            Self::Start { task } | Self::Stop { task } => task,
        }
    }
}

type Handler = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(u64, Handler)>,
}

/// Broadcasts [`TaskEvent`]s. Clones share one subscriber list.
#[derive(Clone, Default)]
pub struct TaskEventBus {
    handlers: Arc<Mutex<Handlers>>,
}

impl TaskEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered while the returned
    /// [`Subscription`] is alive.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TaskEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.entries.push((id, Arc::new(handler)));
        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    pub fn emit(&self, event: &TaskEvent) {
        // handlers run outside the lock so they may subscribe or unsubscribe
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscribers(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

/// Handle to a registered handler. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    handlers: Weak<Mutex<Handlers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// External scheduler able to start named tasks. Progress is reported
/// through the [`TaskEventBus`] it was built with.
pub trait TaskRunner: Send + Sync {
    fn start(&self, tasks: &[String]) -> Result<()>;
}

/// Start `tasks` and resolve once each named task has emitted
/// [`TaskEvent::Stop`]. Duplicate names count once; an empty list resolves
/// immediately without touching the runner.
#[instrument(skip_all, fields(tasks = tasks.len()))]
pub async fn run_subtasks(
    bus: &TaskEventBus,
    runner: &dyn TaskRunner,
    tasks: &[String],
) -> Result<()> {
    let pending: HashSet<String> = tasks.iter().cloned().collect();
    if pending.is_empty() {
        return Ok(());
    }
    debug!(pending = pending.len(), "running subtasks");

    let (done_tx, done_rx) = oneshot::channel();
    let state = Mutex::new((pending, Some(done_tx)));
    let subscription = bus.subscribe(move |event| {
        let TaskEvent::Stop { task } = event else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        let (pending, done) = &mut *state;
        if pending.remove(task) {
            debug!(task = %task, remaining = pending.len(), "subtask stopped");
        }
        if pending.is_empty() {
            if let Some(done) = done.take() {
                let _ = done.send(());
            }
        }
    });

    runner.start(tasks)?;
    done_rx
        .await
        .map_err(|_| RecipeError::step("subtask listener dropped before all tasks stopped"))?;
    subscription.unsubscribe();
    Ok(())
}
