//! Pool-side view of a worker.

use crate::config::Config;
use crate::error::Result;
use crate::protocol::{Request, Response};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn new(id: u64) -> Self {
        WorkerId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a worker can tell the supervisor.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Message { worker: WorkerId, response: Response },
    Fault { worker: WorkerId, reason: String },
    Shutdown,
}

/// One isolated execution unit.
///
/// A worker receives requests through `post` and answers each one, later and exactly
/// once, through the [`WorkerContext`] it was created with. Problems with the unit
/// itself (a crashed thread, a dead process) are reported with
/// [`WorkerContext::fault`].
pub trait Worker: Send {
    /// Hand `request` to the worker. Called with the pool locked, so it must only
    /// queue the request, never wait on the execution unit.
    fn post(&mut self, request: Request) -> Result<()>;

    /// Release the underlying resources. Must not block on a running task.
    fn terminate(&mut self);
}

/// Connection from a worker back to its pool.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    events: Sender<WorkerEvent>,
    config: Arc<Config>,
}

impl WorkerContext {
    pub(crate) fn new(id: WorkerId, events: Sender<WorkerEvent>, config: Arc<Config>) -> Self {
        Self { id, events, config }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn thread_name(&self) -> String {
        format!("{}-{}", self.config.thread_name_prefix, self.id)
    }

    pub fn stack_size(&self) -> Option<usize> {
        self.config.stack_size
    }

    pub fn required_kinds(&self) -> &[String] {
        &self.config.required_kinds
    }

    /// Deliver a response. Returns `false` once the pool is gone.
    pub fn reply(&self, response: Response) -> bool {
        self.events
            .send(WorkerEvent::Message {
                worker: self.id,
                response,
            })
            .is_ok()
    }

    /// Report that the execution unit itself failed.
    pub fn fault<S: Into<String>>(&self, reason: S) {
        let _ = self.events.send(WorkerEvent::Fault {
            worker: self.id,
            reason: reason.into(),
        });
    }
}

/// Builds fresh workers, at pool start and after every fault.
pub trait WorkerFactory: Send + Sync + 'static {
    fn create(&self, ctx: WorkerContext) -> Result<Box<dyn Worker>>;
}

impl<F> WorkerFactory for F
where
    F: Fn(WorkerContext) -> Result<Box<dyn Worker>> + Send + Sync + 'static,
{
    fn create(&self, ctx: WorkerContext) -> Result<Box<dyn Worker>> {
        self(ctx)
    }
}
