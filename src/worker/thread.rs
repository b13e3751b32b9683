//! Workers backed by a dedicated OS thread.

use super::panic_handler::PanicHandler;
use super::registry::TaskRegistry;
use crate::error::{Error, Result};
use crate::executor::{Worker, WorkerContext, WorkerFactory, WorkerId};
use crate::protocol::Request;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Runs requests on its own thread through a [`TaskRegistry`].
///
/// Requests are moved into the thread and responses moved back; nothing is shared
/// with the pool. A panicking handler is treated as a crash of the worker: the pool
/// is told about the fault and the thread exits.
#[derive(Debug)]
pub struct ThreadWorker {
    id: WorkerId,
    inbox: Option<Sender<Request>>,
    thread: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    pub fn spawn(ctx: WorkerContext, registry: Arc<TaskRegistry>) -> Result<Self> {
        registry.require(ctx.required_kinds())?;

        let id = ctx.id();
        let (inbox, requests) = crossbeam_channel::unbounded();

        let mut builder = thread::Builder::new().name(ctx.thread_name());
        if let Some(stack_size) = ctx.stack_size() {
            builder = builder.stack_size(stack_size);
        }

        let thread = builder
            .spawn(move || run(ctx, registry, requests))
            .map_err(|e| Error::spawn(format!("worker thread {}: {}", id, e)))?;

        Ok(Self {
            id,
            inbox: Some(inbox),
            thread: Some(thread),
        })
    }

    /// Factory that gives every new worker the same registry.
    pub fn factory(registry: TaskRegistry) -> impl WorkerFactory {
        let registry = Arc::new(registry);
        move |ctx: WorkerContext| -> Result<Box<dyn Worker>> {
            Ok(Box::new(ThreadWorker::spawn(ctx, registry.clone())?))
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }
}

impl Worker for ThreadWorker {
    fn post(&mut self, request: Request) -> Result<()> {
        let inbox = self
            .inbox
            .as_ref()
            .ok_or_else(|| Error::worker_fault("worker already terminated"))?;

        inbox
            .send(request)
            .map_err(|_| Error::worker_fault(format!("worker thread {} has exited", self.id)))
    }

    fn terminate(&mut self) {
        // closing the inbox stops the loop after the current task; never join here
        self.inbox.take();
        if self.thread.take().is_some() {
            debug!(worker = %self.id, "thread worker detached");
        }
    }
}

impl Drop for ThreadWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run(ctx: WorkerContext, registry: Arc<TaskRegistry>, requests: Receiver<Request>) {
    let panics = PanicHandler::new();

    for request in requests.iter() {
        let id = request.id.clone();

        match panics.execute(|| registry.dispatch(request)) {
            Ok(response) => {
                if !ctx.reply(response) {
                    break;
                }
            }
            Err(panic) => {
                warn!(worker = %ctx.id(), task = %id, "handler panicked: {}", panic.message);
                ctx.fault(format!("task {} panicked: {}", id, panic.message));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::executor::Pool;
    use serde_json::{json, Value};

    fn registry() -> TaskRegistry {
        TaskRegistry::builder()
            .handler("double", |v: Value, _| {
                v.as_i64()
                    .map(|n| json!(n * 2))
                    .ok_or("expected an integer")
            })
            .handler("boom", |_, _| -> std::result::Result<Value, String> {
                panic!("exploded")
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_thread_worker_round_trip() {
        let config = Config::builder().pool_size(2).build().unwrap();
        let pool = Pool::new(config, ThreadWorker::factory(registry())).unwrap();

        assert_eq!(pool.run("double", json!(21)).wait().unwrap(), json!(42));
        match pool.run("double", json!("x")).wait() {
            Err(Error::Task(msg)) => assert_eq!(msg, "expected an integer"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_panic_becomes_fault() {
        let config = Config::builder().pool_size(1).build().unwrap();
        let pool = Pool::new(config, ThreadWorker::factory(registry())).unwrap();

        match pool.run("boom", Value::Null).wait() {
            Err(Error::WorkerFault(reason)) => assert!(reason.contains("exploded")),
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(pool.stats().total_workers, 1);
        assert_eq!(pool.run("double", json!(4)).wait().unwrap(), json!(8));
    }

    #[test]
    fn test_missing_required_kind_fails_fast() {
        let config = Config::builder()
            .pool_size(1)
            .require_kind("double")
            .require_kind("sort")
            .build()
            .unwrap();

        let result = Pool::new(config, ThreadWorker::factory(registry()));
        assert!(matches!(result, Err(Error::UnknownTaskKind(k)) if k == "sort"));
    }

    #[test]
    fn test_post_after_terminate() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let config = Arc::new(Config::default());
        let ctx = WorkerContext::new(WorkerId::new(0), tx, config);
        let mut worker = ThreadWorker::spawn(ctx, Arc::new(registry())).unwrap();

        worker.terminate();
        let request = Request::new("t1".into(), "double", json!(1));
        assert!(matches!(worker.post(request), Err(Error::WorkerFault(_))));
    }
}
