//! Task representation and completion handles.

use super::worker::WorkerId;
use crate::error::{Error, Result};
use crate::protocol::{Request, TaskId, Transfer};
use async_channel::{bounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Instant;

type Completion = Sender<Result<Value>>;

/// A task admitted to the pool but not yet bound to a worker.
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: String,
    pub(crate) payload: Value,
    pub(crate) transfer: Transfer,
    completion: Completion,
    pub(crate) submit_time: Instant,
}

impl Task {
    pub fn new(kind: String, payload: Value, transfer: Transfer) -> (Self, TaskHandle<Value>) {
        let (sender, receiver) = bounded(1);
        let id = TaskId::next();

        let task = Task {
            id: id.clone(),
            kind,
            payload,
            transfer,
            completion: sender,
            submit_time: Instant::now(),
        };

        (task, TaskHandle::new(id, receiver))
    }

    /// Split into the wire request and the continuation kept by the registry.
    pub fn dispatch(self, worker: WorkerId) -> (Request, Pending) {
        let request = Request::new(self.id, self.kind, self.payload).with_transfer(self.transfer);
        let pending = Pending {
            worker,
            completion: self.completion,
            dispatch_time: Instant::now(),
        };
        (request, pending)
    }

    pub fn reject(self, error: Error) {
        let _ = self.completion.try_send(Err(error));
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("submit_time", &self.submit_time)
            .finish()
    }
}

/// Continuation of a task that is running on a worker.
#[derive(Debug)]
pub(crate) struct Pending {
    pub(crate) worker: WorkerId,
    completion: Completion,
    dispatch_time: Instant,
}

impl Pending {
    pub fn resolve(self, payload: Value) {
        let _ = self.completion.try_send(Ok(payload));
    }

    pub fn reject(self, error: Error) {
        let _ = self.completion.try_send(Err(error));
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.dispatch_time.elapsed().as_nanos() as u64
    }
}

/// Handle to the eventual outcome of a submitted task.
///
/// The outcome is delivered exactly once. Dropping the handle does not cancel the task.
#[derive(Debug)]
pub struct TaskHandle<T = Value> {
    id: TaskId,
    receiver: Receiver<Result<Value>>,
    _output: PhantomData<fn() -> T>,
}

impl<T> TaskHandle<T> {
    fn new(id: TaskId, receiver: Receiver<Result<Value>>) -> Self {
        Self {
            id,
            receiver,
            _output: PhantomData,
        }
    }

    /// A handle that is already settled with `error`.
    pub(crate) fn rejected(error: Error) -> Self {
        let (sender, receiver) = bounded(1);
        let _ = sender.try_send(Err(error));
        Self::new(TaskId::next(), receiver)
    }

    pub(crate) fn cast<U>(self) -> TaskHandle<U> {
        TaskHandle::new(self.id, self.receiver)
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Whether `join` would return without waiting.
    pub fn is_settled(&self) -> bool {
        !self.receiver.is_empty() || self.receiver.is_closed()
    }
}

impl<T: DeserializeOwned> TaskHandle<T> {
    /// Wait for the task to finish and decode its result.
    pub async fn join(self) -> Result<T> {
        let outcome = self
            .receiver
            .recv()
            .await
            .map_err(|_| Error::Terminated)?;
        decode(outcome)
    }

    /// Block the current thread until the task finishes.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self.join())
    }

    /// Take the outcome if it has arrived. Once taken, `join` reports `Terminated`.
    pub fn try_join(&self) -> Option<Result<T>> {
        self.receiver.try_recv().ok().map(decode)
    }
}

fn decode<T: DeserializeOwned>(outcome: Result<Value>) -> Result<T> {
    Ok(serde_json::from_value(outcome?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_once() {
        let (task, handle) = Task::new("double".into(), json!(21), Vec::new());
        assert!(!handle.is_settled());

        let (request, pending) = task.dispatch(WorkerId::new(0));
        assert_eq!(request.task_kind, "double");
        assert_eq!(&request.id, handle.id());

        pending.resolve(json!(42));
        assert!(handle.is_settled());
        assert_eq!(handle.wait().unwrap(), json!(42));
    }

    #[test]
    fn test_reject() {
        let (task, handle) = Task::new("x".into(), Value::Null, Vec::new());
        let (_, pending) = task.dispatch(WorkerId::new(1));
        pending.reject(Error::task("bad input"));

        match handle.wait() {
            Err(Error::Task(msg)) => assert_eq!(msg, "bad input"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_typed_decode() {
        let (task, handle) = Task::new("sort".into(), json!([3, 1, 2]), Vec::new());
        let handle: TaskHandle<Vec<u32>> = handle.cast();
        let (_, pending) = task.dispatch(WorkerId::new(0));
        pending.resolve(json!([1, 2, 3]));

        assert_eq!(handle.wait().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_typed_decode_mismatch() {
        let (task, handle) = Task::new("sort".into(), Value::Null, Vec::new());
        let handle: TaskHandle<u64> = handle.cast();
        let (_, pending) = task.dispatch(WorkerId::new(0));
        pending.resolve(json!("not a number"));

        assert!(matches!(handle.wait(), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_dropped_continuation_reads_as_terminated() {
        let (task, handle) = Task::new("x".into(), Value::Null, Vec::new());
        assert!(!handle.is_settled());
        drop(task);
        assert!(handle.is_settled());
        assert!(matches!(handle.wait(), Err(Error::Terminated)));
    }

    #[test]
    fn test_try_join() {
        let (task, handle) = Task::new("x".into(), Value::Null, Vec::new());
        assert!(handle.try_join().is_none());

        task.reject(Error::NoWorkers);
        assert!(matches!(handle.try_join(), Some(Err(Error::NoWorkers))));
    }
}
