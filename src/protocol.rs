//! Messages exchanged between the pool and its workers.
//!
//! The wire shape is transport-agnostic JSON:
//!
//! ```text
//! request:  { "id": "...", "kind": "task", "taskKind": "...", "payload": <any> }
//! response: { "id": "...", "kind": "result", "payload": <any> }
//!           { "id": "...", "kind": "error",  "payload": "<message>" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier correlating a request with its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn next() -> Self {
        let seq = TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        TaskId(format!("task-{}-{}", std::process::id(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Owned buffers handed to the worker along with a request instead of being copied
/// into the payload.
pub type Transfer = Vec<Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Task,
}

/// Pool → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: TaskId,
    pub kind: RequestKind,
    pub task_kind: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transfer: Transfer,
}

impl Request {
    pub fn new(id: TaskId, task_kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            kind: RequestKind::Task,
            task_kind: task_kind.into(),
            payload,
            transfer: Vec::new(),
        }
    }

    pub fn with_transfer(mut self, transfer: Transfer) -> Self {
        self.transfer = transfer;
        self
    }
}

/// Worker → pool. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Response {
    Result { id: TaskId, payload: Value },
    Error { id: TaskId, payload: String },
}

impl Response {
    pub fn result(id: TaskId, payload: Value) -> Self {
        Response::Result { id, payload }
    }

    pub fn error(id: TaskId, message: impl Into<String>) -> Self {
        Response::Error {
            id,
            payload: message.into(),
        }
    }

    pub fn id(&self) -> &TaskId {
        match self {
            Response::Result { id, .. } | Response::Error { id, .. } => id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
