pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{Pool, PoolStats, TaskHandle, Worker, WorkerContext, WorkerFactory};
pub use crate::protocol::{Request, Response, TaskId, Transfer};
pub use crate::telemetry::MetricsSnapshot;
pub use crate::worker::{ProcessWorker, TaskKind, TaskRegistry, ThreadWorker};
