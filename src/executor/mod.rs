//! Pool-side task execution.
//!
//! This module provides the supervisor that owns the workers, the task
//! queue and registry of running tasks, and the worker abstraction it
//! drives.

pub mod pool;
pub(crate) mod queue;
pub mod task;
pub mod worker;

pub use pool::{Pool, PoolStats};
pub use task::TaskHandle;
pub use worker::{Worker, WorkerContext, WorkerFactory, WorkerId};
