//! thready - a fixed-size pool of isolated workers
//!
//! Tasks are submitted by kind with a serializable payload, handed to an idle
//! worker (or queued in FIFO order until one frees up), and settled exactly once
//! with the worker's correlated reply. Workers share no memory with the pool;
//! a worker that crashes is replaced and only the task it was running fails.
//!
//! # Quick Start
//!
//! ```no_run
//! use thready::prelude::*;
//! use serde_json::json;
//!
//! let registry = TaskRegistry::builder()
//!     .handler("double", |v: serde_json::Value, _| {
//!         v.as_i64().map(|n| json!(n * 2)).ok_or("expected an integer")
//!     })
//!     .build()
//!     .unwrap();
//!
//! let config = Config::builder().pool_size(4).build().unwrap();
//! let pool = Pool::new(config, ThreadWorker::factory(registry)).unwrap();
//!
//! let doubled = pool.run("double", json!(21)).wait().unwrap();
//! assert_eq!(doubled, json!(42));
//! ```
//!
//! # Features
//!
//! - **Message correlation**: every request carries an id; stale or duplicate
//!   replies are ignored
//! - **Crash recovery**: faulted workers are terminated and replaced
//! - **Typed tasks**: [`TaskKind`] fixes input and output types per kind
//! - **Transports**: in-process threads ([`ThreadWorker`]) or child processes
//!   speaking JSON lines ([`ProcessWorker`], [`worker::serve_stdio`])
//! - **Telemetry**: outcome counters and latency histogram (optional)

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod protocol;
pub mod telemetry;
pub mod worker;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{Pool, PoolStats, TaskHandle, Worker, WorkerContext, WorkerFactory, WorkerId};
pub use protocol::{Request, Response, TaskId, Transfer};
pub use worker::{ProcessWorker, TaskKind, TaskRegistry, ThreadWorker};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_pool() {
        let registry = TaskRegistry::builder()
            .handler("inc", |v: serde_json::Value, _| {
                v.as_i64().map(|n| json!(n + 1)).ok_or("expected an integer")
            })
            .build()
            .unwrap();

        let config = Config::builder().pool_size(2).build().unwrap();
        let pool = Pool::new(config, ThreadWorker::factory(registry)).unwrap();

        let handles: Vec<_> = (0..10).map(|i| pool.run("inc", json!(i))).collect();
        let results: Vec<i64> = handles
            .into_iter()
            .map(|h| h.wait().unwrap().as_i64().unwrap())
            .collect();

        assert_eq!(results, (1..=10).collect::<Vec<_>>());
        pool.terminate();
    }
}
