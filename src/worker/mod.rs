//! Worker-side runtime.
//!
//! Routes requests to handlers by task kind and provides two ready-made transports:
//! an in-process thread and a child process speaking JSON lines.

pub mod panic_handler;
pub mod process;
pub mod registry;
pub mod thread;

pub use panic_handler::{PanicHandler, PanicInfo};
pub use process::{serve, serve_stdio, ProcessWorker};
pub use registry::{TaskKind, TaskRegistry, TaskRegistryBuilder};
pub use thread::ThreadWorker;
