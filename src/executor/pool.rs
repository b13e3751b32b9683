use super::queue::{ActiveTasks, TaskQueue};
use super::task::{Task, TaskHandle};
use super::worker::{Worker, WorkerContext, WorkerEvent, WorkerFactory, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::protocol::{Response, Transfer};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crate::worker::TaskKind;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// Fixed-size pool of isolated workers.
///
/// Tasks go to an idle worker right away or wait in a FIFO queue. Each worker runs
/// one task at a time. A worker that faults is discarded and replaced, and the task
/// it was running is rejected with [`Error::WorkerFault`].
///
/// All bookkeeping sits behind one lock; worker replies are applied by a single
/// supervisor thread.
pub struct Pool {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: Mutex<PoolState>,
    factory: Box<dyn WorkerFactory>,
    config: Arc<Config>,
    events: Sender<WorkerEvent>,
    next_worker_id: AtomicU64,
    metrics: Metrics,
}

#[derive(Default)]
struct PoolState {
    workers: HashMap<WorkerId, Box<dyn Worker>>,
    idle: VecDeque<WorkerId>,
    queue: TaskQueue,
    active: ActiveTasks,
    terminated: bool,
}

/// Point-in-time counts, see [`Pool::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct PoolStats {
    pub total_workers: usize,
    pub available_workers: usize,
    pub active_tasks: usize,
    pub queued_tasks: usize,
}

impl Pool {
    pub fn new<F: WorkerFactory>(config: Config, factory: F) -> Result<Self> {
        config.validate()?;

        let size = config.worker_count();
        let (events, inbox) = crossbeam_channel::unbounded();
        let supervisor_name = format!("{}-supervisor", config.thread_name_prefix);

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState::default()),
            factory: Box::new(factory),
            config: Arc::new(config),
            events,
            next_worker_id: AtomicU64::new(0),
            metrics: Metrics::new(),
        });

        {
            let mut state = shared.state.lock();
            for _ in 0..size {
                if let Err(e) = shared.spawn_worker(&mut state) {
                    for (_, mut worker) in state.workers.drain() {
                        worker.terminate();
                    }
                    return Err(e);
                }
            }
        }

        let supervisor_shared = shared.clone();
        let supervisor = thread::Builder::new()
            .name(supervisor_name)
            .spawn(move || supervise(supervisor_shared, inbox))
            .map_err(|e| Error::spawn(format!("supervisor thread: {}", e)));

        let supervisor = match supervisor {
            Ok(handle) => handle,
            Err(e) => {
                shared.shutdown();
                return Err(e);
            }
        };

        debug!(workers = size, "worker pool started");

        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    /// Submit a task of `kind` with a JSON payload.
    pub fn run(&self, kind: impl Into<String>, payload: Value) -> TaskHandle<Value> {
        self.run_with_transfer(kind, payload, Vec::new())
    }

    /// Like [`run`](Self::run), moving `transfer` buffers to the worker alongside the
    /// payload.
    pub fn run_with_transfer(
        &self,
        kind: impl Into<String>,
        payload: Value,
        transfer: Transfer,
    ) -> TaskHandle<Value> {
        let (task, handle) = Task::new(kind.into(), payload, transfer);
        self.shared.admit(task);
        handle
    }

    /// Submit a typed task.
    pub fn submit<K: TaskKind>(&self, input: &K::Input) -> TaskHandle<K::Output> {
        match serde_json::to_value(input) {
            Ok(payload) => self.run(K::NAME, payload).cast(),
            Err(e) => TaskHandle::rejected(e.into()),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminated
    }

    /// Terminate every worker and drop all bookkeeping.
    ///
    /// Tasks still queued or running are rejected with [`Error::Terminated`]; later
    /// submissions are rejected the same way. Calling this twice is harmless.
    pub fn terminate(&self) {
        self.shared.shutdown();
        let _ = self.shared.events.send(WorkerEvent::Shutdown);

        if let Some(handle) = self.supervisor.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

fn supervise(shared: Arc<Shared>, inbox: Receiver<WorkerEvent>) {
    for event in inbox.iter() {
        match event {
            WorkerEvent::Message { worker, response } => {
                shared.handle_worker_message(worker, response)
            }
            WorkerEvent::Fault { worker, reason } => shared.handle_worker_error(worker, reason),
            WorkerEvent::Shutdown => break,
        }
    }
}

impl PoolState {
    fn stats(&self) -> PoolStats {
        PoolStats {
            total_workers: self.workers.len(),
            available_workers: self.idle.len(),
            active_tasks: self.active.len(),
            queued_tasks: self.queue.len(),
        }
    }
}

impl Shared {
    fn spawn_worker(&self, state: &mut PoolState) -> Result<WorkerId> {
        let id = WorkerId::new(self.next_worker_id.fetch_add(1, Ordering::Relaxed));
        let ctx = WorkerContext::new(id, self.events.clone(), self.config.clone());
        let worker = self.factory.create(ctx)?;

        state.workers.insert(id, worker);
        state.idle.push_back(id);
        Ok(id)
    }

    fn admit(&self, task: Task) {
        let mut state = self.state.lock();
        self.metrics.record_submitted();

        if state.terminated {
            self.metrics.record_rejected(1);
            task.reject(Error::Terminated);
            return;
        }

        if state.workers.is_empty() {
            self.metrics.record_rejected(1);
            task.reject(Error::NoWorkers);
            return;
        }

        match state.idle.pop_front() {
            Some(worker) => self.execute_task(&mut state, worker, task),
            None => {
                trace!(task = %task.id, kind = %task.kind, "all workers busy, queueing task");
                state.queue.push(task);
            }
        }
    }

    /// Bind `task` to `worker` and send it. The caller has already taken `worker` out
    /// of the idle set.
    fn execute_task(&self, state: &mut PoolState, worker: WorkerId, task: Task) {
        let (request, pending) = task.dispatch(worker);
        let id = request.id.clone();
        state.active.bind(id.clone(), pending);

        debug!(task = %id, worker = %worker, kind = %request.task_kind, "dispatching task");

        let delivered = match state.workers.get_mut(&worker) {
            Some(handle) => handle.post(request),
            None => Err(Error::worker_fault("worker is not part of the pool")),
        };

        // handled on the supervisor thread like any other fault
        if let Err(e) = delivered {
            warn!(task = %id, worker = %worker, error = %e, "failed to deliver task");
            let _ = self.events.send(WorkerEvent::Fault {
                worker,
                reason: format!("failed to deliver task {}: {}", id, e),
            });
        }
    }

    fn process_queue(&self, state: &mut PoolState) {
        while !state.queue.is_empty() && !state.idle.is_empty() {
            if let (Some(task), Some(worker)) = (state.queue.pop(), state.idle.pop_front()) {
                self.execute_task(state, worker, task);
            }
        }
    }

    fn handle_worker_message(&self, worker: WorkerId, response: Response) {
        let mut state = self.state.lock();

        let Some(pending) = state.active.take_if_bound(response.id(), worker) else {
            trace!(task = %response.id(), worker = %worker, "ignoring stale response");
            return;
        };

        let latency_ns = pending.elapsed_ns();
        match response {
            Response::Result { payload, .. } => {
                self.metrics.record_completed(latency_ns);
                pending.resolve(payload);
            }
            Response::Error { id, payload } => {
                debug!(task = %id, worker = %worker, error = %payload, "task failed");
                self.metrics.record_failed(latency_ns);
                pending.reject(Error::Task(payload));
            }
        }

        state.idle.push_back(worker);
        self.process_queue(&mut state);
    }

    fn handle_worker_error(&self, worker: WorkerId, reason: String) {
        let mut state = self.state.lock();

        let Some(mut failed) = state.workers.remove(&worker) else {
            trace!(worker = %worker, %reason, "fault from retired worker ignored");
            return;
        };

        warn!(worker = %worker, %reason, "worker faulted, replacing");

        if let Some((id, pending)) = state.active.take_for_worker(worker) {
            debug!(task = %id, worker = %worker, "rejecting task bound to faulted worker");
            self.metrics.record_faulted();
            pending.reject(Error::WorkerFault(reason));
        }

        state.idle.retain(|idle| *idle != worker);
        failed.terminate();

        match self.spawn_worker(&mut state) {
            Ok(replacement) => {
                self.metrics.record_worker_replaced();
                debug!(old = %worker, new = %replacement, "worker replaced");
            }
            Err(e) => error!(worker = %worker, error = %e, "failed to replace worker"),
        }

        if state.workers.is_empty() {
            let stranded = state.queue.len() as u64;
            if stranded > 0 {
                error!(tasks = stranded, "no workers left, rejecting queued tasks");
                self.metrics.record_rejected(stranded);
            }
            for task in state.queue.drain() {
                task.reject(Error::NoWorkers);
            }
        }

        self.process_queue(&mut state);
    }

    fn shutdown(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.terminated {
            return;
        }
        state.terminated = true;

        for (_, mut worker) in state.workers.drain() {
            worker.terminate();
        }
        state.idle.clear();

        let mut rejected = 0u64;
        for task in state.queue.drain() {
            task.reject(Error::Terminated);
            rejected += 1;
        }
        for (_, pending) in state.active.drain() {
            pending.reject(Error::Terminated);
            rejected += 1;
        }
        self.metrics.record_rejected(rejected);

        debug!(rejected, "worker pool terminated");
    }
}
