//! Workers backed by a child process speaking JSON lines over stdio.
//!
//! Each request is written to the child's stdin as one line of JSON; each response
//! is read from its stdout as one line of JSON. Any program can serve as the child;
//! [`serve_stdio`] turns a Rust binary with a [`TaskRegistry`] into one.

use super::registry::TaskRegistry;
use crate::error::{Error, Result};
use crate::executor::{Worker, WorkerContext, WorkerFactory, WorkerId};
use crate::protocol::{Request, Response};
use crossbeam_channel::{Receiver, Sender};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use tracing::debug;

/// Runs requests in a child process.
///
/// `post` only queues the request; a writer thread feeds the child's stdin and a
/// reader thread turns its stdout back into responses, so a child that stops
/// reading never holds up the pool.
#[derive(Debug)]
pub struct ProcessWorker {
    id: WorkerId,
    child: Child,
    inbox: Option<Sender<Request>>,
    terminated: bool,
}

impl ProcessWorker {
    pub fn spawn(ctx: WorkerContext, mut command: Command) -> Result<Self> {
        let id = ctx.id();
        let program = command.get_program().to_string_lossy().into_owned();

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn(format!("{}: {}", program, e)))?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::spawn(format!("{}: stdio not captured", program)));
            }
        };

        let (inbox, requests) = crossbeam_channel::unbounded();

        let writer_ctx = ctx.clone();
        let writer = thread::Builder::new()
            .name(format!("{}-stdin", ctx.thread_name()))
            .spawn(move || write_requests(writer_ctx, stdin, requests));

        if let Err(e) = writer {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::spawn(format!("writer thread for worker {}: {}", id, e)));
        }

        let reader = thread::Builder::new()
            .name(ctx.thread_name())
            .spawn(move || read_responses(ctx, stdout));

        if let Err(e) = reader {
            // the writer exits once the inbox is dropped
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::spawn(format!("reader thread for worker {}: {}", id, e)));
        }

        debug!(worker = %id, pid = child.id(), %program, "process worker started");

        Ok(Self {
            id,
            child,
            inbox: Some(inbox),
            terminated: false,
        })
    }

    /// Factory that starts a fresh process from `make_command` for every worker.
    pub fn factory<F>(make_command: F) -> impl WorkerFactory
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        move |ctx: WorkerContext| -> Result<Box<dyn Worker>> {
            Ok(Box::new(ProcessWorker::spawn(ctx, make_command())?))
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Worker for ProcessWorker {
    fn post(&mut self, request: Request) -> Result<()> {
        let inbox = self
            .inbox
            .as_ref()
            .ok_or_else(|| Error::worker_fault("worker process already terminated"))?;

        inbox.send(request).map_err(|_| {
            Error::worker_fault(format!("stdin writer for worker {} has exited", self.id))
        })
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.inbox.take();
        // killing the child also unblocks a writer stuck on a full pipe
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!(worker = %self.id, "process worker terminated");
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn write_requests(ctx: WorkerContext, stdin: ChildStdin, requests: Receiver<Request>) {
    let mut stdin = BufWriter::new(stdin);

    for request in requests.iter() {
        if let Err(e) = write_line(&mut stdin, &request) {
            ctx.fault(format!("failed to write task {} to worker process: {}", request.id, e));
            return;
        }
    }
}

fn write_line<W: Write>(output: &mut W, request: &Request) -> Result<()> {
    serde_json::to_writer(&mut *output, request)?;
    output.write_all(b"\n")?;
    output.flush()?;
    Ok(())
}

fn read_responses(ctx: WorkerContext, stdout: ChildStdout) {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                ctx.fault(format!("failed to read from worker process: {}", e));
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Response>(&line) {
            Ok(response) => {
                if !ctx.reply(response) {
                    return;
                }
            }
            Err(e) => {
                ctx.fault(format!("malformed response from worker process: {}", e));
                return;
            }
        }
    }

    ctx.fault("worker process closed its output");
}

/// Serve requests read from `input`, writing one response line per request.
///
/// Returns when `input` reaches end of file. A line that is not a valid request
/// ends the loop with [`Error::Protocol`].
pub fn serve<R: BufRead, W: Write>(registry: &TaskRegistry, input: R, mut output: W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = serde_json::from_str(&line)
            .map_err(|e| Error::protocol(format!("malformed request: {}", e)))?;
        let response = registry.dispatch(request);

        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
    }
    Ok(())
}

/// [`serve`] over the process's own stdin and stdout.
pub fn serve_stdio(registry: &TaskRegistry) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(registry, stdin.lock(), stdout.lock())
}
