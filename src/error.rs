pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task failed: {0}")]
    Task(String),

    #[error("worker fault: {0}")]
    WorkerFault(String),

    #[error("pool terminated")]
    Terminated,

    #[error("no workers available")]
    NoWorkers,

    #[error("config error: {0}")]
    Config(String),

    #[error("worker spawn failed: {0}")]
    Spawn(String),

    #[error("unknown task kind: {0}")]
    UnknownTaskKind(String),

    #[error("task kind registered twice: {0}")]
    DuplicateTaskKind(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn task<S: Into<String>>(msg: S) -> Self {
        Error::Task(msg.into())
    }

    pub fn worker_fault<S: Into<String>>(msg: S) -> Self {
        Error::WorkerFault(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn spawn<S: Into<String>>(msg: S) -> Self {
        Error::Spawn(msg.into())
    }

    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Error::Protocol(msg.into())
    }

    /// Whether this error came from the task body rather than the pool or transport.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Error::Task(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::task("boom").to_string(), "task failed: boom");
        assert_eq!(Error::Terminated.to_string(), "pool terminated");
        assert_eq!(
            Error::UnknownTaskKind("fib".into()).to_string(),
            "unknown task kind: fib"
        );
    }

    #[test]
    fn test_task_failure_classification() {
        assert!(Error::task("x").is_task_failure());
        assert!(!Error::worker_fault("x").is_task_failure());
        assert!(!Error::Terminated.is_task_failure());
    }
}
