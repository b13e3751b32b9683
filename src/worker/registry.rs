//! Task-kind registry used by workers to route requests to handlers.

use crate::error::{Error, Result};
use crate::protocol::{Request, Response, Transfer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

type Handler = Box<dyn Fn(Value, Transfer) -> std::result::Result<Value, String> + Send + Sync>;

/// A statically described kind of task with typed input and output.
///
/// ```
/// use thready::TaskKind;
///
/// struct Fibonacci;
///
/// impl TaskKind for Fibonacci {
///     const NAME: &'static str = "fibonacci";
///     type Input = u32;
///     type Output = u64;
/// }
/// ```
pub trait TaskKind: 'static {
    const NAME: &'static str;
    type Input: Serialize + DeserializeOwned + Send;
    type Output: Serialize + DeserializeOwned + Send;
}

/// Maps task-kind names to handlers.
#[derive(Default)]
pub struct TaskRegistry {
    handlers: HashMap<String, Handler>,
}

impl TaskRegistry {
    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::default()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Fail if any of `kinds` has no handler.
    pub fn require<S: AsRef<str>>(&self, kinds: &[S]) -> Result<()> {
        match kinds.iter().find(|k| !self.contains(k.as_ref())) {
            Some(missing) => Err(Error::UnknownTaskKind(missing.as_ref().to_string())),
            None => Ok(()),
        }
    }

    /// Run the handler for `request` and build its response.
    ///
    /// Handler errors and unknown kinds become error responses. Panics propagate.
    pub fn dispatch(&self, request: Request) -> Response {
        let Request {
            id,
            task_kind,
            payload,
            transfer,
            ..
        } = request;

        match self.handlers.get(&task_kind) {
            Some(handler) => match handler(payload, transfer) {
                Ok(value) => Response::result(id, value),
                Err(message) => Response::error(id, message),
            },
            None => Response::error(id, Error::UnknownTaskKind(task_kind).to_string()),
        }
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("TaskRegistry").field("kinds", &kinds).finish()
    }
}

#[derive(Default)]
pub struct TaskRegistryBuilder {
    handlers: HashMap<String, Handler>,
    duplicate: Option<String>,
}

impl fmt::Debug for TaskRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistryBuilder")
            .field("kinds", &self.handlers.len())
            .field("duplicate", &self.duplicate)
            .finish()
    }
}

impl TaskRegistryBuilder {
    /// Register an untyped handler working on raw JSON and transferred buffers.
    pub fn handler<F, E>(mut self, kind: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, Transfer) -> std::result::Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let kind = kind.into();
        let handler: Handler = Box::new(move |payload, transfer| {
            f(payload, transfer).map_err(|e| e.to_string())
        });

        if self.handlers.insert(kind.clone(), handler).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(kind);
        }
        self
    }

    /// Register a typed handler for `K`.
    pub fn register<K, F, E>(self, f: F) -> Self
    where
        K: TaskKind,
        F: Fn(K::Input) -> std::result::Result<K::Output, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.handler(K::NAME, move |payload: Value, _transfer: Transfer| {
            let input: K::Input = serde_json::from_value(payload)
                .map_err(|e| format!("invalid payload for {}: {}", K::NAME, e))?;
            let output = f(input).map_err(|e| e.to_string())?;
            serde_json::to_value(output)
                .map_err(|e| format!("unserializable result for {}: {}", K::NAME, e))
        })
    }

    pub fn build(self) -> Result<TaskRegistry> {
        // first duplicate wins the error message
        if let Some(kind) = self.duplicate {
            return Err(Error::DuplicateTaskKind(kind));
        }
        Ok(TaskRegistry {
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TaskId;
    use serde_json::json;

    struct Square;

    impl TaskKind for Square {
        const NAME: &'static str = "square";
        type Input = i64;
        type Output = i64;
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::builder()
            .register::<Square, _, String>(|n| Ok(n * n))
            .handler("fail", |_, _| Err::<Value, _>("always fails"))
            .handler("bytes", |_, transfer: Transfer| {
                Ok::<_, String>(json!(transfer.iter().map(Vec::len).sum::<usize>()))
            })
            .build()
            .unwrap()
    }

    fn request(kind: &str, payload: Value) -> Request {
        Request::new(TaskId::from("t1"), kind, payload)
    }

    #[test]
    fn test_typed_dispatch() {
        let response = registry().dispatch(request("square", json!(12)));
        assert_eq!(response, Response::result(TaskId::from("t1"), json!(144)));
    }

    #[test]
    fn test_handler_error_becomes_error_response() {
        let response = registry().dispatch(request("fail", Value::Null));
        assert_eq!(response, Response::error(TaskId::from("t1"), "always fails"));
    }

    #[test]
    fn test_invalid_payload() {
        match registry().dispatch(request("square", json!("twelve"))) {
            Response::Error { payload, .. } => assert!(payload.starts_with("invalid payload for square")),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind() {
        let response = registry().dispatch(request("sort", json!([2, 1])));
        assert_eq!(
            response,
            Response::error(TaskId::from("t1"), "unknown task kind: sort")
        );
    }

    #[test]
    fn test_transfer_reaches_handler() {
        let req = request("bytes", Value::Null).with_transfer(vec![vec![0; 4], vec![0; 6]]);
        assert_eq!(
            registry().dispatch(req),
            Response::result(TaskId::from("t1"), json!(10))
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let result = TaskRegistry::builder()
            .register::<Square, _, String>(|n| Ok(n))
            .handler("square", |v, _| Ok::<_, String>(v))
            .build();

        assert!(matches!(result, Err(Error::DuplicateTaskKind(k)) if k == "square"));
    }

    #[test]
    fn test_require() {
        let registry = registry();
        assert!(registry.require(&["square", "fail"]).is_ok());
        assert!(matches!(
            registry.require(&["square", "sort"]),
            Err(Error::UnknownTaskKind(k)) if k == "sort"
        ));
        assert_eq!(registry.len(), 3);
    }
}
