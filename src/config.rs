use crate::error::{Error, Result};

const FALLBACK_POOL_SIZE: usize = 4;
const MAX_POOL_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub pool_size: Option<usize>,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    /// Task kinds every worker must be able to serve, checked when a worker starts.
    pub required_kinds: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: None,
            thread_name_prefix: "thready-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            required_kinds: Vec::new(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.pool_size {
            if n == 0 {
                return Err(Error::config("pool_size must be > 0"));
            }
            if n > MAX_POOL_SIZE {
                return Err(Error::config("pool_size too large (max 1024)"));
            }
        }

        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        if let Some(size) = self.stack_size {
            if size == 0 {
                return Err(Error::config("stack_size must be > 0"));
            }
        }

        Ok(())
    }

    /// Number of workers the pool keeps alive.
    pub fn worker_count(&self) -> usize {
        self.pool_size.unwrap_or_else(|| match num_cpus::get() {
            0 => FALLBACK_POOL_SIZE,
            n => n.min(MAX_POOL_SIZE),
        })
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn pool_size(mut self, n: usize) -> Self {
        self.config.pool_size = Some(n);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn require_kind<S: Into<String>>(mut self, kind: S) -> Self {
        self.config.required_kinds.push(kind.into());
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
