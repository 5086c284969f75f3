use std::time::Duration;

/// Hard memory ceiling for one isolate.
pub const DEFAULT_MEMORY_LIMIT: usize = 128 * 1024 * 1024;
/// Wall-clock budget for one evaluation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Engine stack limit. Kept below the 2 MiB stack of tokio blocking threads.
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 1024;

/// Limits applied to every invocation of a [`Sandbox`](crate::Sandbox).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    memory_limit: usize,
    timeout: Duration,
    max_stack_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
        }
    }
}

impl SandboxConfig {
    #[must_use]
    pub fn builder() -> SandboxConfigBuilder {
        SandboxConfigBuilder::default()
    }

    #[must_use]
    pub const fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn max_stack_size(&self) -> usize {
        self.max_stack_size
    }
}

#[derive(Debug, Default)]
pub struct SandboxConfigBuilder {
    config: SandboxConfig,
}

impl SandboxConfigBuilder {
    /// Memory ceiling in bytes. Zero is rejected when the isolate is created.
    #[must_use]
    pub const fn memory_limit(mut self, bytes: usize) -> Self {
        self.config.memory_limit = bytes;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_stack_size(mut self, bytes: usize) -> Self {
        self.config.max_stack_size = bytes;
        self
    }

    #[must_use]
    pub const fn build(self) -> SandboxConfig {
        self.config
    }
}
