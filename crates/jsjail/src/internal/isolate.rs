use std::{
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use rquickjs::{Context, Runtime};
use tracing::debug;

use crate::{
    config::SandboxConfig,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolateState {
    Created,
    Active,
    TornDown,
}

/// Abort signal shared by the engine interrupt handler and whoever waits on
/// the evaluation.
#[derive(Debug, Default)]
pub struct Interrupt {
    deadline: OnceLock<Instant>,
    abort: AtomicBool,
    fired: AtomicBool,
}

impl Interrupt {
    /// Start the wall clock. Only the first call has an effect.
    pub fn arm(&self, timeout: Duration) {
        let _ = self.deadline.set(Instant::now() + timeout);
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Whether the engine has been told to stop the script.
    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Polled by the engine while the script runs. Once this returns `true`
    /// the engine raises an uncatchable exception.
    pub fn should_interrupt(&self) -> bool {
        if self.fired() {
            return true;
        }
        let expired = self.abort.load(Ordering::Acquire)
            || self
                .deadline
                .get()
                .is_some_and(|deadline| Instant::now() >= *deadline);
        if expired {
            self.fired.store(true, Ordering::Release);
        }
        expired
    }
}

/// One QuickJS runtime, owned by exactly one invocation.
///
/// The runtime is released by [`Isolate::destroy`] or, on any other exit
/// path, by `Drop`. Contexts created from it must be dropped first.
pub struct Isolate {
    runtime: Option<Runtime>,
    memory_limit: usize,
    state: IsolateState,
}

impl Isolate {
    pub fn create(config: &SandboxConfig, interrupt: Arc<Interrupt>) -> Result<Self> {
        let memory_limit = config.memory_limit();
        if memory_limit == 0 {
            return Err(Error::Resource(
                "memory limit must be greater than zero".to_string(),
            ));
        }

        let runtime = Runtime::new().map_err(|e| Error::Resource(e.to_string()))?;
        runtime.set_memory_limit(memory_limit);
        runtime.set_max_stack_size(config.max_stack_size());
        runtime.set_interrupt_handler(Some(Box::new(move || interrupt.should_interrupt())));

        debug!(memory_limit, "isolate created");
        Ok(Self {
            runtime: Some(runtime),
            memory_limit,
            state: IsolateState::Created,
        })
    }

    pub const fn state(&self) -> IsolateState {
        self.state
    }

    /// Create the single global context of this isolate.
    pub fn context(&mut self) -> Result<Context> {
        if self.state != IsolateState::Created {
            return Err(Error::Binding(format!(
                "isolate is {:?}, no new context can be created",
                self.state
            )));
        }
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::Binding("isolate runtime already released".to_string()))?;
        let context = Context::full(runtime).map_err(|e| Error::Resource(e.to_string()))?;
        self.state = IsolateState::Active;
        Ok(context)
    }

    /// Release the runtime and everything allocated in it. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let usage = runtime.memory_usage();
            runtime.set_interrupt_handler(None);
            drop(runtime);
            debug!(
                memory_limit = self.memory_limit,
                malloc_size = usage.malloc_size,
                "isolate torn down"
            );
        }
        self.state = IsolateState::TornDown;
    }
}

impl Drop for Isolate {
    fn drop(&mut self) {
        self.destroy();
    }
}
