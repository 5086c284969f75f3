//! Single-shot script evaluation.
//!
//! Every call to [`Sandbox::evaluate`] walks one invocation through
//! `Created → Bound → Running → {Completed | Faulted | TimedOut} → TornDown`:
//! a fresh isolate is allocated, the jail and `console.log` are installed,
//! the source runs under the configured deadline, the completion value is
//! copied out, and the isolate is released. Nothing survives between
//! invocations.

use std::{fmt, sync::Arc, time::Duration};

use rquickjs::{Ctx, Promise, Value, context::EvalOptions};
use tracing::debug;

use crate::{
    codec::{self, InvocationResult, ScriptValue},
    config::SandboxConfig,
    error::{Error, Result},
    host::{LogSink, TracingLogSink},
    internal::{
        bridge,
        isolate::{Interrupt, Isolate, IsolateState},
    },
};

/// Time a timed-out worker gets to unwind and release its isolate before
/// the caller stops waiting for it.
const TEARDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Bound,
    Running,
    Completed,
    Faulted,
    TimedOut,
    TornDown,
}

impl Phase {
    /// `TornDown` is reachable from every other phase and nothing leaves it.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::TornDown, _) => false,
            (_, Self::TornDown)
            | (Self::Created, Self::Bound)
            | (Self::Bound, Self::Running)
            | (Self::Running, Self::Completed | Self::Faulted | Self::TimedOut) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    const fn new() -> Self {
        Self {
            phase: Phase::Created,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid phase transition {:?} -> {next:?}",
            self.phase
        );
        debug!(from = ?self.phase, to = ?next, "invocation phase");
        self.phase = next;
    }

    fn settle(&mut self, result: &Result<ScriptValue>) {
        if self.phase != Phase::Running {
            return;
        }
        let next = match result {
            Ok(_) => Phase::Completed,
            Err(Error::Timeout(_)) => Phase::TimedOut,
            Err(_) => Phase::Faulted,
        };
        self.advance(next);
    }
}

/// Evaluates untrusted JavaScript, one isolate per call.
///
/// Cloning is cheap; clones share the configuration and the log sink only.
#[derive(Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sandbox")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

impl Sandbox {
    /// Script logs go to `tracing` until another sink is set with
    /// [`Sandbox::with_log_sink`].
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            sink: TracingLogSink::shared(),
        }
    }

    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Evaluate `source` on a blocking worker and wait for it without
    /// blocking the async runtime.
    ///
    /// Resolves no later than the configured timeout plus a short teardown
    /// grace period. Must be called from within a tokio runtime.
    ///
    /// A few engine paths (regular expression backtracking among them) never
    /// poll the interrupt. A script stuck in one keeps its blocking worker
    /// and isolate after this returns [`Error::Timeout`], until it finishes
    /// on its own. Shutting the tokio runtime down waits for that worker, so
    /// short-lived hosts should use `Runtime::shutdown_background`.
    pub async fn evaluate(&self, source: impl Into<String>) -> InvocationResult {
        let source = source.into();
        if source.trim().is_empty() {
            return InvocationResult::Failure(Error::NoScript);
        }

        let timeout = self.config.timeout();
        let interrupt = Arc::new(Interrupt::default());
        let mut worker = {
            let config = self.config;
            let sink = Arc::clone(&self.sink);
            let interrupt = Arc::clone(&interrupt);
            tokio::task::spawn_blocking(move || invoke(&config, &source, sink, &interrupt))
        };

        match tokio::time::timeout(timeout, &mut worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => InvocationResult::Failure(Error::Internal(err.to_string())),
            Err(_) => {
                interrupt.abort();
                if tokio::time::timeout(TEARDOWN_GRACE, worker).await.is_err() {
                    debug!(
                        timeout_ms = timeout.as_millis(),
                        "evaluation worker did not stop after abort, detaching"
                    );
                }
                InvocationResult::Failure(Error::Timeout(timeout))
            }
        }
    }

    /// Evaluate `source` on the calling thread. The deadline is enforced by
    /// the engine alone.
    #[must_use]
    pub fn evaluate_blocking(&self, source: &str) -> InvocationResult {
        if source.trim().is_empty() {
            return InvocationResult::Failure(Error::NoScript);
        }
        invoke(
            &self.config,
            source,
            Arc::clone(&self.sink),
            &Arc::new(Interrupt::default()),
        )
    }
}

fn invoke(
    config: &SandboxConfig,
    source: &str,
    sink: Arc<dyn LogSink>,
    interrupt: &Arc<Interrupt>,
) -> InvocationResult {
    let mut phase = PhaseTracker::new();
    let result = Isolate::create(config, Arc::clone(interrupt)).and_then(|mut isolate| {
        let result = run(&mut isolate, &mut phase, config, source, sink, interrupt);
        phase.settle(&result);
        isolate.destroy();
        result
    });
    phase.advance(Phase::TornDown);

    match &result {
        Ok(_) => debug!("invocation completed"),
        Err(Error::Script {
            message,
            stack: Some(stack),
        }) => debug!(%message, %stack, "script threw"),
        Err(err) => debug!(kind = err.kind().as_str(), %err, "invocation failed"),
    }
    result.into()
}

fn run(
    isolate: &mut Isolate,
    phase: &mut PhaseTracker,
    config: &SandboxConfig,
    source: &str,
    sink: Arc<dyn LogSink>,
    interrupt: &Interrupt,
) -> Result<ScriptValue> {
    let timeout = config.timeout();
    let context = isolate.context()?;
    debug_assert_eq!(isolate.state(), IsolateState::Active);

    context.with(|ctx| {
        bridge::install(&ctx, sink)?;
        phase.advance(Phase::Bound);

        interrupt.arm(timeout);
        phase.advance(Phase::Running);
        let outcome = evaluate(&ctx, source, interrupt, config);

        // Once the engine was told to stop, whatever came back is discarded.
        if interrupt.fired() {
            return Err(Error::Timeout(timeout));
        }
        outcome
    })
}

fn evaluate(
    ctx: &Ctx<'_>,
    source: &str,
    interrupt: &Interrupt,
    config: &SandboxConfig,
) -> Result<ScriptValue> {
    let mut options = EvalOptions::default();
    options.strict = false;

    let value: Value<'_> = ctx
        .eval_with_options(source, options)
        .map_err(|e| fault(ctx, e, config))?;
    let value = if let Some(promise) = value.as_promise().cloned() {
        settle(ctx, &promise, interrupt, config)?
    } else {
        value
    };
    codec::capture(value)
}

/// Run queued jobs until `promise` settles.
fn settle<'js>(
    ctx: &Ctx<'js>,
    promise: &Promise<'js>,
    interrupt: &Interrupt,
    config: &SandboxConfig,
) -> Result<Value<'js>> {
    loop {
        if let Some(result) = promise.result::<Value<'js>>() {
            return result.map_err(|e| fault(ctx, e, config));
        }
        if interrupt.should_interrupt() {
            return Err(Error::Timeout(config.timeout()));
        }
        if !ctx.execute_pending_job() {
            return Err(Error::Script {
                message: "promise never settled".to_string(),
                stack: None,
            });
        }
    }
}

fn fault(ctx: &Ctx<'_>, error: rquickjs::Error, config: &SandboxConfig) -> Error {
    match error {
        rquickjs::Error::Exception => Error::from_js_catch(ctx, config.memory_limit()),
        rquickjs::Error::Allocation => Error::ResourceExceeded {
            limit: config.memory_limit(),
        },
        other => Error::Script {
            message: other.to_string(),
            stack: None,
        },
    }
}
