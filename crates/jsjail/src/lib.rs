mod internal;

pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod sandbox;
pub mod source;

/// `tracing` target of everything a script writes through `console.log`.
pub const TRACE_TARGET_SCRIPT: &str = "jsjail::script";

pub use codec::{Channel, InvocationResult, Output, ScriptValue};
pub use config::{SandboxConfig, SandboxConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use host::{LogSink, NoopLogSink, TracingLogSink};
pub use sandbox::{Phase, Sandbox};
