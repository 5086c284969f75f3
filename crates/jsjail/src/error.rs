use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Message of the `InternalError` QuickJS throws when an allocation would
/// cross the runtime memory limit.
const OUT_OF_MEMORY: &str = "out of memory";

/// Class of that error. User code throwing a plain `Error` with the same
/// message stays a script fault.
const INTERNAL_ERROR: &str = "InternalError";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Resource,
    Binding,
    Script,
    ResourceExceeded,
    Timeout,
    Serialization,
    NoScript,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Binding => "binding",
            Self::Script => "script",
            Self::ResourceExceeded => "resource_exceeded",
            Self::Timeout => "timeout",
            Self::Serialization => "serialization",
            Self::NoScript => "no_script",
            Self::Internal => "internal",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The isolate could not be allocated. Nothing was executed.
    #[error("failed to create isolate: {0}")]
    Resource(String),

    /// A capability could not be installed into the jail. Nothing was
    /// executed.
    #[error("failed to install binding: {0}")]
    Binding(String),

    /// The script threw.
    #[error("{message}")]
    Script {
        message: String,
        stack: Option<String>,
    },

    /// The script tried to allocate past the isolate memory ceiling.
    #[error("out of memory: script exceeded the {limit} byte memory limit")]
    ResourceExceeded { limit: usize },

    #[error("timeout: script exceeded {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The completion value has no JSON representation.
    #[error("result is not serializable: {0}")]
    Serialization(String),

    #[error("no script provided")]
    NoScript,

    /// The evaluation worker panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Resource(_) => ErrorKind::Resource,
            Self::Binding(_) => ErrorKind::Binding,
            Self::Script { .. } => ErrorKind::Script,
            Self::ResourceExceeded { .. } => ErrorKind::ResourceExceeded,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::NoScript => ErrorKind::NoScript,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Take the pending exception out of `ctx` and turn it into a script
    /// fault. Thrown non-`Error` values use their string form. The engine's
    /// own out-of-memory error becomes [`Error::ResourceExceeded`].
    pub(crate) fn from_js_catch(ctx: &rquickjs::Ctx<'_>, memory_limit: usize) -> Self {
        let caught = ctx.catch();
        let Some(exc) = caught.as_exception() else {
            return Self::script(describe_thrown(&caught), None);
        };
        let message = exc.message().unwrap_or_default();
        let name: Option<String> = exc.get("name").ok();
        if message == OUT_OF_MEMORY && name.as_deref() == Some(INTERNAL_ERROR) {
            return Self::ResourceExceeded {
                limit: memory_limit,
            };
        }
        Self::script(message, exc.stack())
    }

    fn script(message: String, stack: Option<String>) -> Self {
        let message = if message.is_empty() {
            "uncaught exception".to_string()
        } else {
            message
        };
        Self::Script { message, stack }
    }
}

fn describe_thrown(value: &rquickjs::Value<'_>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    value
        .get::<rquickjs::convert::Coerced<String>>()
        .map_or_else(|_| value.type_of().as_str().to_string(), |s| s.0)
}
