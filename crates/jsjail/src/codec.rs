//! Conversion of script results into the single output line of an
//! invocation.
//!
//! A success is the compact JSON rendering of the completion value on
//! stdout (`undefined` when the script produced no value). A failure is
//! `{"error":"<message>"}` on stderr with a non-zero exit status.

use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    internal::serde::js_to_json,
};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

const UNDEFINED: &str = "undefined";

/// Host-side copy of a script's completion value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    /// The script produced no value.
    Undefined,
    Json(serde_json::Value),
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str(UNDEFINED),
            Self::Json(value) => write!(f, "{value}"),
        }
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(ScriptValue),
    Failure(Error),
}

impl InvocationResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    /// # Errors
    /// Returns the captured failure.
    pub fn into_result(self) -> Result<ScriptValue> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(err) => Err(err),
        }
    }
}

impl From<Result<ScriptValue>> for InvocationResult {
    fn from(value: Result<ScriptValue>) -> Self {
        match value {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// Rendered invocation result: one line for one channel plus the process
/// exit status that goes with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub channel: Channel,
    pub line: String,
    pub exit_code: u8,
}

impl Output {
    /// Write the line, newline-terminated, to the channel it belongs to.
    ///
    /// # Errors
    /// Returns an error if the write or flush fails.
    pub fn write_to(&self, stdout: &mut impl io::Write, stderr: &mut impl io::Write) -> io::Result<()> {
        let out: &mut dyn io::Write = match self.channel {
            Channel::Stdout => stdout,
            Channel::Stderr => stderr,
        };
        writeln!(out, "{}", self.line)?;
        out.flush()
    }
}

#[derive(Serialize, Deserialize)]
struct ErrorLine {
    error: String,
}

/// Copy a completion value out of the engine.
///
/// Must run while the value's context is alive.
///
/// # Errors
/// Returns [`Error::Serialization`] for functions, symbols, `BigInt`s and
/// structures nested too deeply (including cycles).
pub fn capture(value: rquickjs::Value<'_>) -> Result<ScriptValue> {
    if value.is_undefined() {
        return Ok(ScriptValue::Undefined);
    }
    js_to_json(value)
        .map(ScriptValue::Json)
        .map_err(Error::Serialization)
}

#[must_use]
pub fn encode(result: &InvocationResult) -> Output {
    match result {
        InvocationResult::Success(value) => Output {
            channel: Channel::Stdout,
            line: value.to_string(),
            exit_code: EXIT_SUCCESS,
        },
        InvocationResult::Failure(err) => Output {
            channel: Channel::Stderr,
            line: encode_error(&err.to_string()),
            exit_code: EXIT_FAILURE,
        },
    }
}

fn encode_error(message: &str) -> String {
    let line = ErrorLine {
        error: message.to_string(),
    };
    // A struct with one string field always serializes.
    serde_json::to_string(&line).unwrap_or_else(|_| format!("{{\"error\":{message:?}}}"))
}

/// Parse a success line back into a value.
///
/// # Errors
/// Returns [`Error::Serialization`] if the line is not valid JSON.
pub fn decode_success(line: &str) -> Result<ScriptValue> {
    let line = line.trim_end();
    if line == UNDEFINED {
        return Ok(ScriptValue::Undefined);
    }
    serde_json::from_str(line)
        .map(ScriptValue::Json)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Extract the message from a failure line.
///
/// # Errors
/// Returns [`Error::Serialization`] if the line is not an error object.
pub fn decode_failure(line: &str) -> Result<String> {
    serde_json::from_str::<ErrorLine>(line.trim_end())
        .map(|line| line.error)
        .map_err(|e| Error::Serialization(e.to_string()))
}
