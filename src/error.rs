// Error taxonomy and the scope-terminator control-flow signal.
//
// Soft errors (Syntax, SignatureRegistration, Dispatch, ArgumentShape,
// UnknownVariable) never escape `eval` as `Err` -- they are resolved at the
// point of detection via `Scope::report_error`, which either substitutes
// text (a handler is installed) or panics (none is). Only `ScopeTerminator`
// and `HostRaised` are meant to travel through `eval`'s `Result` as a real
// `Err`: both explicitly bypass the handler chain until something catches
// them (a loop-like builtin, or `safe_eval` at the top).

use std::fmt;

use crate::value::Value;

/// A typed unwind signal produced by a host function to request an early
/// exit from an enclosing loop-like construct (`break`, `continue`, or any
/// host-defined kind). Caught by a loop-like builtin that recognizes `kind`,
/// or by `safe_eval` if it escapes all the way to the top.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlFlow {
    pub kind: String,
    pub value: Value,
}

impl ControlFlow {
    pub fn new(kind: impl Into<String>, value: Value) -> ControlFlow {
        ControlFlow { kind: kind.into(), value }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Malformed string escape, unterminated string, missing closing
    /// delimiter in strict mode, stray trailing tokens after a top-level
    /// call parse.
    Syntax(String),
    /// Empty signature, non-string/empty name fragment, non-string/empty
    /// parameter token, infix-first-parameter carrying a modifier.
    SignatureRegistration(String),
    /// No candidate function, or more than one candidate (ambiguity).
    Dispatch(String),
    /// Wrong arity (exact, minimum, or range), wrong type for argument N.
    ArgumentShape(String),
    /// A variable reference could not be resolved after the unknown-variable
    /// handler chain ran.
    UnknownVariable(String),
    /// A scope-terminator unwound past every loop-like construct that might
    /// have caught it.
    ScopeControlFlowEscaped(String),
    /// A scope-terminator is currently in flight, looking for a loop-like
    /// builtin to catch it. Not itself user-visible; `safe_eval` turns a
    /// stray one into `ScopeControlFlowEscaped`.
    ScopeTerminator(ControlFlow),
    /// Any other error a host function chooses to report explicitly,
    /// bypassing the handler chain (it propagates as-is rather than being
    /// offered to `report_error`).
    HostRaised(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(msg) => write!(f, "{msg}"),
            Error::SignatureRegistration(msg) => write!(f, "{msg}"),
            Error::Dispatch(msg) => write!(f, "{msg}"),
            Error::ArgumentShape(msg) => write!(f, "{msg}"),
            Error::UnknownVariable(msg) => write!(f, "{msg}"),
            Error::ScopeControlFlowEscaped(msg) => write!(f, "{msg}"),
            Error::ScopeTerminator(cf) => write!(f, "'{}' not in loop", cf.kind),
            Error::HostRaised(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
