//! Parse and runtime errors.
//!
//! Control flow (`return`/`break`/`continue`) travels as error variants and
//! is caught at the enclosing call or loop boundary; anything that escapes
//! to the host is a real fault, an interrupt, or an explicit termination.

use crate::modules::ModuleError;
use crate::value::Value;
use smol_str::SmolStr;
use thiserror::Error;

/// A syntax error with the position of the first offending token.
#[derive(Debug, Clone, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    /// 1-based line of the offending token.
    pub line: u32,
    /// 1-based column of the offending token.
    pub column: u32,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("undefined name `{0}`")]
    UndefinedName(SmolStr),

    #[error("module `{module}` has no member `{name}`")]
    UndefinedMember { module: SmolStr, name: SmolStr },

    #[error("`{0}` is not callable")]
    NotCallable(&'static str),

    #[error("{name}() takes {expected} argument(s), got {got}")]
    ArityMismatch { name: SmolStr, expected: usize, got: usize },

    #[error("type error: expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: &'static str },

    #[error("unsupported operand types for `{op}`: {lhs} and {rhs}")]
    InvalidOperands { op: &'static str, lhs: &'static str, rhs: &'static str },

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("call depth exceeded the limit of {0}")]
    RecursionLimit(usize),

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("{0}")]
    Builtin(String),

    #[error("interrupted")]
    Interrupted,

    /// Explicit termination requested by the script; not a fault.
    #[error("explicit termination with code {0}")]
    Exit(i32),

    // Control flow, caught before reaching callers of the interpreter.
    #[error("internal: uncaught return")]
    Return(Value),
    #[error("internal: uncaught break")]
    Break,
    #[error("internal: uncaught continue")]
    Continue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ParseError { message: "expected `;`".into(), line: 3, column: 7 };
        assert_eq!(err.to_string(), "line 3, column 7: expected `;`");
    }

    #[test]
    fn arity_error_display() {
        let err = RuntimeError::ArityMismatch { name: "f".into(), expected: 2, got: 1 };
        assert_eq!(err.to_string(), "f() takes 2 argument(s), got 1");
    }

    #[test]
    fn exit_is_not_phrased_as_a_fault() {
        let err = RuntimeError::Exit(7);
        assert!(err.to_string().contains("explicit termination"));
    }
}
