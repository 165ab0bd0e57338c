//! Centralised error hierarchy for the **betalox** interpreter.
//!
//! Every subsystem (scanner, parser, resolver, evaluator, CLI) converts its
//! failure modes into one of the variants defined here, enabling a uniform
//! `Result<T>` alias throughout the crate and ergonomic inter-operation with
//! `anyhow` at the binary boundary.
//!
//! Runtime failures additionally carry a [`RuntimeErrorKind`] so callers and
//! tests can distinguish failure classes (an undefined name versus a declared
//! but never assigned one, a type mismatch versus a bad arity, ...) without
//! matching on message text.
//!
//! The module **does not** print diagnostics itself.

use log::info;
use thiserror::Error;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error: {message}")]
    Parse { message: String, line: usize },

    /// Static-analysis failure reported by the resolver.
    #[error("[line {line}] Error: {message}")]
    Resolve { message: String, line: usize },

    /// Runtime evaluation error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", line, message);

        LoxError::Parse { message, line }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        LoxError::Resolve { message, line }
    }
}

/// Machine-readable classification of runtime failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No scope in the chain defines the name.
    UndefinedVariable,

    /// The name is declared but its slot still holds the unassigned sentinel.
    UnboundVariable,

    /// Operand type does not fit the operator.
    TypeMismatch,

    DivisionByZero,

    /// Attempt to call a value that is neither function, class, nor method.
    NotCallable,

    /// Call-site argument count disagrees with the callee's arity.
    ArityMismatch,

    /// Property access on a value without properties.
    NotAnInstance,

    UndefinedProperty,

    /// `<` clause evaluated to something that is not a class.
    InvalidSuperclass,

    /// Interpreter invariant violation, e.g. a control signal escaping its
    /// handler. Indicates a resolver defect, not a user mistake.
    Internal,
}

/// A runtime evaluation failure: kind, message, and the source line of the
/// offending token.
#[derive(Debug, Error)]
#[error("[line {line}] Runtime error: {message}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub line: usize,
}

impl RuntimeError {
    pub fn new<S: Into<String>>(kind: RuntimeErrorKind, line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: kind={:?}, line={}, msg={}",
            kind, line, message
        );

        RuntimeError {
            kind,
            message,
            line,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
