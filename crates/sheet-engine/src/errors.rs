//! The closed error taxonomy from `spec.md` §7.

use sheet_model::cellref::CellRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// A malformed token (`spec.md` §7 `LexError`). The lexer never returns
/// this directly — it emits an `Error` token carrying the message and keeps
/// going, per §4.1; this type is what that token's payload is built from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{position:?}: lex error: {message}")]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

/// Unexpected token or unbalanced construct, collected (not propagated) by
/// the panic-mode recovery in both parsers (`spec.md` §4.2, §7).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{position:?}: parse error: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// Undefined name, redefined name, or wrong arity, raised at parse time by
/// the symbol table (`spec.md` §4.3, §7).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{position:?}: symbol error: {message}")]
pub struct SymbolError {
    pub message: String,
    pub position: Position,
}

/// Runtime evaluation failures (`spec.md` §7). Parse-phase errors are
/// recovered locally and never become one of these; these are the only
/// errors that unwind through the evaluator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluationError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("domain error: {0}")]
    Domain(String),
    #[error("undefined name: {0}")]
    Symbol(String),
    #[error("circular reference")]
    CircularReference { path: Vec<CellRef> },
    #[error("fatal: {0}")]
    UserFatal(String),
    #[error("debugger abort requested")]
    DebuggerAbort,
}

impl EvaluationError {
    pub fn kind_name(&self) -> &'static str {
        match self {
            EvaluationError::TypeMismatch(_) => "TypeMismatch",
            EvaluationError::Domain(_) => "DomainError",
            EvaluationError::Symbol(_) => "SymbolError",
            EvaluationError::CircularReference { .. } => "CircularReference",
            EvaluationError::UserFatal(_) => "UserFatal",
            EvaluationError::DebuggerAbort => "DebuggerAbort",
        }
    }

    /// Whether this error unwinds all the way to the top-level driver
    /// instead of being caught by the cell that triggered it (`spec.md`
    /// §7 propagation policy).
    pub fn unwinds_to_driver(&self) -> bool {
        matches!(self, EvaluationError::UserFatal(_) | EvaluationError::DebuggerAbort)
    }
}

pub type EvalResult<T> = Result<T, EvaluationError>;
