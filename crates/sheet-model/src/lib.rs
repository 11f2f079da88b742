//! Cell/range addressing, the shared token shape, and the logging boundary
//! used by both the Forwards and Backwards lexers/parsers/evaluator. The
//! runtime value tower lives in `sheet-engine`, one layer up, since its
//! `Function` variant must hold an AST body — putting it here would create
//! a dependency cycle (`sheet-engine` already depends on this crate for
//! `CellRef`).

pub mod cellref;
pub mod logger;
pub mod token;

pub use cellref::{AxisRef, CellRange, CellRef, MAX_COL, MAX_ROW};
pub use logger::{LogLevel, Logger, SourceLocation};
pub use token::{Lexeme, Span, Token};
