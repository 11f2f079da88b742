//! Text rendering for spreadsheet primitives: column letters, cell
//! references, and decimal numbers. This crate knows nothing about the
//! value tower or the interpreter; it only turns already-extracted
//! primitives into display strings.

mod column;
mod number;
mod cellref;

pub use column::{column_to_string, string_to_column, ColumnParseError};
pub use number::{format_decimal, RoundMode};
pub use cellref::{format_cell_ref, CellRefParts};
