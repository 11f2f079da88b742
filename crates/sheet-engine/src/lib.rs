//! Lexer, parser, evaluator, and spreadsheet recomputation core for the
//! Forwards/Backwards two-language system (`spec.md`). `sheet-model` owns
//! addressing and the logging boundary; `sheet-format` owns text rendering;
//! this crate owns everything in between: tokens, grammars, the symbol
//! table, the runtime value tower, the tree-walking evaluator, the standard
//! library, and the sheet storage/recomputation driver.

pub mod ast;
pub mod cell;
pub mod context;
pub mod debugger;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod input;
pub mod lexer;
pub mod parser;
pub mod sheet;
pub mod sparse;
pub mod std_logger;
pub mod stdlib;
pub mod symtab;
pub mod value;

pub use cell::{Cell, Generation};
pub use context::EngineConfig;
pub use engine::{expand_range, recompute};
pub use errors::{EvalResult, EvaluationError, LexError, ParseError, Position, SymbolError};
pub use eval::{CallingContext, Flow, ForwardsState};
pub use sheet::{CellAddr, Sheet};
pub use sparse::SparseSheet;
pub use std_logger::StdLogger;
pub use symtab::SymbolTable;
pub use value::{DictKey, FunctionValue, NativeArity, Number, Value};
