//! Lexing (`spec.md` §4.1): one module per grammar, since Forwards adds
//! cell-reference recognition and drops comments while Backwards is the
//! reverse, but both share `shared`'s scanning primitives.

pub mod backwards;
pub mod forwards;
mod shared;

pub use backwards::{BackwardsLexemeKind, BackwardsLexer, BackwardsToken, Keyword};
pub use forwards::{CellRefLiteral, ForwardsLexemeKind, ForwardsLexer, ForwardsToken};
pub use shared::Punct;
