//! Recursive-descent parsing for both grammars (`spec.md` §4.2).

pub mod backwards;
pub mod forwards;

pub use backwards::BackwardsParser;
pub use forwards::ForwardsParser;
