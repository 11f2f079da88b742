//! A spreadsheet cell's stored state (`spec.md` §3 "Cell", §6 invariants).

use std::rc::Rc;

use crate::ast::Expression;
use crate::errors::EvaluationError;
use crate::value::Value;

/// Monotonically increasing counter advanced once per full recompute
/// request or per user-initiated evaluation (`spec.md` §3 "Generation").
/// A cell's cached value is only trustworthy when its `last_computed`
/// matches the generation the caller is recomputing at.
pub type Generation = u64;

/// `(sourceText, parsedExpression?, cachedValue?, inProgressFlag,
/// lastComputedGeneration, error?)` (`spec.md` §3). `cached` and `error`
/// are mutually exclusive: the last recompute either produced a value or
/// an error, never both.
#[derive(Debug, Clone)]
pub struct Cell {
    pub source_text: String,
    pub parsed: Option<Rc<Expression>>,
    pub cached: Option<Value>,
    pub error: Option<EvaluationError>,
    pub in_progress: bool,
    pub last_computed: Generation,
}

impl Cell {
    /// A cell holding unparsed source text only — `parsed` is filled in the
    /// first time the cell is recomputed (parse-once-and-cache, `spec.md`
    /// §1 "Spreadsheet cell expressions are parsed once and cached on the
    /// cell").
    pub fn unparsed(source_text: String) -> Self {
        Cell {
            source_text,
            parsed: None,
            cached: None,
            error: None,
            in_progress: false,
            last_computed: 0,
        }
    }

    pub fn with_parsed(source_text: String, parsed: Rc<Expression>) -> Self {
        Cell { source_text, parsed: Some(parsed), cached: None, error: None, in_progress: false, last_computed: 0 }
    }

    /// §6 invariant: `cachedValue.present` implies `lastComputedGeneration
    /// == currentGeneration`.
    pub fn is_fresh(&self, generation: Generation) -> bool {
        self.cached.is_some() && self.last_computed == generation
    }

    pub fn store_value(&mut self, value: Value, generation: Generation) {
        self.cached = Some(value);
        self.error = None;
        self.last_computed = generation;
    }

    pub fn store_error(&mut self, error: EvaluationError, generation: Generation) {
        self.cached = None;
        self.error = Some(error);
        self.last_computed = generation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_value_requires_matching_generation() {
        let mut cell = Cell::unparsed("1".into());
        cell.store_value(Value::Nil, 3);
        assert!(cell.is_fresh(3));
        assert!(!cell.is_fresh(4));
    }

    #[test]
    fn storing_an_error_clears_any_cached_value() {
        let mut cell = Cell::unparsed("1".into());
        cell.store_value(Value::Nil, 1);
        cell.store_error(EvaluationError::UserFatal("boom".into()), 2);
        assert!(cell.cached.is_none());
        assert!(cell.error.is_some());
    }
}
