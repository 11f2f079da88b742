//! Parse-time lexical scope resolution (`spec.md` §4.3). Every name use is
//! resolved here to a concrete `Expression::GlobalRead`/`ScopeRead` or
//! `Lvalue` with a fixed slot index — nothing is looked up by name at
//! evaluation time (`spec.md` §3 "the core performance decision").

use ahash::AHashMap;

use crate::ast::{Expression, Lvalue};
use crate::errors::{Position, SymbolError};

/// One function's (or the global program's) local name table, built up as
/// parameters are declared and as assignment-to-new-name is encountered.
#[derive(Debug, Default, Clone)]
struct FunctionScope {
    names: AHashMap<String, u32>,
    slot_count: u32,
}

impl FunctionScope {
    fn declare(&mut self, name: &str) -> u32 {
        if let Some(&slot) = self.names.get(name) {
            return slot;
        }
        let slot = self.slot_count;
        self.names.insert(name.to_string(), slot);
        self.slot_count += 1;
        slot
    }
}

/// Lexical scope stack used while parsing Backwards. Forwards never has
/// more than an implicit empty scope (cell expressions have no locals),
/// but shares this type so both grammars resolve globals identically.
#[derive(Clone)]
pub struct SymbolTable {
    functions: Vec<FunctionScope>,
    globals: AHashMap<String, u32>,
    global_count: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { functions: Vec::new(), globals: AHashMap::default(), global_count: 0 }
    }

    /// Pre-declares the standard library's names as globals, in the exact
    /// order the evaluator will use to build its initial global frame
    /// (`spec.md` §4.6 "registered into the global scope") — both sides
    /// must agree on slot assignment since names are resolved once, at
    /// parse time, and never looked up again.
    pub fn with_builtins<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::new();
        for name in names {
            table.globals.insert(name.to_string(), table.global_count);
            table.global_count += 1;
        }
        table
    }

    pub fn global_slot_count(&self) -> usize {
        self.global_count as usize
    }

    pub fn enter_function(&mut self, params: &[String], position: Position) -> Result<(), SymbolError> {
        let mut scope = FunctionScope::default();
        for p in params {
            if scope.names.contains_key(p) {
                return Err(SymbolError { message: format!("duplicate parameter name '{p}'"), position });
            }
            scope.declare(p);
        }
        self.functions.push(scope);
        Ok(())
    }

    /// Pops the current function scope, returning how many slots its frame
    /// needs at runtime.
    pub fn exit_function(&mut self) -> usize {
        self.functions.pop().expect("exit_function without matching enter_function").slot_count as usize
    }

    /// Reserves a fresh global slot for a name that must not already exist
    /// (top-level `function` declarations; `spec.md` §4.2 "enforces unique
    /// names at declaration").
    pub fn declare_unique_global(&mut self, name: &str, position: Position) -> Result<usize, SymbolError> {
        if self.globals.contains_key(name) {
            return Err(SymbolError { message: format!("'{name}' is already declared"), position });
        }
        let slot = self.global_count;
        self.globals.insert(name.to_string(), slot);
        self.global_count += 1;
        Ok(slot as usize)
    }

    /// Resolves a read of `name`: current function scope, then each
    /// enclosing function scope outward, then globals. Undeclared names
    /// are a hard error on read (only *assignment* auto-declares).
    pub fn resolve_read(&self, name: &str, position: Position) -> Result<Expression, SymbolError> {
        for (depth, scope) in self.functions.iter().rev().enumerate() {
            if let Some(&slot) = scope.names.get(name) {
                return Ok(Expression::ScopeRead { depth: depth as u32, slot });
            }
        }
        if let Some(&slot) = self.globals.get(name) {
            return Ok(Expression::GlobalRead(slot as usize));
        }
        Err(SymbolError { message: format!("undefined name '{name}'"), position })
    }

    /// Resolves an assignment target: writes to an existing local/captured
    /// slot or global if one exists, otherwise declares a fresh local (or,
    /// at top level with no enclosing function, a fresh global) — `spec.md`
    /// §4.3 "the parser increments a slot counter for each local introduced
    /// by assignment-to-new-name".
    pub fn resolve_write(&mut self, name: &str) -> Lvalue {
        for (depth, scope) in self.functions.iter().rev().enumerate() {
            if let Some(&slot) = scope.names.get(name) {
                return Lvalue::Local { depth: depth as u32, slot };
            }
        }
        if let Some(&slot) = self.globals.get(name) {
            return Lvalue::Global(slot as usize);
        }
        if let Some(scope) = self.functions.last_mut() {
            let slot = scope.declare(name);
            Lvalue::Local { depth: 0, slot }
        } else {
            let slot = self.global_count;
            self.globals.insert(name.to_string(), slot);
            self.global_count += 1;
            Lvalue::Global(slot as usize)
        }
    }

    pub fn in_function(&self) -> bool {
        !self.functions.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position { line: 1, column: 1 }
    }

    #[test]
    fn top_level_assignment_declares_a_global() {
        let mut table = SymbolTable::new();
        let lv = table.resolve_write("x");
        assert_eq!(lv, Lvalue::Global(0));
        assert!(table.resolve_read("x", pos()).is_ok());
    }

    #[test]
    fn reading_undeclared_name_is_a_symbol_error() {
        let table = SymbolTable::new();
        assert!(table.resolve_read("nope", pos()).is_err());
    }

    #[test]
    fn inner_function_captures_outer_param_at_depth_one() {
        let mut table = SymbolTable::new();
        table.enter_function(&["x".to_string()], pos()).unwrap();
        table.enter_function(&[], pos()).unwrap();
        let read = table.resolve_read("x", pos()).unwrap();
        assert!(matches!(read, Expression::ScopeRead { depth: 1, slot: 0 }));
        table.exit_function();
        table.exit_function();
    }

    #[test]
    fn duplicate_parameter_name_is_rejected() {
        let mut table = SymbolTable::new();
        let err = table.enter_function(&["a".to_string(), "a".to_string()], pos());
        assert!(err.is_err());
    }
}
