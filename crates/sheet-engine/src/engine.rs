//! Dependency-driven spreadsheet recomputation (`spec.md` §4.7): the driver
//! that turns a `CellRef` dereference inside a Forwards expression into a
//! recursive, cycle-checked, generation-memoized evaluation of another cell.

use sheet_model::cellref::{AxisRef, CellRange, CellRef};

use crate::cell::Cell;
use crate::errors::{EvalResult, EvaluationError};
use crate::eval::{eval_expression, resolve_cell_range, CallingContext};
use crate::parser::ForwardsParser;
use crate::sheet::CellAddr;
use crate::symtab::SymbolTable;
use crate::value::Value;

fn addr_to_cell_ref(addr: CellAddr) -> CellRef {
    CellRef::new(AxisRef::absolute(addr.col), AxisRef::absolute(addr.row), None)
}

/// Parses `cell.source_text` the first time it's needed and caches the
/// result on the cell (`spec.md` §1 "parsed once and cached"). An empty
/// source text is not an error — a blank cell evaluates to `Nil`. Parsed
/// against `symbols` so a call to a global the host program declared
/// resolves to the same slot the running `CallingContext` already has.
fn ensure_parsed(cell: &mut Cell, symbols: &SymbolTable) -> EvalResult<()> {
    if cell.parsed.is_some() || cell.source_text.trim().is_empty() {
        return Ok(());
    }
    let (expr, errors) = ForwardsParser::new(&cell.source_text, "<cell>", symbols.clone()).parse_cell();
    if let Some(first) = errors.first() {
        return Err(EvaluationError::Domain(format!("parse error: {}", first.message)));
    }
    cell.parsed = Some(std::rc::Rc::new(expr));
    Ok(())
}

/// Recomputes the cell at `addr` at `ctx`'s current generation, following
/// the six-step algorithm in `spec.md` §4.7. A cell address with nothing
/// stored at it is not an error — it evaluates to `Nil`, matching
/// `ExpandRange`'s treatment of cells absent from storage.
pub fn recompute(addr: CellAddr, ctx: &mut CallingContext<'_>) -> EvalResult<Value> {
    let generation = ctx.forwards.as_ref().expect("recompute requires spreadsheet context").generation;
    let sheet = ctx.forwards.as_ref().expect("recompute requires spreadsheet context").sheet.clone();

    {
        let mut sheet = sheet.borrow_mut();
        let Some(cell) = sheet.get_mut(addr) else {
            return Ok(Value::Nil);
        };

        // Step 1: generation-fresh cache hit.
        if cell.is_fresh(generation) {
            return Ok(cell.cached.clone().expect("is_fresh implies cached is set"));
        }

        // Step 2: path-based cycle detection.
        if cell.in_progress {
            let path = forwards_state(ctx).cell_frames.iter().chain(std::iter::once(&addr)).map(|a| addr_to_cell_ref(*a)).collect();
            return Err(EvaluationError::CircularReference { path });
        }

        if let Err(e) = ensure_parsed(cell, &forwards_state(ctx).symbols) {
            cell.store_error(e.clone(), generation);
            return Err(e);
        }

        // Step 3: mark in-progress and push this cell's CellFrame.
        cell.in_progress = true;
    }
    forwards_state_mut(ctx).cell_frames.push(addr);
    let previous_cell = forwards_state(ctx).current_cell;
    forwards_state_mut(ctx).current_cell = addr;

    // Steps 4-5 happen inside `eval_expression` itself: every `CellReference`
    // it meets resolves against `ctx.forwards.current_cell` (just set above)
    // and recursively calls back into this function.
    let parsed = {
        let sheet = sheet.borrow();
        sheet.get(addr).and_then(|c| c.parsed.clone())
    };
    let result = match parsed {
        Some(expr) => eval_expression(&expr, ctx),
        None => Ok(Value::Nil), // blank source text
    };

    // Step 6: store outcome, clear in-progress, pop CellFrame — on every
    // exit path, including a Fatal/DebuggerAbort that unwinds past here.
    forwards_state_mut(ctx).current_cell = previous_cell;
    forwards_state_mut(ctx).cell_frames.pop();
    {
        let mut sheet = sheet.borrow_mut();
        let cell = sheet.get_mut(addr).expect("cell was present a moment ago");
        cell.in_progress = false;
        match &result {
            Ok(value) => cell.store_value(value.clone(), generation),
            Err(e) if !e.unwinds_to_driver() => cell.store_error(e.clone(), generation),
            Err(_) => {
                // Fatal/DebuggerAbort unwind straight to the top-level
                // driver; the cell keeps whatever it last held rather than
                // caching a transient abort as its value (`spec.md` §7).
            }
        }
    }
    result
}

fn forwards_state<'a, 'b>(ctx: &'a CallingContext<'b>) -> &'a crate::eval::ForwardsState {
    ctx.forwards.as_ref().expect("recompute requires spreadsheet context")
}

fn forwards_state_mut<'a, 'b>(ctx: &'a mut CallingContext<'b>) -> &'a mut crate::eval::ForwardsState {
    ctx.forwards.as_mut().expect("recompute requires spreadsheet context")
}

/// `ExpandRange` (`spec.md` §4.6, §4.7): a row-major array over the
/// resolved rectangle, recomputing every cell in it at the same generation.
/// Cells absent from storage contribute `Nil` rather than failing.
pub fn expand_range(range: &CellRange, ctx: &mut CallingContext<'_>) -> EvalResult<Value> {
    let (top_left, bottom_right) = resolve_cell_range(range, ctx);
    let mut values = Vec::new();
    for row in top_left.row..=bottom_right.row {
        for col in top_left.col..=bottom_right.col {
            values.push(recompute(CellAddr::new(col, row), ctx)?);
        }
    }
    Ok(Value::new_array(values))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use sheet_model::logger::NullLogger;

    use super::*;
    use crate::context::EngineConfig;
    use crate::eval::ForwardsState;
    use crate::sheet::Sheet;
    use crate::sparse::SparseSheet;
    use crate::symtab::SymbolTable;

    fn ctx_over<'a>(sheet: Rc<RefCell<SparseSheet>>, logger: &'a NullLogger) -> CallingContext<'a> {
        let mut ctx = CallingContext::new(logger, Rc::new(RefCell::new(crate::stdlib::build_global_values())), EngineConfig::default());
        let symbols = Rc::new(SymbolTable::with_builtins(crate::stdlib::builtin_names()));
        ctx.forwards = Some(ForwardsState { generation: 1, sheet, cell_frames: Vec::new(), current_cell: CellAddr::new(0, 0), symbols });
        ctx
    }

    #[test]
    fn blank_cell_evaluates_to_nil() {
        let sheet = Rc::new(RefCell::new(SparseSheet::new()));
        sheet.borrow_mut().put(CellAddr::new(0, 0), Cell::unparsed(String::new()));
        let logger = NullLogger;
        let mut ctx = ctx_over(sheet, &logger);
        let value = recompute(CellAddr::new(0, 0), &mut ctx).unwrap();
        assert!(matches!(value, Value::Nil));
    }

    #[test]
    fn missing_cell_evaluates_to_nil_without_error() {
        let sheet = Rc::new(RefCell::new(SparseSheet::new()));
        let logger = NullLogger;
        let mut ctx = ctx_over(sheet, &logger);
        let value = recompute(CellAddr::new(5, 5), &mut ctx).unwrap();
        assert!(matches!(value, Value::Nil));
    }

    #[test]
    fn direct_self_reference_is_circular() {
        let sheet = Rc::new(RefCell::new(SparseSheet::new()));
        sheet.borrow_mut().put(CellAddr::new(0, 0), Cell::unparsed("A1".to_string()));
        let logger = NullLogger;
        let mut ctx = ctx_over(sheet, &logger);
        let err = recompute(CellAddr::new(0, 0), &mut ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::CircularReference { .. }));
    }

    #[test]
    fn second_recompute_at_same_generation_is_memoized() {
        let sheet = Rc::new(RefCell::new(SparseSheet::new()));
        sheet.borrow_mut().put(CellAddr::new(0, 0), Cell::unparsed("1+1".to_string()));
        let logger = NullLogger;
        let mut ctx = ctx_over(sheet, &logger);
        let first = recompute(CellAddr::new(0, 0), &mut ctx).unwrap();
        let second = recompute(CellAddr::new(0, 0), &mut ctx).unwrap();
        assert_eq!(first.type_name(), second.type_name());
    }
}
