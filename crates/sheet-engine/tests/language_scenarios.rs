//! End-to-end scenarios exercising both grammars through the public crate
//! API, grounded in `spec.md` §8's worked examples: cross-cell recomputation
//! with cycle detection, recursive Backwards functions, closures that
//! outlive their defining call, short-circuit evaluation, and debugger
//! context isolation.

use std::cell::RefCell;
use std::rc::Rc;

use sheet_model::cellref::{AxisRef, CellRange, CellRef};
use sheet_model::logger::NullLogger;

use sheet_engine::{
    expand_range, recompute, CallingContext, Cell, CellAddr, EngineConfig, EvaluationError, Flow,
    ForwardsState, Sheet, SparseSheet, SymbolTable, Value,
};

fn backwards_globals() -> Rc<RefCell<Vec<Value>>> {
    Rc::new(RefCell::new(sheet_engine::stdlib::build_global_values()))
}

fn sheet_ctx<'a>(sheet: Rc<RefCell<SparseSheet>>, logger: &'a NullLogger) -> CallingContext<'a> {
    let mut ctx = CallingContext::new(logger, backwards_globals(), EngineConfig::default());
    let symbols = Rc::new(SymbolTable::with_builtins(sheet_engine::stdlib::builtin_names()));
    ctx.forwards = Some(ForwardsState {
        generation: 1,
        sheet,
        cell_frames: Vec::new(),
        current_cell: CellAddr::new(0, 0),
        symbols,
    });
    ctx
}

/// Runs a Backwards program and returns the value of its trailing `return`,
/// or `Value::Nil` if control fell off the end without one.
fn run_backwards(source: &str) -> Value {
    let symtab = SymbolTable::with_builtins(sheet_engine::stdlib::builtin_names());
    let (program, errors, global_count) =
        sheet_engine::parser::BackwardsParser::with_symtab(source, "<test>", symtab).parse_program();
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    let mut globals = sheet_engine::stdlib::build_global_values();
    globals.resize(global_count, Value::Nil);
    let logger = NullLogger;
    let mut ctx = CallingContext::new(&logger, Rc::new(RefCell::new(globals)), EngineConfig::default());
    match sheet_engine::eval::eval_statement(&program, &mut ctx).expect("evaluation failed") {
        Flow::Return(value) => value,
        _ => Value::Nil,
    }
}

fn as_decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::Float(sheet_engine::Number::Finite(d), _) => *d,
        other => panic!("expected a finite number, found {:?}", other.type_name()),
    }
}

#[test]
fn direct_two_cell_cycle_is_reported_with_its_path() {
    // A1 := B1 + 1, B1 := A1 + 1 — each refers to the other.
    let sheet = Rc::new(RefCell::new(SparseSheet::new()));
    sheet.borrow_mut().put(CellAddr::new(0, 0), Cell::unparsed("B1 + 1".to_string()));
    sheet.borrow_mut().put(CellAddr::new(1, 0), Cell::unparsed("A1 + 1".to_string()));
    let logger = NullLogger;
    let mut ctx = sheet_ctx(sheet, &logger);
    let err = recompute(CellAddr::new(0, 0), &mut ctx).unwrap_err();
    match err {
        EvaluationError::CircularReference { path } => {
            assert!(path.len() >= 2, "expected the cycle's path to be reported: {path:?}");
        }
        other => panic!("expected CircularReference, got {other:?}"),
    }
}

#[test]
fn expand_range_over_a_partially_blank_column_keeps_the_blank_as_nil() {
    let sheet = Rc::new(RefCell::new(SparseSheet::new()));
    sheet.borrow_mut().put(CellAddr::new(1, 0), Cell::unparsed("1".to_string()));
    sheet.borrow_mut().put(CellAddr::new(1, 1), Cell::unparsed("".to_string()));
    sheet.borrow_mut().put(CellAddr::new(1, 2), Cell::unparsed("3".to_string()));
    let logger = NullLogger;
    let mut ctx = sheet_ctx(Rc::clone(&sheet), &logger);

    let range = CellRange::new(
        CellRef::new(AxisRef::absolute(1), AxisRef::absolute(0), None),
        CellRef::new(AxisRef::absolute(1), AxisRef::absolute(2), None),
    );
    let array = expand_range(&range, &mut ctx).unwrap();
    let items = match array {
        Value::Array(rc) => rc.borrow().clone(),
        other => panic!("expected an array, found {}", other.type_name()),
    };
    assert_eq!(items.len(), 3);
    assert_eq!(as_decimal(&items[0]), rust_decimal::Decimal::from(1));
    assert!(items[1].is_nil());
    assert_eq!(as_decimal(&items[2]), rust_decimal::Decimal::from(3));
}

#[test]
fn column_letters_and_indices_round_trip() {
    assert_eq!(sheet_format::column_to_string(0), "A");
    assert_eq!(sheet_format::column_to_string(25), "Z");
    assert_eq!(sheet_format::column_to_string(26), "AA");
    assert_eq!(sheet_format::column_to_string(701), "ZZ");
    assert_eq!(sheet_format::column_to_string(702), "AAA");

    assert_eq!(sheet_format::string_to_column("A").unwrap(), 0);
    assert_eq!(sheet_format::string_to_column("Z").unwrap(), 25);
    assert_eq!(sheet_format::string_to_column("AA").unwrap(), 26);
    assert_eq!(sheet_format::string_to_column("ZZ").unwrap(), 701);
    assert_eq!(sheet_format::string_to_column("AAA").unwrap(), 702);
}

#[test]
fn recursive_factorial_of_five_is_one_hundred_twenty() {
    let value = run_backwards(
        "function fact(n) is\n\
           if n <= 1 then\n\
             return 1\n\
           end\n\
           return n * fact(n - 1)\n\
         end\n\
         return fact(5)",
    );
    assert_eq!(as_decimal(&value), rust_decimal::Decimal::from(120));
}

#[test]
fn closure_captures_its_defining_scope_past_the_outer_call_returning() {
    // mk(x) returns a closure over x; the outer call's frame is long gone
    // by the time the closure is actually invoked.
    let value = run_backwards(
        "function mk(x) is\n\
           function inner() is\n\
             return x + 1\n\
           end\n\
           return inner\n\
         end\n\
         f := mk(41)\n\
         return f()",
    );
    assert_eq!(as_decimal(&value), rust_decimal::Decimal::from(42));
}

#[test]
fn and_short_circuits_without_evaluating_the_right_operand() {
    // Fatal would unwind to the driver if evaluated; `and`/`or` must not
    // evaluate a right operand a false/true left operand already decided.
    let value = run_backwards("return false and Fatal(\"should not run\")");
    assert_eq!(as_decimal(&value), rust_decimal::Decimal::from(0));
}

#[test]
fn or_short_circuits_without_evaluating_the_right_operand() {
    let value = run_backwards("return true or Fatal(\"should not run\")");
    assert_eq!(as_decimal(&value), rust_decimal::Decimal::from(1));
}

/// A debugger hook that, on breakpoint, runs a Backwards assignment against
/// its own *duplicated* context — proving the mutation doesn't reach back
/// into the suspended program's real frame.
struct MutatingHook;

impl sheet_engine::debugger::DebuggerHook for MutatingHook {
    fn on_enter(&self, _function_name: &str, _ctx: &mut CallingContext<'_>) {}
    fn on_step(&self, _point: sheet_engine::debugger::ExecutionPoint, _ctx: &mut CallingContext<'_>) {}
    fn on_breakpoint(&self, ctx: &mut CallingContext<'_>) -> Result<(), EvaluationError> {
        // Mutate slot 0 of the (duplicated) current frame.
        if let Some(frame) = ctx.frames.last() {
            frame.slots.borrow_mut()[0] = Value::float(sheet_engine::Number::Finite(rust_decimal::Decimal::from(999)));
        }
        Ok(())
    }
    fn on_error(&self, _error: &EvaluationError, _ctx: &mut CallingContext<'_>) {}
}

#[test]
fn debugger_hook_runs_against_a_duplicated_context_that_cannot_leak_back() {
    let logger = NullLogger;
    let mut ctx = CallingContext::new(&logger, backwards_globals(), EngineConfig::default());
    ctx.debugger = Some(Rc::new(RefCell::new(MutatingHook)));

    let original_slots = Rc::new(RefCell::new(vec![Value::float(sheet_engine::Number::Finite(rust_decimal::Decimal::from(1)))]));
    ctx.frames.push(sheet_engine::eval::StackFrame { slots: Rc::clone(&original_slots), captured: None });

    sheet_engine::debugger::enter_debugger(&mut ctx).unwrap();

    assert_eq!(as_decimal(&original_slots.borrow()[0]), rust_decimal::Decimal::from(1));
}
