//! The standard library (`spec.md` §4.6): built-ins registered into the
//! global scope as `Function` values over a native pointer. Registration
//! mirrors the teacher's own `FunctionSpec`/`inventory::submit!` pattern —
//! one static per built-in, collected and sorted into a stable catalog so
//! the symbol table and the runtime global array always agree on slot
//! order (`spec.md` §4.3 "resolved... at parse time").

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use rust_decimal::Decimal;

use sheet_format::RoundMode;

use crate::debugger::enter_debugger;
use crate::errors::EvaluationError;
use crate::eval::CallingContext;
use crate::parser::BackwardsParser;
use crate::sheet::CellAddr;
use crate::symtab::SymbolTable;
use crate::value::{DictKey, FunctionValue, NativeArity, Number, Value};

pub struct BuiltinSpec {
    pub name: &'static str,
    pub arity: NativeArity,
    pub takes_context: bool,
    pub implementation: fn(&mut CallingContext<'_>, &[Value]) -> Result<Value, EvaluationError>,
}

inventory::collect!(BuiltinSpec);

/// The catalog in stable, sorted order — computed once and cached, since
/// `inventory`'s submission order isn't itself guaranteed stable across a
/// build (`spec.md` §4.6).
fn catalog() -> &'static [&'static BuiltinSpec] {
    static CATALOG: OnceLock<Vec<&'static BuiltinSpec>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let mut specs: Vec<&'static BuiltinSpec> = inventory::iter::<BuiltinSpec>().collect();
        specs.sort_by_key(|s| s.name);
        specs
    })
}

/// Names in catalog order — this is the exact order `SymbolTable::with_builtins`
/// must be given so its global slots line up with `build_global_values`.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    catalog().iter().map(|s| s.name)
}

/// One `Value::Function` per catalog entry, in the same order as
/// `builtin_names` — the initial contents of a fresh global scope.
pub fn build_global_values() -> Vec<Value> {
    catalog()
        .iter()
        .enumerate()
        .map(|(id, spec)| {
            Value::Function(Rc::new(FunctionValue::Native {
                name: spec.name,
                arity: spec.arity,
                takes_context: spec.takes_context,
                id,
            }))
        })
        .collect()
}

pub fn call_native(id: usize, args: Vec<Value>, _takes_context: bool, ctx: &mut CallingContext<'_>) -> Result<Value, EvaluationError> {
    let spec = catalog().get(id).expect("native function id out of range of the catalog");
    (spec.implementation)(ctx, &args)
}

fn type_mismatch(message: impl Into<String>) -> EvaluationError {
    EvaluationError::TypeMismatch(message.into())
}

fn domain_error(message: impl Into<String>) -> EvaluationError {
    EvaluationError::Domain(message.into())
}

fn number_arg(v: &Value) -> Result<Decimal, EvaluationError> {
    match v {
        Value::Float(Number::Finite(d), _) => Ok(*d),
        other => Err(type_mismatch(format!("expected a finite number, found {}", other.type_name()))),
    }
}

fn string_arg(v: &Value) -> Result<String, EvaluationError> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(type_mismatch(format!("expected a string, found {}", other.type_name()))),
    }
}

fn array_arg(v: &Value) -> Result<Rc<RefCell<Vec<Value>>>, EvaluationError> {
    match v {
        Value::Array(a) => Ok(Rc::clone(a)),
        other => Err(type_mismatch(format!("expected an array, found {}", other.type_name()))),
    }
}

type DictMap = indexmap::IndexMap<DictKey, Value, ahash::RandomState>;

fn dict_arg(v: &Value) -> Result<Rc<RefCell<DictMap>>, EvaluationError> {
    match v {
        Value::Dictionary(d) => Ok(Rc::clone(d)),
        other => Err(type_mismatch(format!("expected a dictionary, found {}", other.type_name()))),
    }
}

fn index_arg(v: &Value, len: usize) -> Result<usize, EvaluationError> {
    let d = number_arg(v)?;
    let i: i64 = d.try_into().map_err(|_| domain_error("index is not an integer"))?;
    if i < 0 || i as usize >= len {
        Err(domain_error(format!("index {i} out of range [0, {len})")))
    } else {
        Ok(i as usize)
    }
}

macro_rules! register {
    ($name:literal, $arity:expr, $takes_context:expr, $f:expr) => {
        inventory::submit! {
            BuiltinSpec { name: $name, arity: $arity, takes_context: $takes_context, implementation: $f }
        }
    };
}

// --- numeric ------------------------------------------------------------

fn sqr(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let d = number_arg(&args[0])?;
    Ok(Value::float(Number::Finite(d * d)))
}
register!("Sqr", NativeArity::One, false, sqr);

fn abs(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(number_arg(&args[0])?.abs())))
}
register!("Abs", NativeArity::One, false, abs);

fn round_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let d = number_arg(&args[0])?;
    let text = sheet_format::format_decimal(d, ctx.config.default_precision, ctx.config.round_mode);
    let rounded: Decimal = text.parse().map_err(|_| domain_error("rounding produced an unparsable decimal"))?;
    Ok(Value::float(Number::Finite(rounded)))
}
register!("Round", NativeArity::One, true, round_fn);

fn floor_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(number_arg(&args[0])?.floor())))
}
register!("Floor", NativeArity::One, false, floor_fn);

fn ceil_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(number_arg(&args[0])?.ceil())))
}
register!("Ceil", NativeArity::One, false, ceil_fn);

fn min_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(number_arg(&args[0])?.min(number_arg(&args[1])?))))
}
register!("Min", NativeArity::Two, false, min_fn);

fn max_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(number_arg(&args[0])?.max(number_arg(&args[1])?))))
}
register!("Max", NativeArity::Two, false, max_fn);

fn is_nan(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(bool_value(matches!(&args[0], Value::Float(Number::NaN, _))))
}
register!("IsNaN", NativeArity::One, false, is_nan);

fn is_infinity(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(bool_value(matches!(&args[0], Value::Float(Number::PosInfinity | Number::NegInfinity, _))))
}
register!("IsInfinity", NativeArity::One, false, is_infinity);

fn bool_value(b: bool) -> Value {
    Value::float(Number::Finite(if b { Decimal::ONE } else { Decimal::ZERO }))
}

// --- containers -----------------------------------------------------------

fn new_array(_ctx: &mut CallingContext<'_>, _args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::new_array(Vec::new()))
}
register!("NewArray", NativeArity::Zero, false, new_array);

fn new_array_default(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let size = index_len(&args[0])?;
    Ok(Value::new_array(vec![args[1].clone(); size]))
}
register!("NewArrayDefault", NativeArity::Two, false, new_array_default);

fn index_len(v: &Value) -> Result<usize, EvaluationError> {
    let d = number_arg(v)?;
    let n: i64 = d.try_into().map_err(|_| domain_error("size is not an integer"))?;
    if n < 0 {
        Err(domain_error("size cannot be negative"))
    } else {
        Ok(n as usize)
    }
}

fn new_dictionary(_ctx: &mut CallingContext<'_>, _args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::new_dictionary())
}
register!("NewDictionary", NativeArity::Zero, false, new_dictionary);

fn size_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let n = match &args[0] {
        Value::Array(a) => a.borrow().len(),
        Value::Dictionary(d) => d.borrow().len(),
        other => return Err(type_mismatch(format!("{} has no size", other.type_name()))),
    };
    Ok(Value::float(Number::Finite(Decimal::from(n))))
}
register!("Size", NativeArity::One, false, size_fn);
register!("Length", NativeArity::One, false, size_fn);

fn push_back(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    array_arg(&args[0])?.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}
register!("PushBack", NativeArity::Two, false, push_back);

fn push_front(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    array_arg(&args[0])?.borrow_mut().insert(0, args[1].clone());
    Ok(args[0].clone())
}
register!("PushFront", NativeArity::Two, false, push_front);

fn pop_back(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    array_arg(&args[0])?.borrow_mut().pop().ok_or_else(|| domain_error("PopBack on an empty array"))
}
register!("PopBack", NativeArity::One, false, pop_back);

fn pop_front(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let arr = array_arg(&args[0])?;
    let mut arr = arr.borrow_mut();
    if arr.is_empty() {
        Err(domain_error("PopFront on an empty array"))
    } else {
        Ok(arr.remove(0))
    }
}
register!("PopFront", NativeArity::One, false, pop_front);

fn insert_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let arr = array_arg(&args[0])?;
    let len = arr.borrow().len();
    let pos = index_len(&args[1])?;
    if pos > len {
        return Err(domain_error(format!("insert position {pos} out of range [0, {len}]")));
    }
    arr.borrow_mut().insert(pos, args[2].clone());
    Ok(args[0].clone())
}
register!("Insert", NativeArity::Three, false, insert_fn);

fn get_index_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let arr = array_arg(&args[0])?;
    let len = arr.borrow().len();
    let i = index_arg(&args[1], len)?;
    let value = arr.borrow()[i].clone();
    Ok(value)
}
register!("GetIndex", NativeArity::Two, false, get_index_fn);

fn set_index_fn(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let arr = array_arg(&args[0])?;
    let len = arr.borrow().len();
    let i = index_arg(&args[1], len)?;
    arr.borrow_mut()[i] = args[2].clone();
    Ok(args[2].clone())
}
register!("SetIndex", NativeArity::Three, false, set_index_fn);

fn contains_key(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let dict = dict_arg(&args[0])?;
    let key = DictKey::new(args[1].clone()).map_err(|e| type_mismatch(e.to_string()))?;
    let contains = dict.borrow().contains_key(&key);
    Ok(bool_value(contains))
}
register!("ContainsKey", NativeArity::Two, false, contains_key);

fn remove_key(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let dict = dict_arg(&args[0])?;
    let key = DictKey::new(args[1].clone()).map_err(|e| type_mismatch(e.to_string()))?;
    let value = dict.borrow_mut().shift_remove(&key).unwrap_or(Value::Nil);
    Ok(value)
}
register!("RemoveKey", NativeArity::Two, false, remove_key);

fn get_keys(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let dict = dict_arg(&args[0])?;
    let keys = dict.borrow().keys().map(|k| k.0.clone()).collect();
    Ok(Value::new_array(keys))
}
register!("GetKeys", NativeArity::One, false, get_keys);

fn get_value(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let dict = dict_arg(&args[0])?;
    let key = DictKey::new(args[1].clone()).map_err(|e| type_mismatch(e.to_string()))?;
    let value = dict.borrow().get(&key).cloned().unwrap_or(Value::Nil);
    Ok(value)
}
register!("GetValue", NativeArity::Two, false, get_value);

// --- strings ----------------------------------------------------------

fn to_string_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::Str(render_value(&args[0], ctx)))
}
register!("ToString", NativeArity::One, true, to_string_fn);
register!("ValueOf", NativeArity::One, true, to_string_fn);

fn render_value(value: &Value, ctx: &CallingContext<'_>) -> String {
    match value {
        Value::Float(Number::Finite(d), precision) => {
            sheet_format::format_decimal(*d, *precision, ctx.config.round_mode)
        }
        Value::Float(Number::NaN, _) => "NaN".to_string(),
        Value::Float(Number::PosInfinity, _) => "Infinity".to_string(),
        Value::Float(Number::NegInfinity, _) => "-Infinity".to_string(),
        Value::Str(s) => s.clone(),
        Value::Nil => "nil".to_string(),
        Value::Array(_) => "[Array]".to_string(),
        Value::Dictionary(_) => "[Dictionary]".to_string(),
        Value::Function(f) => format!("[Function {}]", f.name()),
        Value::CellRef(r) => r.render(0, 0),
        Value::CellRange(r) => format!("{}:{}", r.top_left.render(0, 0), r.bottom_right.render(0, 0)),
    }
}

fn to_character(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let code = number_arg(&args[0])?;
    let code: u32 = code.try_into().map_err(|_| domain_error("ToCharacter code out of range"))?;
    let ch = char::from_u32(code).ok_or_else(|| domain_error("ToCharacter code is not a valid Unicode scalar value"))?;
    Ok(Value::Str(ch.to_string()))
}
register!("ToCharacter", NativeArity::One, false, to_character);

fn from_character(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let s = string_arg(&args[0])?;
    let ch = s.chars().next().ok_or_else(|| domain_error("FromCharacter on an empty string"))?;
    Ok(Value::float(Number::Finite(Decimal::from(ch as u32))))
}
register!("FromCharacter", NativeArity::One, false, from_character);

fn substring(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let s = string_arg(&args[0])?;
    let chars: Vec<char> = s.chars().collect();
    let from = index_len(&args[1])?;
    let len = index_len(&args[2])?;
    if from > chars.len() || from + len > chars.len() {
        return Err(domain_error("SubString range out of bounds"));
    }
    Ok(Value::Str(chars[from..from + len].iter().collect()))
}
register!("SubString", NativeArity::Three, false, substring);

// --- type predicates ----------------------------------------------------

macro_rules! type_predicate {
    ($builtin_name:literal, $fn_name:ident, $pattern:pat) => {
        fn $fn_name(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
            Ok(bool_value(matches!(&args[0], $pattern)))
        }
        register!($builtin_name, NativeArity::One, false, $fn_name);
    };
}

type_predicate!("IsFloat", is_float, Value::Float(..));
type_predicate!("IsString", is_string, Value::Str(_));
type_predicate!("IsNil", is_nil_fn, Value::Nil);
type_predicate!("IsArray", is_array, Value::Array(_));
type_predicate!("IsDictionary", is_dictionary, Value::Dictionary(_));
type_predicate!("IsFunction", is_function, Value::Function(_));
type_predicate!("IsCellRef", is_cell_ref, Value::CellRef(_));
type_predicate!("IsCellRange", is_cell_range, Value::CellRange(_));

// --- diagnostics --------------------------------------------------------

fn fatal(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    Err(EvaluationError::UserFatal(render_value(&args[0], ctx)))
}
register!("Fatal", NativeArity::One, true, fatal);

fn error_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let text = render_value(&args[0], ctx);
    ctx.logger.error(&text, None);
    Ok(Value::Nil)
}
register!("Error", NativeArity::One, true, error_fn);

fn warn_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let text = render_value(&args[0], ctx);
    ctx.logger.warn(&text, None);
    Ok(Value::Nil)
}
register!("Warn", NativeArity::One, true, warn_fn);

fn info_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let text = render_value(&args[0], ctx);
    ctx.logger.info(&text, None);
    Ok(Value::Nil)
}
register!("Info", NativeArity::One, true, info_fn);

fn debug_print(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let text = render_value(&args[0], ctx);
    ctx.logger.info(&format!("DebugPrint: {text}"), None);
    Ok(args[0].clone())
}
register!("DebugPrint", NativeArity::One, true, debug_print);

// --- numeric state -------------------------------------------------------

fn get_round_mode(ctx: &mut CallingContext<'_>, _args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::Str(round_mode_name(ctx.config.round_mode).to_string()))
}
register!("GetRoundMode", NativeArity::Zero, true, get_round_mode);

fn round_mode_name(mode: RoundMode) -> &'static str {
    match mode {
        RoundMode::Nearest => "Nearest",
        RoundMode::Up => "Up",
        RoundMode::Down => "Down",
        RoundMode::Floor => "Floor",
        RoundMode::Ceiling => "Ceiling",
    }
}

fn set_round_mode(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let name = string_arg(&args[0])?;
    ctx.config.round_mode = match name.as_str() {
        "Nearest" => RoundMode::Nearest,
        "Up" => RoundMode::Up,
        "Down" => RoundMode::Down,
        "Floor" => RoundMode::Floor,
        "Ceiling" => RoundMode::Ceiling,
        other => return Err(domain_error(format!("unknown round mode '{other}'"))),
    };
    Ok(Value::Nil)
}
register!("SetRoundMode", NativeArity::One, true, set_round_mode);

fn get_default_precision(ctx: &mut CallingContext<'_>, _args: &[Value]) -> Result<Value, EvaluationError> {
    Ok(Value::float(Number::Finite(Decimal::from(ctx.config.default_precision))))
}
register!("GetDefaultPrecision", NativeArity::Zero, true, get_default_precision);

fn set_default_precision(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    ctx.config.default_precision = index_len(&args[0])? as u32;
    Ok(Value::Nil)
}
register!("SetDefaultPrecision", NativeArity::One, true, set_default_precision);

fn get_precision(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    match &args[0] {
        Value::Float(_, precision) => Ok(Value::float(Number::Finite(Decimal::from(*precision)))),
        other => Err(type_mismatch(format!("expected a number, found {}", other.type_name()))),
    }
}
register!("GetPrecision", NativeArity::One, false, get_precision);

fn set_precision(_ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let precision = index_len(&args[1])? as u32;
    match &args[0] {
        Value::Float(n, _) => Ok(Value::Float(*n, precision)),
        other => Err(type_mismatch(format!("expected a number, found {}", other.type_name()))),
    }
}
register!("SetPrecision", NativeArity::Two, false, set_precision);

// --- spreadsheet ----------------------------------------------------------

fn eval_cell_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    match &args[0] {
        Value::CellRef(cell_ref) => {
            let state = ctx.forwards.as_ref().ok_or_else(|| type_mismatch("EvalCell requires spreadsheet context"))?;
            let (col, row) = cell_ref.resolve(state.current_cell.col, state.current_cell.row);
            crate::engine::recompute(CellAddr::new(col, row), ctx)
        }
        other => Err(type_mismatch(format!("EvalCell expects a CellRef, found {}", other.type_name()))),
    }
}
register!("EvalCell", NativeArity::One, true, eval_cell_fn);

fn expand_range_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    match &args[0] {
        Value::CellRange(range) => crate::engine::expand_range(range, ctx),
        other => Err(type_mismatch(format!("ExpandRange expects a CellRange, found {}", other.type_name()))),
    }
}
register!("ExpandRange", NativeArity::One, true, expand_range_fn);

/// Parses and evaluates a string of Backwards source in a fresh top-level
/// scope, sharing only the logger, debugger hook, and spreadsheet context
/// (`spec.md` §4.6 `Eval`) — the evaluated snippet can't see the calling
/// program's own globals, since no by-name lookup survives past parse time
/// for either program to share (see DESIGN.md).
fn eval_fn(ctx: &mut CallingContext<'_>, args: &[Value]) -> Result<Value, EvaluationError> {
    let source = string_arg(&args[0])?;
    let symtab = SymbolTable::with_builtins(builtin_names());
    let (program, errors, global_count) = BackwardsParser::with_symtab(&source, "<eval>", symtab).parse_program();
    if let Some(first) = errors.first() {
        return Err(domain_error(format!("Eval: {}", first.message)));
    }
    let mut globals = build_global_values();
    globals.resize(global_count, Value::Nil);
    let mut inner = CallingContext {
        logger: ctx.logger,
        debugger: ctx.debugger.clone(),
        globals: Rc::new(RefCell::new(globals)),
        frames: Vec::new(),
        forwards: ctx.forwards.as_ref().map(crate::eval::ForwardsState::share),
        config: ctx.config,
        stepping: false,
    };
    match crate::eval::eval_statement(&program, &mut inner)? {
        crate::eval::Flow::Return(value) => Ok(value),
        _ => Ok(Value::Nil),
    }
}
register!("Eval", NativeArity::One, true, eval_fn);

fn enter_debugger_fn(ctx: &mut CallingContext<'_>, _args: &[Value]) -> Result<Value, EvaluationError> {
    enter_debugger(ctx)
}
register!("EnterDebugger", NativeArity::Zero, true, enter_debugger_fn);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_are_unique_and_non_empty() {
        let names: Vec<&str> = builtin_names().collect();
        assert!(!names.is_empty());
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names.len(), sorted.len(), "duplicate built-in name in the catalog");
        assert!(names.iter().all(|n| !n.is_empty()));
    }

    #[test]
    fn builtin_names_and_global_values_stay_in_lockstep() {
        assert_eq!(builtin_names().count(), build_global_values().len());
    }
}
