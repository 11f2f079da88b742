//! The tree-walking evaluator and the cross-language `CallingContext`
//! bridge (`spec.md` §4.4, §4.5).

use std::cell::RefCell;
use std::rc::Rc;

use rust_decimal::Decimal;
use sheet_model::cellref::{CellRange, CellRef};
use sheet_model::logger::Logger;

use crate::ast::{BinaryOp, Expression, Lvalue, Statement, TernaryOp, UnaryOp};
use crate::cell::Generation;
use crate::context::EngineConfig;
use crate::debugger::ExecutionPoint;
use crate::errors::{EvalResult, EvaluationError, Position};
use crate::sheet::{CellAddr, Sheet};
use crate::value::{CapturedScope, DictKey, FrameSlots, FunctionValue, NativeArity, Number, Value};

/// How a statement finished: fell through, or unwound via `return`/`break`/
/// `continue` (`spec.md` §4.4 — rendered as a control-flow return value
/// rather than a mutable "pending" flag on the frame, the idiomatic Rust
/// equivalent of the same propagation rule).
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

pub struct StackFrame {
    pub slots: FrameSlots,
    pub captured: Option<CapturedScope>,
}

impl StackFrame {
    pub fn new(slot_count: usize, captured: Option<CapturedScope>) -> Self {
        StackFrame { slots: Rc::new(RefCell::new(vec![Value::Nil; slot_count])), captured }
    }

    /// Flattens this frame onto its captured chain, producing the
    /// `CapturedScope` a `function` statement evaluated inside this frame
    /// should close over (`spec.md` §4.3 closure capture).
    pub fn as_captured_scope(&self) -> CapturedScope {
        let mut chain = vec![Rc::clone(&self.slots)];
        if let Some(outer) = &self.captured {
            chain.extend(outer.iter().cloned());
        }
        Rc::new(chain)
    }
}

/// Cells currently under evaluation, used as the cycle-detection path
/// (`spec.md` §4.7 "CellFrame"). Pushed/popped around a cell's
/// `parsedExpression` evaluation only, not around every function call.
pub struct ForwardsState {
    pub generation: Generation,
    pub sheet: Rc<RefCell<dyn Sheet>>,
    pub cell_frames: Vec<CellAddr>,
    pub current_cell: CellAddr,
    /// The global name table a cell's Forwards expression resolves function
    /// calls against — the same table the host's Backwards program was
    /// parsed with, so a cell can call any global it declared, not only
    /// built-ins (`spec.md` §4.7 step 4 parses `C.parsedExpression` against
    /// the one slot assignment the rest of the engine already agrees on).
    pub symbols: Rc<crate::symtab::SymbolTable>,
}

impl ForwardsState {
    /// A shallow copy sharing the same sheet, symbol table, and
    /// cycle-detection path — used when a fresh `CallingContext` (a new
    /// `Eval` scope, a debugger duplicate) still needs to resolve cell
    /// references against the same sheet and recursion guard as its parent.
    pub(crate) fn share(&self) -> ForwardsState {
        ForwardsState {
            generation: self.generation,
            sheet: Rc::clone(&self.sheet),
            cell_frames: self.cell_frames.clone(),
            current_cell: self.current_cell,
            symbols: Rc::clone(&self.symbols),
        }
    }
}

/// Bundles logger, debugger hook, call stack, and global scope — extended
/// by an optional `ForwardsState` rather than by subclassing (`spec.md`
/// §9 "re-express as composition"). The original's separate "function name
/// table" and "built-in getter table" collapse into `globals`: every
/// callable, built-in or user-defined, already lives there as a
/// `Value::Function` at a parse-time-resolved slot, so no by-name lookup
/// table is needed at evaluation time.
pub struct CallingContext<'a> {
    pub logger: &'a dyn Logger,
    pub debugger: Option<Rc<RefCell<dyn crate::debugger::DebuggerHook>>>,
    pub globals: Rc<RefCell<Vec<Value>>>,
    pub frames: Vec<StackFrame>,
    pub forwards: Option<ForwardsState>,
    pub config: EngineConfig,
    /// Whether `onStep` should fire at each statement boundary (`spec.md`
    /// §4.8 "the evaluator consults the hook at statement boundaries when
    /// stepping is armed"). The host arms this directly; it starts
    /// disarmed so ordinary evaluation pays no hook-call overhead.
    pub stepping: bool,
}

impl<'a> CallingContext<'a> {
    pub fn new(logger: &'a dyn Logger, globals: Rc<RefCell<Vec<Value>>>, config: EngineConfig) -> Self {
        CallingContext { logger, debugger: None, globals, frames: Vec::new(), forwards: None, config, stepping: false }
    }

    fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    fn read_scope(&self, depth: u32, slot: u32) -> Value {
        let frame = self.current_frame().expect("ScopeRead outside a call frame");
        if depth == 0 {
            frame.slots.borrow()[slot as usize].clone()
        } else {
            let chain = frame.captured.as_ref().expect("ScopeRead depth>0 requires a captured chain");
            chain[(depth - 1) as usize].borrow()[slot as usize].clone()
        }
    }

    fn write_scope(&self, depth: u32, slot: u32, value: Value) {
        let frame = self.current_frame().expect("ScopeRead outside a call frame");
        if depth == 0 {
            frame.slots.borrow_mut()[slot as usize] = value;
        } else {
            let chain = frame.captured.as_ref().expect("ScopeRead depth>0 requires a captured chain");
            chain[(depth - 1) as usize].borrow_mut()[slot as usize] = value;
        }
    }

    fn read_global(&self, slot: usize) -> Value {
        self.globals.borrow()[slot].clone()
    }

    fn write_global(&self, slot: usize, value: Value) {
        let mut globals = self.globals.borrow_mut();
        if slot >= globals.len() {
            globals.resize(slot + 1, Value::Nil);
        }
        globals[slot] = value;
    }

    /// A deep copy of the scope/frame chain, shallow sharing the logger
    /// pointer, sheet, and tables — used so a debugger-invoked script can't
    /// perturb the suspended program it interrupted (`spec.md` §4.5).
    /// Always comes up with stepping disarmed, regardless of the parent's
    /// setting, so a hook's own script can't recursively re-enter itself
    /// through `onStep`.
    pub fn duplicate_for_debugger<'b>(&self, logger: &'b dyn Logger) -> CallingContext<'b> {
        let frames = self
            .frames
            .iter()
            .map(|f| StackFrame {
                slots: Rc::new(RefCell::new(f.slots.borrow().clone())),
                captured: f.captured.clone(),
            })
            .collect();
        CallingContext {
            logger,
            debugger: self.debugger.clone(),
            globals: Rc::clone(&self.globals),
            frames,
            forwards: self.forwards.as_ref().map(ForwardsState::share),
            config: self.config,
            stepping: false,
        }
    }
}

fn type_mismatch(message: impl Into<String>) -> EvaluationError {
    EvaluationError::TypeMismatch(message.into())
}

fn domain_error(message: impl Into<String>) -> EvaluationError {
    EvaluationError::Domain(message.into())
}

pub fn eval_expression(expr: &Expression, ctx: &mut CallingContext<'_>) -> EvalResult<Value> {
    match expr {
        Expression::Constant(v) => Ok(v.clone()),
        Expression::GlobalRead(slot) => Ok(ctx.read_global(*slot)),
        Expression::ScopeRead { depth, slot } => Ok(ctx.read_scope(*depth, *slot)),
        Expression::BuildArray(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval_expression(item, ctx)?);
            }
            Ok(Value::new_array(values))
        }
        Expression::BuildDictionary(entries) => {
            let dict = Value::new_dictionary();
            if let Value::Dictionary(map) = &dict {
                for (k, v) in entries {
                    let key = eval_expression(k, ctx)?;
                    let value = eval_expression(v, ctx)?;
                    let key = DictKey::new(key).map_err(|e| type_mismatch(e.to_string()))?;
                    map.borrow_mut().insert(key, value);
                }
            }
            Ok(dict)
        }
        Expression::FunctionCall(callee, args) => {
            let callee_value = eval_expression(callee, ctx)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for a in args {
                arg_values.push(eval_expression(a, ctx)?);
            }
            call_value(&callee_value, arg_values, ctx)
        }
        Expression::Unary(op, inner) => eval_unary(*op, eval_expression(inner, ctx)?),
        Expression::Binary(BinaryOp::And, lhs, rhs) => {
            let left = eval_expression(lhs, ctx)?;
            if !is_truthy(&left)? {
                Ok(left)
            } else {
                eval_expression(rhs, ctx)
            }
        }
        Expression::Binary(BinaryOp::Or, lhs, rhs) => {
            let left = eval_expression(lhs, ctx)?;
            if is_truthy(&left)? {
                Ok(left)
            } else {
                eval_expression(rhs, ctx)
            }
        }
        Expression::Binary(op, lhs, rhs) => {
            let left = eval_expression(lhs, ctx)?;
            let right = eval_expression(rhs, ctx)?;
            eval_binary(*op, left, right)
        }
        Expression::Ternary(TernaryOp::SetIndex, container, index, value) => {
            let container_value = eval_expression(container, ctx)?;
            let index_value = eval_expression(index, ctx)?;
            let value = eval_expression(value, ctx)?;
            set_index(&container_value, index_value, value)
        }
        Expression::CellReference(cell_ref) => eval_cell_reference(cell_ref, ctx),
        Expression::CellRangeLiteral(range) => Ok(Value::CellRange(range.clone())),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Neg => match value {
            Value::Float(n, precision) => Ok(Value::Float(negate(n), precision)),
            other => Err(type_mismatch(format!("cannot negate a {}", other.type_name()))),
        },
        UnaryOp::Not => Ok(Value::float(if is_truthy(&value)? { Number::Finite(Decimal::ZERO) } else { Number::Finite(Decimal::ONE) })),
    }
}

fn negate(n: Number) -> Number {
    match n {
        Number::Finite(d) => Number::Finite(-d),
        Number::NaN => Number::NaN,
        Number::PosInfinity => Number::NegInfinity,
        Number::NegInfinity => Number::PosInfinity,
    }
}

/// Numeric truthiness: zero is false, any other finite/infinite number is
/// true, NaN is true (it is not equal to zero). Non-numbers in a boolean
/// context are a type error (`spec.md` §4.4 doesn't name a `Boolean`
/// variant at all — conditions are numbers).
fn is_truthy(value: &Value) -> EvalResult<bool> {
    match value {
        Value::Float(Number::Finite(d), _) => Ok(!d.is_zero()),
        Value::Float(_, _) => Ok(true),
        other => Err(type_mismatch(format!("expected a number in boolean context, found {}", other.type_name()))),
    }
}

/// `+` is addition over numbers, concatenation over strings, and a
/// `TypeMismatch` over anything else or mixed operands — `spec.md` §4.4
/// explicitly rules out element-wise array addition.
fn eval_binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Float(a, pa), Value::Float(b, pb)) => Ok(Value::Float(numeric_add(*a, *b), (*pa).max(*pb))),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(type_mismatch(format!("cannot add {} and {}", left.type_name(), right.type_name()))),
        },
        BinaryOp::Sub => numeric_binary(left, right, |a, b| numeric_add(a, negate(b))),
        BinaryOp::Mul => numeric_binary(left, right, numeric_mul),
        BinaryOp::Div => numeric_binary(left, right, numeric_div),
        BinaryOp::Mod => numeric_binary(left, right, numeric_mod),
        BinaryOp::Eq => compare_eq(left, right, false),
        BinaryOp::Ne => compare_eq(left, right, true),
        BinaryOp::Lt => compare_ord(left, right, std::cmp::Ordering::Less),
        BinaryOp::Le => compare_ord_or(left, right, std::cmp::Ordering::Less, std::cmp::Ordering::Equal),
        BinaryOp::Gt => compare_ord(left, right, std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare_ord_or(left, right, std::cmp::Ordering::Greater, std::cmp::Ordering::Equal),
        BinaryOp::Index => get_index(&left, right),
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops are handled in eval_expression"),
    }
}

fn numeric_binary(left: Value, right: Value, f: impl Fn(Number, Number) -> Number) -> EvalResult<Value> {
    match (left, right) {
        (Value::Float(a, pa), Value::Float(b, pb)) => Ok(Value::Float(f(a, b), pa.max(pb))),
        (l, r) => Err(type_mismatch(format!("expected two numbers, found {} and {}", l.type_name(), r.type_name()))),
    }
}

fn numeric_add(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::NaN, _) | (_, Number::NaN) => Number::NaN,
        (Number::PosInfinity, Number::NegInfinity) | (Number::NegInfinity, Number::PosInfinity) => Number::NaN,
        (Number::PosInfinity, _) | (_, Number::PosInfinity) => Number::PosInfinity,
        (Number::NegInfinity, _) | (_, Number::NegInfinity) => Number::NegInfinity,
        (Number::Finite(x), Number::Finite(y)) => Number::Finite(x + y),
    }
}

fn numeric_mul(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::NaN, _) | (_, Number::NaN) => Number::NaN,
        (Number::Finite(x), Number::Finite(y)) => Number::Finite(x * y),
        _ => {
            let sign = numeric_sign(a) * numeric_sign(b);
            if sign > 0 { Number::PosInfinity } else if sign < 0 { Number::NegInfinity } else { Number::NaN }
        }
    }
}

fn numeric_sign(n: Number) -> i32 {
    match n {
        Number::Finite(d) if d.is_zero() => 0,
        Number::Finite(d) if d.is_sign_negative() => -1,
        Number::Finite(_) => 1,
        Number::PosInfinity => 1,
        Number::NegInfinity => -1,
        Number::NaN => 0,
    }
}

fn numeric_div(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::NaN, _) | (_, Number::NaN) => Number::NaN,
        (Number::Finite(x), Number::Finite(y)) => {
            if y.is_zero() {
                if x.is_zero() { Number::NaN } else if x.is_sign_positive() { Number::PosInfinity } else { Number::NegInfinity }
            } else {
                Number::Finite(x / y)
            }
        }
        (Number::Finite(_), _) => Number::Finite(Decimal::ZERO),
        _ => Number::NaN,
    }
}

fn numeric_mod(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Finite(x), Number::Finite(y)) if !y.is_zero() => Number::Finite(x % y),
        _ => Number::NaN,
    }
}

/// Comparison on numbers uses IEEE-style ordering (so NaN compares false
/// everywhere except `<>`); on strings it's bytewise; across types it's a
/// `TypeMismatch` except `=`/`<>`, which may compare nil (`spec.md` §4.4).
fn compare_eq(left: Value, right: Value, negate_result: bool) -> EvalResult<Value> {
    match left.values_equal(&right) {
        Some(equal) => Ok(bool_value(equal != negate_result)),
        None => Err(type_mismatch(format!("cannot compare {} and {}", left.type_name(), right.type_name()))),
    }
}

fn compare_ord(left: Value, right: Value, want: std::cmp::Ordering) -> EvalResult<Value> {
    compare_ord_or(left, right, want, want)
}

fn compare_ord_or(left: Value, right: Value, a: std::cmp::Ordering, b: std::cmp::Ordering) -> EvalResult<Value> {
    let ordering = match (&left, &right) {
        (Value::Float(x, _), Value::Float(y, _)) => x.partial_compare(y),
        (Value::Str(x), Value::Str(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        _ => return Err(type_mismatch(format!("cannot order {} and {}", left.type_name(), right.type_name()))),
    };
    Ok(bool_value(ordering == Some(a) || ordering == Some(b)))
}

fn bool_value(b: bool) -> Value {
    Value::float(Number::Finite(if b { Decimal::ONE } else { Decimal::ZERO }))
}

/// `array[i]` requires an in-range integer index (`DomainError` otherwise);
/// `dict[key]` returns `Nil` on a missing key (`spec.md` §4.4).
fn get_index(container: &Value, index: Value) -> EvalResult<Value> {
    match container {
        Value::Array(items) => {
            let i = index_as_usize(&index, items.borrow().len())?;
            Ok(items.borrow()[i].clone())
        }
        Value::Dictionary(map) => {
            let key = DictKey::new(index).map_err(|e| type_mismatch(e.to_string()))?;
            Ok(map.borrow().get(&key).cloned().unwrap_or(Value::Nil))
        }
        other => Err(type_mismatch(format!("cannot index a {}", other.type_name()))),
    }
}

fn set_index(container: &Value, index: Value, value: Value) -> EvalResult<Value> {
    match container {
        Value::Array(items) => {
            let i = index_as_usize(&index, items.borrow().len())?;
            items.borrow_mut()[i] = value.clone();
            Ok(value)
        }
        Value::Dictionary(map) => {
            let key = DictKey::new(index).map_err(|e| type_mismatch(e.to_string()))?;
            map.borrow_mut().insert(key, value.clone());
            Ok(value)
        }
        other => Err(type_mismatch(format!("cannot index a {}", other.type_name()))),
    }
}

fn index_as_usize(index: &Value, len: usize) -> EvalResult<usize> {
    match index {
        Value::Float(Number::Finite(d), _) => {
            let i: i64 = (*d).try_into().map_err(|_| domain_error("index is not an integer"))?;
            if i < 0 || i as usize >= len {
                Err(domain_error(format!("index {i} out of range [0, {len})")))
            } else {
                Ok(i as usize)
            }
        }
        other => Err(type_mismatch(format!("expected an integer index, found {}", other.type_name()))),
    }
}

/// Resolves a Forwards `CellRef` against the cell currently being
/// evaluated and recursively recomputes the target (`spec.md` §4.7 step 4
/// "For each CellRef dereference, recursively recompute that cell").
fn eval_cell_reference(cell_ref: &CellRef, ctx: &mut CallingContext<'_>) -> EvalResult<Value> {
    let state = ctx.forwards.as_ref().ok_or_else(|| type_mismatch("cell references require spreadsheet context"))?;
    let (col, row) = cell_ref.resolve(state.current_cell.col, state.current_cell.row);
    crate::engine::recompute(CellAddr::new(col, row), ctx)
}

pub fn resolve_cell_range(range: &CellRange, ctx: &CallingContext<'_>) -> (CellAddr, CellAddr) {
    let state = ctx.forwards.as_ref().expect("cell ranges require spreadsheet context");
    let (min_col, min_row, max_col, max_row) = range.resolve_bounds(state.current_cell.col, state.current_cell.row);
    (CellAddr::new(min_col, min_row), CellAddr::new(max_col, max_row))
}

pub fn eval_statement(stmt: &Statement, ctx: &mut CallingContext<'_>) -> EvalResult<Flow> {
    match stmt {
        Statement::Empty => Ok(Flow::Normal),
        Statement::Assign(lvalue, expr) => {
            let value = eval_expression(expr, ctx)?;
            assign(*lvalue, value, ctx);
            Ok(Flow::Normal)
        }
        Statement::Call(expr) => {
            eval_expression(expr, ctx)?;
            Ok(Flow::Normal)
        }
        Statement::Block(statements) => {
            for (pos, s) in statements {
                notify_step(*pos, ctx);
                match eval_statement(s, ctx)? {
                    Flow::Normal => {}
                    flow => return Ok(flow),
                }
            }
            Ok(Flow::Normal)
        }
        Statement::If { cond, then_branch, else_ifs, else_branch } => {
            if is_truthy(&eval_expression(cond, ctx)?)? {
                return eval_statement(then_branch, ctx);
            }
            for (cond2, body2) in else_ifs {
                if is_truthy(&eval_expression(cond2, ctx)?)? {
                    return eval_statement(body2, ctx);
                }
            }
            match else_branch {
                Some(body) => eval_statement(body, ctx),
                None => Ok(Flow::Normal),
            }
        }
        Statement::While { cond, body } => {
            while is_truthy(&eval_expression(cond, ctx)?)? {
                match eval_statement(body, ctx)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    ret @ Flow::Return(_) => return Ok(ret),
                }
            }
            Ok(Flow::Normal)
        }
        Statement::For { slot, from, to, step, body } => {
            let from_v = numeric_of(eval_expression(from, ctx)?)?;
            let to_v = numeric_of(eval_expression(to, ctx)?)?;
            let step_v = match step {
                Some(e) => numeric_of(eval_expression(e, ctx)?)?,
                None => Decimal::ONE,
            };
            if step_v.is_zero() {
                return Err(domain_error("for-loop step cannot be zero"));
            }
            let mut i = from_v;
            loop {
                if step_v.is_sign_positive() {
                    if i > to_v {
                        break;
                    }
                } else if i < to_v {
                    break;
                }
                assign(*slot, Value::float(Number::Finite(i)), ctx);
                match eval_statement(body, ctx)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    ret @ Flow::Return(_) => return Ok(ret),
                }
                i += step_v;
            }
            Ok(Flow::Normal)
        }
        Statement::Return(expr) => {
            let value = match expr {
                Some(e) => eval_expression(e, ctx)?,
                None => Value::Nil,
            };
            Ok(Flow::Return(value))
        }
        Statement::Break => Ok(Flow::Break),
        Statement::Continue => Ok(Flow::Continue),
        Statement::FunctionDecl { name, target, params, body, slot_count } => {
            // Captures whatever frame is live right now, so a function
            // declared inside another function closes over its locals
            // (`spec.md` §8 closure example); a top-level declaration runs
            // with no frame on the stack and captures nothing.
            let captured = ctx.frames.last().map(StackFrame::as_captured_scope);
            let function = Value::Function(Rc::new(FunctionValue::User {
                name: name.clone(),
                params: params.clone(),
                captured,
                body: Rc::clone(body),
                slot_count: *slot_count,
            }));
            assign(*target, function, ctx);
            Ok(Flow::Normal)
        }
    }
}

fn numeric_of(value: Value) -> EvalResult<Decimal> {
    match value {
        Value::Float(Number::Finite(d), _) => Ok(d),
        other => Err(type_mismatch(format!("expected a finite number, found {}", other.type_name()))),
    }
}

/// Fires `onStep` if a hook is attached and stepping is armed (`spec.md`
/// §4.8). The hook gets its own duplicated context, same as every other
/// hook call, so it can't perturb the program it's observing.
fn notify_step(pos: Position, ctx: &mut CallingContext<'_>) {
    if !ctx.stepping {
        return;
    }
    let Some(hook) = ctx.debugger.clone() else {
        return;
    };
    let mut duplicated = ctx.duplicate_for_debugger(ctx.logger);
    hook.borrow().on_step(ExecutionPoint { line: pos.line, column: pos.column }, &mut duplicated);
}

/// Fires `onEnter` for a user function call (`spec.md` §4.8 "fired on every
/// function call").
fn notify_enter(function_name: &str, ctx: &mut CallingContext<'_>) {
    let Some(hook) = ctx.debugger.clone() else {
        return;
    };
    let mut duplicated = ctx.duplicate_for_debugger(ctx.logger);
    hook.borrow().on_enter(function_name, &mut duplicated);
}

/// Fires `onError` as an `EvaluationError` is about to unwind past this
/// function call's `StackFrame` (`spec.md` §4.8).
fn notify_error(error: &EvaluationError, ctx: &mut CallingContext<'_>) {
    let Some(hook) = ctx.debugger.clone() else {
        return;
    };
    let mut duplicated = ctx.duplicate_for_debugger(ctx.logger);
    hook.borrow().on_error(error, &mut duplicated);
}

fn assign(lvalue: Lvalue, value: Value, ctx: &mut CallingContext<'_>) {
    match lvalue {
        Lvalue::Global(slot) => ctx.write_global(slot, value),
        Lvalue::Local { depth, slot } => ctx.write_scope(depth, slot, value),
    }
}

pub fn call_value(callee: &Value, args: Vec<Value>, ctx: &mut CallingContext<'_>) -> EvalResult<Value> {
    let function = match callee {
        Value::Function(f) => Rc::clone(f),
        other => return Err(type_mismatch(format!("cannot call a {}", other.type_name()))),
    };
    match &*function {
        FunctionValue::User { name, params, captured, body, slot_count } => {
            if args.len() != params.len() {
                return Err(type_mismatch(format!("expected {} argument(s), found {}", params.len(), args.len())));
            }
            notify_enter(name, ctx);
            let frame = StackFrame::new(*slot_count, captured.clone());
            {
                let mut slots = frame.slots.borrow_mut();
                for (i, value) in args.into_iter().enumerate() {
                    slots[i] = value;
                }
            }
            ctx.frames.push(frame);
            let result = eval_statement(body, ctx);
            ctx.frames.pop();
            let flow = match result {
                Ok(flow) => flow,
                Err(e) => {
                    notify_error(&e, ctx);
                    return Err(e);
                }
            };
            match flow {
                Flow::Return(value) => Ok(value),
                Flow::Normal => Ok(Value::Nil),
                Flow::Break | Flow::Continue => Err(type_mismatch("break/continue cannot cross a function boundary")),
            }
        }
        FunctionValue::Native { arity, takes_context, id, .. } => {
            expect_arity(*arity, args.len())?;
            crate::stdlib::call_native(*id, args, *takes_context, ctx)
        }
    }
}

fn expect_arity(arity: NativeArity, got: usize) -> EvalResult<()> {
    let want = match arity {
        NativeArity::Zero => 0,
        NativeArity::One => 1,
        NativeArity::Two => 2,
        NativeArity::Three => 3,
    };
    if got == want {
        Ok(())
    } else {
        Err(type_mismatch(format!("expected {want} argument(s), found {got}")))
    }
}
