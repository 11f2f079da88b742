use std::cell::RefCell;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::RandomState;
use indexmap::IndexMap;
use rust_decimal::Decimal;

use sheet_model::cellref::{CellRange, CellRef};

use crate::ast::Statement;

/// The arbitrary-precision decimal tower member. `rust_decimal::Decimal`
/// alone can't represent NaN/±Infinity, so this wraps it the way the
/// original's double-backed float value could (`spec.md` §3).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub enum Number {
    Finite(Decimal),
    NaN,
    PosInfinity,
    NegInfinity,
}

impl Number {
    pub fn is_nan(self) -> bool {
        matches!(self, Number::NaN)
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Number::PosInfinity | Number::NegInfinity)
    }

    /// IEEE-style ordering: NaN is unordered with everything, including
    /// another NaN. Contrast with this type's `Eq`/`Hash`, which treat
    /// `NaN` as equal to itself so `Number` can be a dictionary key
    /// (`spec.md` §3 invariant: only `Function` is excluded as a key, so
    /// every other variant — NaN included — needs total `Eq`).
    pub fn partial_compare(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::NaN, _) | (_, Number::NaN) => None,
            (Number::PosInfinity, Number::PosInfinity) => Some(Ordering::Equal),
            (Number::NegInfinity, Number::NegInfinity) => Some(Ordering::Equal),
            (Number::PosInfinity, _) => Some(Ordering::Greater),
            (_, Number::PosInfinity) => Some(Ordering::Less),
            (Number::NegInfinity, _) => Some(Ordering::Less),
            (_, Number::NegInfinity) => Some(Ordering::Greater),
            (Number::Finite(a), Number::Finite(b)) => a.partial_cmp(b),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::NaN, Number::NaN) => true,
            (Number::PosInfinity, Number::PosInfinity) => true,
            (Number::NegInfinity, Number::NegInfinity) => true,
            (Number::Finite(a), Number::Finite(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Number::NaN => 0u8.hash(state),
            Number::PosInfinity => 1u8.hash(state),
            Number::NegInfinity => 2u8.hash(state),
            Number::Finite(d) => {
                3u8.hash(state);
                d.normalize().hash(state);
            }
        }
    }
}

type ArrayInner = Vec<Value>;
type DictInner = IndexMap<DictKey, Value, RandomState>;

/// The runtime value tower (`spec.md` §3). `Array` and `Dictionary` are
/// reference-counted interior-mutable containers so two live bindings can
/// alias the same storage, matching the source's shared-pointer value
/// graph (`spec.md` §9 design note 1). Single-threaded by Non-goal, so
/// `Rc`/`RefCell` rather than `Arc`/`Mutex`.
#[derive(Debug, Clone)]
pub enum Value {
    /// A number plus its own display precision (`SetPrecision` mutates a
    /// copy's precision, not a global — the default *round mode* and
    /// default precision used when synthesizing new numbers are global
    /// engine state instead; see `crate::context::EngineConfig`).
    Float(Number, u32),
    Str(String),
    Nil,
    Array(Rc<RefCell<ArrayInner>>),
    Dictionary(Rc<RefCell<DictInner>>),
    Function(Rc<FunctionValue>),
    CellRef(CellRef),
    CellRange(CellRange),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(..) => "Float",
            Value::Str(_) => "String",
            Value::Nil => "Nil",
            Value::Array(_) => "Array",
            Value::Dictionary(_) => "Dictionary",
            Value::Function(_) => "Function",
            Value::CellRef(_) => "CellRef",
            Value::CellRange(_) => "CellRange",
        }
    }

    pub fn float(n: Number) -> Value {
        Value::Float(n, crate::context::DEFAULT_PRECISION)
    }

    pub fn new_array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn new_dictionary() -> Value {
        Value::Dictionary(Rc::new(RefCell::new(IndexMap::with_hasher(RandomState::new()))))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Value equality used by `=`/`<>` (`spec.md` §4.4): nil equals only
    /// nil, numbers compare via IEEE-style ordering (NaN never equal),
    /// strings compare bytewise, containers compare by identity (aliasing
    /// is observable, per the shared-container design note).
    pub fn values_equal(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Nil, Value::Nil) => Some(true),
            (Value::Nil, _) | (_, Value::Nil) => Some(false),
            (Value::Float(a, _), Value::Float(b, _)) => Some(a.partial_compare(b) == Some(Ordering::Equal)),
            (Value::Str(a), Value::Str(b)) => Some(a == b),
            (Value::Array(a), Value::Array(b)) => Some(Rc::ptr_eq(a, b)),
            (Value::Dictionary(a), Value::Dictionary(b)) => Some(Rc::ptr_eq(a, b)),
            (Value::Function(a), Value::Function(b)) => Some(Rc::ptr_eq(a, b)),
            (Value::CellRef(a), Value::CellRef(b)) => Some(a == b),
            (Value::CellRange(a), Value::CellRange(b)) => Some(a == b),
            _ => None,
        }
    }
}

/// A `Value` usable as a dictionary key: every variant except `Function`
/// (`spec.md` §3 invariant — enforced at construction here, not just by
/// convention).
#[derive(Debug, Clone)]
pub struct DictKey(pub Value);

#[derive(Debug, Clone, thiserror::Error)]
#[error("a Function value cannot be used as a dictionary key")]
pub struct FunctionKeyError;

impl DictKey {
    pub fn new(value: Value) -> Result<Self, FunctionKeyError> {
        if matches!(value, Value::Function(_)) {
            Err(FunctionKeyError)
        } else {
            Ok(DictKey(value))
        }
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Value::Float(a, _), Value::Float(b, _)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::CellRef(a), Value::CellRef(b)) => a == b,
            (Value::CellRange(a), Value::CellRange(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Dictionary(a), Value::Dictionary(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl Eq for DictKey {}

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::Float(n, _) => {
                0u8.hash(state);
                n.hash(state);
            }
            Value::Str(s) => {
                1u8.hash(state);
                s.hash(state);
            }
            Value::Nil => 2u8.hash(state),
            Value::CellRef(r) => {
                3u8.hash(state);
                r.hash(state);
            }
            Value::CellRange(r) => {
                4u8.hash(state);
                r.hash(state);
            }
            Value::Array(a) => {
                5u8.hash(state);
                (Rc::as_ptr(a) as usize).hash(state);
            }
            Value::Dictionary(d) => {
                6u8.hash(state);
                (Rc::as_ptr(d) as usize).hash(state);
            }
            Value::Function(_) => unreachable!("DictKey::new rejects Function"),
        }
    }
}

/// How many positional arguments a native built-in accepts, mirroring the
/// original's four call-pointer shapes (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeArity {
    Zero,
    One,
    Two,
    Three,
}

/// One level of the runtime scope chain: a call frame's slots, shared via
/// `Rc` so a closure capturing it keeps it alive after the frame that
/// created it is popped (`spec.md` §8 "even if the outer frame has popped").
pub type FrameSlots = Rc<RefCell<Vec<Value>>>;

/// A captured enclosing frame's entire scope chain, snapshotted at the
/// point a nested `function` statement is evaluated (`spec.md` §4.3
/// closure capture). Index 0 is the immediately enclosing frame; deeper
/// indices are its own captured chain, so a function nested three levels
/// deep can still resolve an outermost local via `ScopeRead { depth, slot }`.
pub type CapturedScope = Rc<Vec<FrameSlots>>;

pub enum FunctionValue {
    User {
        name: String,
        params: Vec<String>,
        captured: Option<CapturedScope>,
        body: Rc<Statement>,
        slot_count: usize,
    },
    Native {
        name: &'static str,
        arity: NativeArity,
        takes_context: bool,
        id: usize,
    },
}

impl std::fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionValue::User { name, params, .. } => {
                f.debug_struct("User").field("name", name).field("params", params).finish()
            }
            FunctionValue::Native { name, arity, .. } => {
                f.debug_struct("Native").field("name", name).field("arity", arity).finish()
            }
        }
    }
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::User { name, .. } => name,
            FunctionValue::Native { name, .. } => name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            FunctionValue::User { params, .. } => params.len(),
            FunctionValue::Native { arity, .. } => match arity {
                NativeArity::Zero => 0,
                NativeArity::One => 1,
                NativeArity::Two => 2,
                NativeArity::Three => 3,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn function_cannot_become_a_dictionary_key() {
        let f = Value::Function(Rc::new(FunctionValue::Native {
            name: "Abs",
            arity: NativeArity::One,
            takes_context: false,
            id: 0,
        }));
        assert!(DictKey::new(f).is_err());
    }

    #[test]
    fn nan_hashes_consistently_for_dictionary_use() {
        let mut h1 = ahash::AHasher::default();
        let mut h2 = ahash::AHasher::default();
        Number::NaN.hash(&mut h1);
        Number::NaN.hash(&mut h2);
        assert_eq!(std::hash::Hasher::finish(&h1), std::hash::Hasher::finish(&h2));
    }

    #[test]
    fn ieee_nan_is_unordered_with_itself() {
        assert_eq!(Number::NaN.partial_compare(&Number::NaN), None);
    }

    #[test]
    fn nil_equals_only_nil() {
        assert_eq!(Value::Nil.values_equal(&Value::Nil), Some(true));
        assert_eq!(Value::Nil.values_equal(&Value::Str(String::new())), Some(false));
    }

    proptest! {
        /// `Eq`/`Hash` treat `Number::Finite` consistently with `Decimal`'s
        /// own equality for every representable value, so a `Finite` never
        /// collides with a distinct `Finite` as a dictionary key.
        #[test]
        fn finite_equality_matches_decimal_equality(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let na = Number::Finite(rust_decimal::Decimal::from(a));
            let nb = Number::Finite(rust_decimal::Decimal::from(b));
            prop_assert_eq!(na == nb, a == b);
        }
    }

    #[test]
    fn cross_type_equality_is_type_mismatch_sentinel() {
        assert_eq!(Value::Str("1".into()).values_equal(&Value::float(Number::Finite(Decimal::ONE))), None);
    }
}
