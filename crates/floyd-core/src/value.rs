use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::FloydError;
use crate::types::{StructDef, TypeDesc};

/// An instance of a struct type: member values bound 1:1, by position, to
/// the definition's member list. The definition is shared, not owned.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub def: Rc<StructDef>,
    pub members: Vec<Value>,
}

/// A homogeneous ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorValue {
    pub element_type: TypeDesc,
    pub elements: Vec<Value>,
}

/// A string-keyed homogeneous map. `BTreeMap` keeps iteration order
/// deterministic (ascending by key), which the comparator relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct DictValue {
    pub value_type: TypeDesc,
    pub entries: BTreeMap<String, Value>,
}

/// A function reference: its exact signature type plus a numeric id into
/// the program's function table.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValue {
    pub func_type: TypeDesc,
    pub function_id: i64,
}

/// A Floyd runtime value with an explicit type. Immutable, value
/// semantics: clones of heap-backed variants share their payload through
/// `Rc`, and payloads are never mutated in place.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Any,
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(Rc<String>),
    Json(Rc<serde_json::Value>),
    Typeid(Rc<TypeDesc>),
    Struct(Rc<StructValue>),
    Vector(Rc<VectorValue>),
    Dict(Rc<DictValue>),
    Function(Rc<FunctionValue>),
}

impl Value {
    // --- Factories, one per variant ---

    pub fn make_undefined() -> Value {
        Value::Undefined
    }

    pub fn make_any() -> Value {
        Value::Any
    }

    pub fn make_void() -> Value {
        Value::Void
    }

    pub fn make_bool(v: bool) -> Value {
        Value::Bool(v)
    }

    pub fn make_int(v: i64) -> Value {
        Value::Int(v)
    }

    pub fn make_double(v: f64) -> Value {
        Value::Double(v)
    }

    pub fn make_string(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn make_json(v: serde_json::Value) -> Value {
        Value::Json(Rc::new(v))
    }

    pub fn make_typeid(t: TypeDesc) -> Value {
        Value::Typeid(Rc::new(t))
    }

    /// Build a struct value. The member list must match the definition
    /// positionally, both in count and in type.
    pub fn make_struct(def: Rc<StructDef>, members: Vec<Value>) -> Value {
        debug_assert_eq!(def.members.len(), members.len());
        #[cfg(debug_assertions)]
        for (m, v) in def.members.iter().zip(members.iter()) {
            debug_assert!(
                v.is_undefined() || v.get_type() == m.member_type,
                "struct member '{}' type mismatch",
                m.name
            );
        }
        Value::Struct(Rc::new(StructValue { def, members }))
    }

    /// Build a vector value. Every element's type must equal the declared
    /// element type.
    pub fn make_vector(element_type: TypeDesc, elements: Vec<Value>) -> Value {
        #[cfg(debug_assertions)]
        for e in &elements {
            debug_assert!(e.get_type() == element_type, "vector element type mismatch");
        }
        Value::Vector(Rc::new(VectorValue {
            element_type,
            elements,
        }))
    }

    /// Build a dict value. Every entry's type must equal the declared
    /// value type.
    pub fn make_dict(value_type: TypeDesc, entries: BTreeMap<String, Value>) -> Value {
        #[cfg(debug_assertions)]
        for v in entries.values() {
            debug_assert!(v.get_type() == value_type, "dict entry type mismatch");
        }
        Value::Dict(Rc::new(DictValue {
            value_type,
            entries,
        }))
    }

    /// Build a function reference. `func_type` must be a function type.
    pub fn make_function(func_type: TypeDesc, function_id: i64) -> Value {
        debug_assert!(matches!(func_type, TypeDesc::Function { .. }));
        Value::Function(Rc::new(FunctionValue {
            func_type,
            function_id,
        }))
    }

    // --- Predicates ---

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Value::Any)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Value::Json(_))
    }

    pub fn is_typeid(&self) -> bool {
        matches!(self, Value::Typeid(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Value::Vector(_))
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Value::Dict(_))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    // --- Accessors. A tag mismatch is a fatal contract violation. ---

    pub fn get_bool_value(&self) -> Result<bool, FloydError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(FloydError::type_mismatch("bool", other.type_name())),
        }
    }

    pub fn get_int_value(&self) -> Result<i64, FloydError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(FloydError::type_mismatch("int", other.type_name())),
        }
    }

    pub fn get_double_value(&self) -> Result<f64, FloydError> {
        match self {
            Value::Double(v) => Ok(*v),
            other => Err(FloydError::type_mismatch("double", other.type_name())),
        }
    }

    pub fn get_string_value(&self) -> Result<&str, FloydError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(FloydError::type_mismatch("string", other.type_name())),
        }
    }

    pub fn get_json_value(&self) -> Result<&serde_json::Value, FloydError> {
        match self {
            Value::Json(j) => Ok(j),
            other => Err(FloydError::type_mismatch("json", other.type_name())),
        }
    }

    pub fn get_typeid_value(&self) -> Result<&TypeDesc, FloydError> {
        match self {
            Value::Typeid(t) => Ok(t),
            other => Err(FloydError::type_mismatch("typeid", other.type_name())),
        }
    }

    pub fn get_struct_value(&self) -> Result<&Rc<StructValue>, FloydError> {
        match self {
            Value::Struct(s) => Ok(s),
            other => Err(FloydError::type_mismatch("struct", other.type_name())),
        }
    }

    pub fn get_vector_value(&self) -> Result<&Rc<VectorValue>, FloydError> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(FloydError::type_mismatch("vector", other.type_name())),
        }
    }

    pub fn get_dict_value(&self) -> Result<&Rc<DictValue>, FloydError> {
        match self {
            Value::Dict(d) => Ok(d),
            other => Err(FloydError::type_mismatch("dict", other.type_name())),
        }
    }

    pub fn get_function_value(&self) -> Result<&Rc<FunctionValue>, FloydError> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(FloydError::type_mismatch("function", other.type_name())),
        }
    }

    // --- Type-independent ---

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undef",
            Value::Any => "any",
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Json(_) => "json",
            Value::Typeid(_) => "typeid",
            Value::Struct(_) => "struct",
            Value::Vector(_) => "vector",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
        }
    }

    /// The exact declared type of this value. Structs and functions carry
    /// their concrete type, not just their base kind.
    pub fn get_type(&self) -> TypeDesc {
        match self {
            Value::Undefined => TypeDesc::Undefined,
            Value::Any => TypeDesc::Any,
            Value::Void => TypeDesc::Void,
            Value::Bool(_) => TypeDesc::Bool,
            Value::Int(_) => TypeDesc::Int,
            Value::Double(_) => TypeDesc::Double,
            Value::String(_) => TypeDesc::String,
            Value::Json(_) => TypeDesc::Json,
            Value::Typeid(_) => TypeDesc::Typeid,
            Value::Struct(s) => TypeDesc::Struct(s.def.clone()),
            Value::Vector(v) => TypeDesc::make_vector(v.element_type.clone()),
            Value::Dict(d) => TypeDesc::make_dict(d.value_type.clone()),
            Value::Function(f) => f.func_type.clone(),
        }
    }

    /// Render the value the way the language prints it: strings bare,
    /// everything else as `Display`.
    pub fn to_compact_string(&self) -> String {
        match self {
            Value::String(s) => (**s).clone(),
            other => other.to_string(),
        }
    }
}

// Identity-then-structural: shared allocations compare equal instantly,
// everything else recurses. Different tags are simply unequal; the deep
// comparator is the partial operation that rejects them.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Any, Value::Any) => true,
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Json(a), Value::Json(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Typeid(a), Value::Typeid(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Struct(a), Value::Struct(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "<undef>"),
            Value::Any => write!(f, "<any>"),
            Value::Void => write!(f, "<void>"),
            Value::Bool(true) => write!(f, "true"),
            Value::Bool(false) => write!(f, "false"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Json(j) => write!(f, "{j}"),
            Value::Typeid(t) => write!(f, "{t}"),
            Value::Struct(s) => {
                write!(f, "struct {{")?;
                for (i, (m, v)) in s.def.members.iter().zip(s.members.iter()).enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={v}", m.name)?;
                }
                write!(f, "}}")
            }
            Value::Vector(v) => {
                write!(f, "[{}](", v.element_type)?;
                for (i, e) in v.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Value::Dict(d) => {
                write!(f, "[string:{}]{{", d.value_type)?;
                for (i, (k, v)) in d.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{k}\": {v}")?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function #{}>", func.function_id),
        }
    }
}

/*
    Deep total-ordering comparison across two values of the SAME type.

    result < 0: left side sorts first
    result = 0: equal
    result > 0: right side sorts first

    Every user-visible comparison operator is built on top of this one
    function, so its tie-break rules are observable language semantics.
*/
pub fn compare_value_deep(left: &Value, right: &Value) -> Result<Ordering, FloydError> {
    if left.get_type() != right.get_type() {
        return Err(FloydError::incomparable(
            left.get_type().to_string(),
            right.get_type().to_string(),
        ));
    }
    match (left, right) {
        (Value::Undefined, Value::Undefined)
        | (Value::Any, Value::Any)
        | (Value::Void, Value::Void) => Ok(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        // IEEE ordering; a NaN on either side compares Equal rather than
        // erroring. See DESIGN.md — the language has not specified a
        // total double order.
        (Value::Double(a), Value::Double(b)) => Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (Value::String(a), Value::String(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        (Value::Json(a), Value::Json(b)) => {
            if a == b {
                Ok(Ordering::Equal)
            } else {
                Err(FloydError::incomparable("json", "json"))
            }
        }
        // Placeholder order: unequal typeids always sort left-first. Do
        // not rely on this for sorting typeid collections; see DESIGN.md.
        (Value::Typeid(a), Value::Typeid(b)) => {
            if a == b {
                Ok(Ordering::Equal)
            } else {
                Ok(Ordering::Less)
            }
        }
        (Value::Struct(a), Value::Struct(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(Ordering::Equal);
            }
            compare_struct_deep(a, b)
        }
        (Value::Vector(a), Value::Vector(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(Ordering::Equal);
            }
            compare_vector_deep(a, b)
        }
        (Value::Dict(a), Value::Dict(b)) => {
            if Rc::ptr_eq(a, b) {
                return Ok(Ordering::Equal);
            }
            compare_dict_deep(a, b)
        }
        (Value::Function(a), Value::Function(b)) => {
            if a.function_id == b.function_id {
                Ok(Ordering::Equal)
            } else {
                Err(FloydError::incomparable("function", "function"))
            }
        }
        // The type-equality guard above makes mixed tags unreachable.
        _ => Err(FloydError::incomparable(
            left.type_name(),
            right.type_name(),
        )),
    }
}

fn compare_struct_deep(left: &StructValue, right: &StructValue) -> Result<Ordering, FloydError> {
    for (a, b) in left.members.iter().zip(right.members.iter()) {
        let diff = compare_value_deep(a, b)?;
        if diff != Ordering::Equal {
            return Ok(diff);
        }
    }
    Ok(Ordering::Equal)
}

// Element by element over the shared prefix. On a strict-prefix tie the
// LONGER vector sorts FIRST — inverted from conventional lexicographic
// order, preserved for compatibility.
fn compare_vector_deep(left: &VectorValue, right: &VectorValue) -> Result<Ordering, FloydError> {
    let shared = left.elements.len().min(right.elements.len());
    for i in 0..shared {
        let diff = compare_value_deep(&left.elements[i], &right.elements[i])?;
        if diff != Ordering::Equal {
            return Ok(diff);
        }
    }
    Ok(match left.elements.len().cmp(&right.elements.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater => Ordering::Less,
        Ordering::Less => Ordering::Greater,
    })
}

// Dicts compare as (key, value) sequences in ascending key order. A dict
// whose pairs are a strict prefix of the other's sorts GREATER, mirroring
// the vector inversion. The first mismatching pair breaks ties by key,
// then by value.
fn compare_dict_deep(left: &DictValue, right: &DictValue) -> Result<Ordering, FloydError> {
    let mut left_it = left.entries.iter();
    let mut right_it = right.entries.iter();
    loop {
        match (left_it.next(), right_it.next()) {
            (None, None) => return Ok(Ordering::Equal),
            (None, Some(_)) => return Ok(Ordering::Greater),
            (Some(_), None) => return Ok(Ordering::Less),
            (Some((lk, lv)), Some((rk, rv))) => {
                let key_diff = lk.as_bytes().cmp(rk.as_bytes());
                if key_diff != Ordering::Equal {
                    return Ok(key_diff);
                }
                let value_diff = compare_value_deep(lv, rv)?;
                if value_diff != Ordering::Equal {
                    return Ok(value_diff);
                }
            }
        }
    }
}
