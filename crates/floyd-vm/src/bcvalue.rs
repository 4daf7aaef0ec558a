//! The execution-side mirror of `Value`.
//!
//! Scalars live inline in 64-bit slots; composite payloads sit behind
//! `Rc` and use persistent collections, so cloning a stack slot or
//! snapshotting an interpreter never deep-copies. A `BcValue` is built
//! from a `Value` before execution and converted back only when crossing
//! the value-model API again (host-function boundaries, final results).

use std::rc::Rc;

use floyd_core::{FloydError, FunctionValue, StructDef, TypeDesc, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct BcStructValue {
    pub def: Rc<StructDef>,
    pub members: im::Vector<BcValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BcVectorValue {
    pub element_type: TypeDesc,
    pub elements: im::Vector<BcValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BcDictValue {
    pub value_type: TypeDesc,
    pub entries: im::OrdMap<String, BcValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BcValue {
    Undefined,
    Any,
    Void,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(Rc<String>),
    Json(Rc<serde_json::Value>),
    Typeid(Rc<TypeDesc>),
    Struct(Rc<BcStructValue>),
    Vector(Rc<BcVectorValue>),
    Dict(Rc<BcDictValue>),
    Function(Rc<FunctionValue>),
}

impl BcValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            BcValue::Undefined => "undef",
            BcValue::Any => "any",
            BcValue::Void => "void",
            BcValue::Bool(_) => "bool",
            BcValue::Int(_) => "int",
            BcValue::Double(_) => "double",
            BcValue::String(_) => "string",
            BcValue::Json(_) => "json",
            BcValue::Typeid(_) => "typeid",
            BcValue::Struct(_) => "struct",
            BcValue::Vector(_) => "vector",
            BcValue::Dict(_) => "dict",
            BcValue::Function(_) => "function",
        }
    }

    pub fn get_type(&self) -> TypeDesc {
        match self {
            BcValue::Undefined => TypeDesc::Undefined,
            BcValue::Any => TypeDesc::Any,
            BcValue::Void => TypeDesc::Void,
            BcValue::Bool(_) => TypeDesc::Bool,
            BcValue::Int(_) => TypeDesc::Int,
            BcValue::Double(_) => TypeDesc::Double,
            BcValue::String(_) => TypeDesc::String,
            BcValue::Json(_) => TypeDesc::Json,
            BcValue::Typeid(_) => TypeDesc::Typeid,
            BcValue::Struct(s) => TypeDesc::Struct(s.def.clone()),
            BcValue::Vector(v) => TypeDesc::make_vector(v.element_type.clone()),
            BcValue::Dict(d) => TypeDesc::make_dict(d.value_type.clone()),
            BcValue::Function(f) => f.func_type.clone(),
        }
    }

    pub fn get_bool(&self) -> Result<bool, FloydError> {
        match self {
            BcValue::Bool(b) => Ok(*b),
            other => Err(FloydError::type_mismatch("bool", other.type_name())),
        }
    }

    pub fn get_int(&self) -> Result<i64, FloydError> {
        match self {
            BcValue::Int(n) => Ok(*n),
            other => Err(FloydError::type_mismatch("int", other.type_name())),
        }
    }

    pub fn get_double(&self) -> Result<f64, FloydError> {
        match self {
            BcValue::Double(d) => Ok(*d),
            other => Err(FloydError::type_mismatch("double", other.type_name())),
        }
    }

    pub fn get_string(&self) -> Result<&str, FloydError> {
        match self {
            BcValue::String(s) => Ok(s),
            other => Err(FloydError::type_mismatch("string", other.type_name())),
        }
    }

    pub fn get_function(&self) -> Result<&Rc<FunctionValue>, FloydError> {
        match self {
            BcValue::Function(f) => Ok(f),
            other => Err(FloydError::type_mismatch("function", other.type_name())),
        }
    }
}

/// Convert a model value into its runtime mirror. Lossless and total over
/// every variant.
pub fn value_to_bc(value: &Value) -> BcValue {
    match value {
        Value::Undefined => BcValue::Undefined,
        Value::Any => BcValue::Any,
        Value::Void => BcValue::Void,
        Value::Bool(b) => BcValue::Bool(*b),
        Value::Int(n) => BcValue::Int(*n),
        Value::Double(d) => BcValue::Double(*d),
        Value::String(s) => BcValue::String(s.clone()),
        Value::Json(j) => BcValue::Json(j.clone()),
        Value::Typeid(t) => BcValue::Typeid(t.clone()),
        Value::Struct(s) => BcValue::Struct(Rc::new(BcStructValue {
            def: s.def.clone(),
            members: s.members.iter().map(value_to_bc).collect(),
        })),
        Value::Vector(v) => BcValue::Vector(Rc::new(BcVectorValue {
            element_type: v.element_type.clone(),
            elements: v.elements.iter().map(value_to_bc).collect(),
        })),
        Value::Dict(d) => BcValue::Dict(Rc::new(BcDictValue {
            value_type: d.value_type.clone(),
            entries: d
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_bc(v)))
                .collect(),
        })),
        Value::Function(f) => BcValue::Function(f.clone()),
    }
}

/// Convert a runtime value back into the value model.
pub fn bc_to_value(value: &BcValue) -> Value {
    match value {
        BcValue::Undefined => Value::make_undefined(),
        BcValue::Any => Value::make_any(),
        BcValue::Void => Value::make_void(),
        BcValue::Bool(b) => Value::make_bool(*b),
        BcValue::Int(n) => Value::make_int(*n),
        BcValue::Double(d) => Value::make_double(*d),
        BcValue::String(s) => Value::String(s.clone()),
        BcValue::Json(j) => Value::Json(j.clone()),
        BcValue::Typeid(t) => Value::Typeid(t.clone()),
        BcValue::Struct(s) => Value::make_struct(
            s.def.clone(),
            s.members.iter().map(bc_to_value).collect(),
        ),
        BcValue::Vector(v) => Value::make_vector(
            v.element_type.clone(),
            v.elements.iter().map(bc_to_value).collect(),
        ),
        BcValue::Dict(d) => Value::make_dict(
            d.value_type.clone(),
            d.entries
                .iter()
                .map(|(k, v)| (k.clone(), bc_to_value(v)))
                .collect(),
        ),
        BcValue::Function(f) => Value::Function(f.clone()),
    }
}
