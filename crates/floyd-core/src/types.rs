use std::fmt;
use std::rc::Rc;

use crate::error::FloydError;

/// One member of a struct definition: a declared type and a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub member_type: TypeDesc,
    pub name: String,
}

impl Member {
    pub fn new(member_type: TypeDesc, name: impl Into<String>) -> Self {
        Member {
            member_type,
            name: name.into(),
        }
    }
}

/// A struct definition: an ordered member list. Two struct types are the
/// same exact type iff their definitions are equal (structural).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructDef {
    pub members: Vec<Member>,
}

impl StructDef {
    pub fn new(members: Vec<Member>) -> Self {
        StructDef { members }
    }

    /// Index of the member with the given name, if any.
    pub fn find_member(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

/// A closed description of a Floyd type.
///
/// `Unresolved` carries a type identifier that semantic analysis has not
/// yet replaced with a concrete type; everything downstream of resolution
/// must reject it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Undefined,
    Any,
    Void,
    Bool,
    Int,
    Double,
    String,
    Json,
    Typeid,
    Struct(Rc<StructDef>),
    Vector(Box<TypeDesc>),
    Dict(Box<TypeDesc>),
    Function {
        ret: Box<TypeDesc>,
        params: Vec<TypeDesc>,
    },
    Unresolved(String),
}

impl TypeDesc {
    pub fn make_vector(element_type: TypeDesc) -> TypeDesc {
        TypeDesc::Vector(Box::new(element_type))
    }

    pub fn make_dict(value_type: TypeDesc) -> TypeDesc {
        TypeDesc::Dict(Box::new(value_type))
    }

    pub fn make_function(ret: TypeDesc, params: Vec<TypeDesc>) -> TypeDesc {
        TypeDesc::Function {
            ret: Box::new(ret),
            params,
        }
    }

    pub fn make_struct(def: Rc<StructDef>) -> TypeDesc {
        TypeDesc::Struct(def)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, TypeDesc::Undefined)
    }

    /// True iff no `Unresolved` identifier appears anywhere in this type.
    pub fn is_resolved(&self) -> bool {
        match self {
            TypeDesc::Unresolved(_) => false,
            TypeDesc::Struct(def) => def.members.iter().all(|m| m.member_type.is_resolved()),
            TypeDesc::Vector(e) => e.is_resolved(),
            TypeDesc::Dict(v) => v.is_resolved(),
            TypeDesc::Function { ret, params } => {
                ret.is_resolved() && params.iter().all(|p| p.is_resolved())
            }
            _ => true,
        }
    }

    /// The element type of a vector, or an error.
    pub fn vector_element_type(&self) -> Result<&TypeDesc, FloydError> {
        match self {
            TypeDesc::Vector(e) => Ok(e),
            other => Err(FloydError::type_mismatch("vector", other.to_string())),
        }
    }

    /// The value type of a dict, or an error.
    pub fn dict_value_type(&self) -> Result<&TypeDesc, FloydError> {
        match self {
            TypeDesc::Dict(v) => Ok(v),
            other => Err(FloydError::type_mismatch("dict", other.to_string())),
        }
    }

    /// The struct definition, or an error.
    pub fn struct_def(&self) -> Result<&Rc<StructDef>, FloydError> {
        match self {
            TypeDesc::Struct(def) => Ok(def),
            other => Err(FloydError::type_mismatch("struct", other.to_string())),
        }
    }

    /// The return type of a function type, or an error.
    pub fn function_return_type(&self) -> Result<&TypeDesc, FloydError> {
        match self {
            TypeDesc::Function { ret, .. } => Ok(ret),
            other => Err(FloydError::type_mismatch("function", other.to_string())),
        }
    }

    /// The parameter types of a function type, or an error.
    pub fn function_params(&self) -> Result<&[TypeDesc], FloydError> {
        match self {
            TypeDesc::Function { params, .. } => Ok(params),
            other => Err(FloydError::type_mismatch("function", other.to_string())),
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Undefined => write!(f, "undef"),
            TypeDesc::Any => write!(f, "any"),
            TypeDesc::Void => write!(f, "void"),
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Double => write!(f, "double"),
            TypeDesc::String => write!(f, "string"),
            TypeDesc::Json => write!(f, "json"),
            TypeDesc::Typeid => write!(f, "typeid"),
            TypeDesc::Struct(def) => {
                write!(f, "struct {{")?;
                for (i, m) in def.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{} {};", m.member_type, m.name)?;
                }
                write!(f, "}}")
            }
            TypeDesc::Vector(e) => write!(f, "[{e}]"),
            TypeDesc::Dict(v) => write!(f, "[string:{v}]"),
            TypeDesc::Function { ret, params } => {
                write!(f, "func {ret}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            TypeDesc::Unresolved(name) => write!(f, "#{name}"),
        }
    }
}

/// Controls how unresolved type identifiers are encoded.
///
/// Front-end passes exchange ASTs that may still contain unresolved
/// identifiers (`Preserve`); the execution boundary only ever sees fully
/// resolved types (`Resolved`, which treats an unresolved identifier as a
/// fatal error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeJsonMode {
    Resolved,
    Preserve,
}

/// Encode a type descriptor as its JSON form.
pub fn typedesc_to_json(
    t: &TypeDesc,
    mode: TypeJsonMode,
) -> Result<serde_json::Value, FloydError> {
    use serde_json::Value as J;
    let tag = |s: &str| Ok(J::String(s.to_string()));
    match t {
        TypeDesc::Undefined => tag("^undef"),
        TypeDesc::Any => tag("^any"),
        TypeDesc::Void => tag("^void"),
        TypeDesc::Bool => tag("^bool"),
        TypeDesc::Int => tag("^int"),
        TypeDesc::Double => tag("^double"),
        TypeDesc::String => tag("^string"),
        TypeDesc::Json => tag("^json"),
        TypeDesc::Typeid => tag("^typeid"),
        TypeDesc::Vector(e) => Ok(J::Array(vec![
            J::String("vector".to_string()),
            typedesc_to_json(e, mode)?,
        ])),
        TypeDesc::Dict(v) => Ok(J::Array(vec![
            J::String("dict".to_string()),
            typedesc_to_json(v, mode)?,
        ])),
        TypeDesc::Struct(def) => {
            let members: Result<Vec<J>, FloydError> = def
                .members
                .iter()
                .map(|m| {
                    Ok(J::Array(vec![
                        typedesc_to_json(&m.member_type, mode)?,
                        J::String(m.name.clone()),
                    ]))
                })
                .collect();
            Ok(J::Array(vec![
                J::String("struct".to_string()),
                J::Array(members?),
            ]))
        }
        TypeDesc::Function { ret, params } => {
            let params: Result<Vec<J>, FloydError> =
                params.iter().map(|p| typedesc_to_json(p, mode)).collect();
            Ok(J::Array(vec![
                J::String("func".to_string()),
                typedesc_to_json(ret, mode)?,
                J::Array(params?),
            ]))
        }
        TypeDesc::Unresolved(name) => match mode {
            TypeJsonMode::Preserve => tag(&format!("#{name}")),
            TypeJsonMode::Resolved => Err(FloydError::decode(format!(
                "unresolved type identifier '{name}' in resolved-mode type"
            ))),
        },
    }
}

/// Decode a type descriptor from its JSON form. Accepts both tag modes; a
/// leading `#` always decodes to `Unresolved`.
pub fn typedesc_from_json(json: &serde_json::Value) -> Result<TypeDesc, FloydError> {
    use serde_json::Value as J;
    match json {
        J::String(s) => match s.as_str() {
            "^undef" => Ok(TypeDesc::Undefined),
            "^any" => Ok(TypeDesc::Any),
            "^void" => Ok(TypeDesc::Void),
            "^bool" => Ok(TypeDesc::Bool),
            "^int" => Ok(TypeDesc::Int),
            "^double" => Ok(TypeDesc::Double),
            "^string" => Ok(TypeDesc::String),
            "^json" => Ok(TypeDesc::Json),
            "^typeid" => Ok(TypeDesc::Typeid),
            other => {
                if let Some(name) = other.strip_prefix('#') {
                    Ok(TypeDesc::Unresolved(name.to_string()))
                } else {
                    Err(FloydError::decode(format!("unknown type tag '{other}'")))
                }
            }
        },
        J::Array(items) => {
            let tag = items
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| FloydError::decode("type array without string tag"))?;
            match tag {
                "vector" => {
                    check_arity(items, 2, "vector type")?;
                    Ok(TypeDesc::make_vector(typedesc_from_json(&items[1])?))
                }
                "dict" => {
                    check_arity(items, 2, "dict type")?;
                    Ok(TypeDesc::make_dict(typedesc_from_json(&items[1])?))
                }
                "struct" => {
                    check_arity(items, 2, "struct type")?;
                    let members_json = items[1]
                        .as_array()
                        .ok_or_else(|| FloydError::decode("struct members must be an array"))?;
                    let mut members = Vec::with_capacity(members_json.len());
                    for m in members_json {
                        let pair = m
                            .as_array()
                            .filter(|a| a.len() == 2)
                            .ok_or_else(|| FloydError::decode("struct member must be [TYPE, name]"))?;
                        let member_type = typedesc_from_json(&pair[0])?;
                        let name = pair[1]
                            .as_str()
                            .ok_or_else(|| FloydError::decode("struct member name must be a string"))?;
                        members.push(Member::new(member_type, name));
                    }
                    Ok(TypeDesc::make_struct(Rc::new(StructDef::new(members))))
                }
                "func" => {
                    check_arity(items, 3, "func type")?;
                    let ret = typedesc_from_json(&items[1])?;
                    let params_json = items[2]
                        .as_array()
                        .ok_or_else(|| FloydError::decode("func params must be an array"))?;
                    let params: Result<Vec<TypeDesc>, FloydError> =
                        params_json.iter().map(typedesc_from_json).collect();
                    Ok(TypeDesc::make_function(ret, params?))
                }
                other => Err(FloydError::decode(format!("unknown type tag '{other}'"))),
            }
        }
        other => Err(FloydError::decode(format!(
            "cannot decode type from {other}"
        ))),
    }
}

fn check_arity(items: &[serde_json::Value], expected: usize, what: &str) -> Result<(), FloydError> {
    if items.len() != expected {
        return Err(FloydError::decode(format!(
            "{what} expects {expected} elements, got {}",
            items.len()
        )));
    }
    Ok(())
}
