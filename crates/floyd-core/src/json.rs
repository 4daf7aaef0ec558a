//! Conversions between `Value` and the generic JSON tree.
//!
//! Encoding is plain per variant (int → number, vector → array, …) and
//! therefore ambiguous on its own; decoding is type-directed — the caller
//! supplies the `TypeDesc` that picks the variant. The externally-visible
//! form is the `[TYPE, VALUE]` pair.

use std::collections::BTreeMap;

use crate::error::FloydError;
use crate::types::{typedesc_from_json, typedesc_to_json, TypeDesc, TypeJsonMode};
use crate::value::Value;

/// Encode a value as its plain JSON payload.
///
/// `mode` only matters for typeid payloads; everything else encodes the
/// same way in both modes. NaN/Infinity doubles cannot be represented and
/// are a fatal error.
pub fn value_to_json(val: &Value, mode: TypeJsonMode) -> Result<serde_json::Value, FloydError> {
    use serde_json::Value as J;
    match val {
        Value::Undefined | Value::Any | Value::Void => Ok(J::Null),
        Value::Bool(b) => Ok(J::Bool(*b)),
        Value::Int(n) => Ok(J::Number((*n).into())),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(J::Number)
            .ok_or_else(|| FloydError::eval("cannot encode NaN/Infinity as JSON")),
        Value::String(s) => Ok(J::String((**s).clone())),
        Value::Json(j) => Ok((**j).clone()),
        Value::Typeid(t) => typedesc_to_json(t, mode),
        Value::Struct(s) => {
            let members: Result<Vec<J>, FloydError> =
                s.members.iter().map(|m| value_to_json(m, mode)).collect();
            Ok(J::Array(members?))
        }
        Value::Vector(v) => {
            let elements: Result<Vec<J>, FloydError> =
                v.elements.iter().map(|e| value_to_json(e, mode)).collect();
            Ok(J::Array(elements?))
        }
        Value::Dict(d) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in &d.entries {
                obj.insert(k.clone(), value_to_json(v, mode)?);
            }
            Ok(J::Object(obj))
        }
        Value::Function(f) => Ok(J::Number(f.function_id.into())),
    }
}

/// Decode a value from its plain JSON payload, directed by `expected_type`.
pub fn json_to_value(
    expected_type: &TypeDesc,
    json: &serde_json::Value,
) -> Result<Value, FloydError> {
    use serde_json::Value as J;
    match expected_type {
        TypeDesc::Undefined => Ok(Value::make_undefined()),
        TypeDesc::Any => Ok(Value::make_any()),
        TypeDesc::Void => Ok(Value::make_void()),
        TypeDesc::Bool => match json {
            J::Bool(b) => Ok(Value::make_bool(*b)),
            other => Err(FloydError::decode(format!("expected bool, got {other}"))),
        },
        TypeDesc::Int => json
            .as_i64()
            .map(Value::make_int)
            .ok_or_else(|| FloydError::decode(format!("expected int, got {json}"))),
        TypeDesc::Double => json
            .as_f64()
            .map(Value::make_double)
            .ok_or_else(|| FloydError::decode(format!("expected double, got {json}"))),
        TypeDesc::String => match json {
            J::String(s) => Ok(Value::make_string(s.clone())),
            other => Err(FloydError::decode(format!("expected string, got {other}"))),
        },
        TypeDesc::Json => Ok(Value::make_json(json.clone())),
        TypeDesc::Typeid => Ok(Value::make_typeid(typedesc_from_json(json)?)),
        TypeDesc::Struct(def) => {
            let members_json = json
                .as_array()
                .ok_or_else(|| FloydError::decode("struct value must be an array"))?;
            if members_json.len() != def.members.len() {
                return Err(FloydError::decode(format!(
                    "struct value has {} members, definition has {}",
                    members_json.len(),
                    def.members.len()
                )));
            }
            let mut members = Vec::with_capacity(members_json.len());
            for (m, j) in def.members.iter().zip(members_json.iter()) {
                members.push(json_to_value(&m.member_type, j)?);
            }
            Ok(Value::make_struct(def.clone(), members))
        }
        TypeDesc::Vector(element_type) => {
            let elements_json = json
                .as_array()
                .ok_or_else(|| FloydError::decode("vector value must be an array"))?;
            let elements: Result<Vec<Value>, FloydError> = elements_json
                .iter()
                .map(|j| json_to_value(element_type, j))
                .collect();
            Ok(Value::make_vector((**element_type).clone(), elements?))
        }
        TypeDesc::Dict(value_type) => {
            let obj = json
                .as_object()
                .ok_or_else(|| FloydError::decode("dict value must be an object"))?;
            let mut entries = BTreeMap::new();
            for (k, j) in obj {
                entries.insert(k.clone(), json_to_value(value_type, j)?);
            }
            Ok(Value::make_dict((**value_type).clone(), entries))
        }
        TypeDesc::Function { .. } => {
            let id = json
                .as_i64()
                .ok_or_else(|| FloydError::decode("function value must be a numeric id"))?;
            Ok(Value::make_function(expected_type.clone(), id))
        }
        TypeDesc::Unresolved(name) => Err(FloydError::decode(format!(
            "cannot decode a value of unresolved type '{name}'"
        ))),
    }
}

/// Encode a value as the externally-visible `[TYPE, VALUE]` pair.
pub fn value_and_type_to_json(val: &Value) -> Result<serde_json::Value, FloydError> {
    Ok(serde_json::Value::Array(vec![
        typedesc_to_json(&val.get_type(), TypeJsonMode::Resolved)?,
        value_to_json(val, TypeJsonMode::Resolved)?,
    ]))
}

/// Decode a `[TYPE, VALUE]` pair back into a value.
pub fn json_to_value_and_type(json: &serde_json::Value) -> Result<Value, FloydError> {
    let pair = json
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| FloydError::decode("typed value must be a [TYPE, VALUE] pair"))?;
    let t = typedesc_from_json(&pair[0])?;
    json_to_value(&t, &pair[1])
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::types::{Member, StructDef};

    fn round_trip(v: &Value) -> Value {
        let json = value_and_type_to_json(v).unwrap();
        json_to_value_and_type(&json).unwrap()
    }

    #[test]
    fn test_round_trip_scalars() {
        for v in [
            Value::make_undefined(),
            Value::make_void(),
            Value::make_bool(true),
            Value::make_int(-42),
            Value::make_double(2.5),
            Value::make_string("hello"),
        ] {
            assert_eq!(round_trip(&v), v);
        }
    }

    #[test]
    fn test_round_trip_json_variant() {
        let v = Value::make_json(serde_json::json!({"a": [1, 2], "b": "x"}));
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn test_round_trip_typeid() {
        let v = Value::make_typeid(TypeDesc::make_vector(TypeDesc::String));
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn test_round_trip_nested_composites() {
        let def = Rc::new(StructDef::new(vec![
            Member::new(TypeDesc::Int, "x"),
            Member::new(TypeDesc::String, "label"),
        ]));
        let s = Value::make_struct(
            def.clone(),
            vec![Value::make_int(3), Value::make_string("p")],
        );
        let vec_of_struct = Value::make_vector(TypeDesc::make_struct(def), vec![s.clone(), s]);
        assert_eq!(round_trip(&vec_of_struct), vec_of_struct);

        let dict_of_vec = Value::make_dict(
            TypeDesc::make_vector(TypeDesc::Int),
            [(
                "k".to_string(),
                Value::make_vector(TypeDesc::Int, vec![Value::make_int(1)]),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(round_trip(&dict_of_vec), dict_of_vec);
    }

    #[test]
    fn test_function_round_trips_by_id() {
        let t = TypeDesc::make_function(TypeDesc::Int, vec![TypeDesc::Int]);
        let f = Value::make_function(t, 7);
        // Identity of behavior is not preserved — only the id is.
        assert_eq!(round_trip(&f), f);
    }

    #[test]
    fn test_nan_double_is_fatal() {
        let v = Value::make_double(f64::NAN);
        assert!(value_to_json(&v, TypeJsonMode::Resolved).is_err());
    }

    #[test]
    fn test_decode_wrong_payload_is_fatal() {
        assert!(json_to_value(&TypeDesc::Int, &serde_json::json!("not a number")).is_err());
        assert!(json_to_value(&TypeDesc::Bool, &serde_json::json!(1)).is_err());
        let def = Rc::new(StructDef::new(vec![Member::new(TypeDesc::Int, "x")]));
        assert!(json_to_value(
            &TypeDesc::make_struct(def),
            &serde_json::json!([1, 2])
        )
        .is_err());
    }

    #[test]
    fn test_struct_value_encodes_as_member_array() {
        let def = Rc::new(StructDef::new(vec![
            Member::new(TypeDesc::Int, "x"),
            Member::new(TypeDesc::Int, "y"),
        ]));
        let s = Value::make_struct(def, vec![Value::make_int(1), Value::make_int(2)]);
        let json = value_to_json(&s, TypeJsonMode::Resolved).unwrap();
        assert_eq!(json, serde_json::json!([1, 2]));
    }
}
