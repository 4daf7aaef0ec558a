//! Host functions: native code invoked by numeric id from interpreted
//! code. The id → function table is supplied at interpreter construction;
//! arguments and results cross the boundary as model values.

use std::rc::Rc;

use floyd_core::{FloydError, FunctionDef, Member, TypeDesc, Value};

/// What a host function may touch besides its arguments. The print
/// buffer is the only user-visible side channel the core itself owns.
pub struct HostContext<'a> {
    pub print_output: &'a mut Vec<String>,
}

type HostFnInner = dyn Fn(&mut HostContext<'_>, &[Value]) -> Result<Value, FloydError>;

pub struct HostFunction {
    pub name: String,
    func: Box<HostFnInner>,
}

impl HostFunction {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(&mut HostContext<'_>, &[Value]) -> Result<Value, FloydError> + 'static,
    ) -> Self {
        HostFunction {
            name: name.into(),
            func: Box::new(f),
        }
    }

    pub fn call(
        &self,
        ctx: &mut HostContext<'_>,
        args: &[Value],
    ) -> Result<Value, FloydError> {
        (self.func)(ctx, args)
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<host-fn {}>", self.name)
    }
}

/// The id → native-function table. Entries are `Rc`-shared so a cloned
/// interpreter shares the same natives.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    fns: hashbrown::HashMap<i64, Rc<HostFunction>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry {
            fns: hashbrown::HashMap::new(),
        }
    }

    pub fn register(&mut self, id: i64, f: HostFunction) {
        self.fns.insert(id, Rc::new(f));
    }

    pub fn get(&self, id: i64) -> Option<Rc<HostFunction>> {
        self.fns.get(&id).cloned()
    }
}

/// Signatures of the built-in host functions, in registry-id order. The
/// resolution pass seeds these into the global symbol table so programs
/// can call them by name.
pub fn default_host_defs() -> Vec<FunctionDef> {
    vec![
        FunctionDef::make_host_func(
            "print",
            vec![Member::new(TypeDesc::Any, "value")],
            TypeDesc::Void,
            0,
        ),
        FunctionDef::make_host_func(
            "assert",
            vec![Member::new(TypeDesc::Bool, "condition")],
            TypeDesc::Void,
            1,
        ),
        FunctionDef::make_host_func(
            "to_string",
            vec![Member::new(TypeDesc::Any, "value")],
            TypeDesc::String,
            2,
        ),
        FunctionDef::make_host_func(
            "size",
            vec![Member::new(TypeDesc::Any, "collection")],
            TypeDesc::Int,
            3,
        ),
        FunctionDef::make_host_func(
            "push_back",
            vec![
                Member::new(TypeDesc::Any, "collection"),
                Member::new(TypeDesc::Any, "element"),
            ],
            TypeDesc::Any,
            4,
        ),
        FunctionDef::make_host_func(
            "update",
            vec![
                Member::new(TypeDesc::Any, "collection"),
                Member::new(TypeDesc::Any, "key"),
                Member::new(TypeDesc::Any, "value"),
            ],
            TypeDesc::Any,
            5,
        ),
        FunctionDef::make_host_func(
            "exists",
            vec![
                Member::new(TypeDesc::Any, "dict"),
                Member::new(TypeDesc::String, "key"),
            ],
            TypeDesc::Bool,
            6,
        ),
    ]
}

/// The registry matching `default_host_defs`.
pub fn default_host_registry() -> HostRegistry {
    let mut registry = HostRegistry::new();
    registry.register(
        0,
        HostFunction::new("print", |ctx, args| {
            ctx.print_output.push(args[0].to_compact_string());
            Ok(Value::make_void())
        }),
    );
    registry.register(
        1,
        HostFunction::new("assert", |_ctx, args| {
            if args[0].get_bool_value()? {
                Ok(Value::make_void())
            } else {
                Err(FloydError::eval("Floyd assertion failed"))
            }
        }),
    );
    registry.register(
        2,
        HostFunction::new("to_string", |_ctx, args| {
            Ok(Value::make_string(args[0].to_compact_string()))
        }),
    );
    registry.register(
        3,
        HostFunction::new("size", |_ctx, args| {
            let n = match &args[0] {
                Value::String(s) => s.len() as i64,
                Value::Vector(v) => v.elements.len() as i64,
                Value::Dict(d) => d.entries.len() as i64,
                Value::Json(j) => match &**j {
                    serde_json::Value::Array(a) => a.len() as i64,
                    serde_json::Value::Object(o) => o.len() as i64,
                    serde_json::Value::String(s) => s.len() as i64,
                    other => {
                        return Err(FloydError::type_mismatch(
                            "json array/object/string",
                            other.to_string(),
                        ))
                    }
                },
                other => {
                    return Err(FloydError::type_mismatch(
                        "string, vector, dict or json",
                        other.type_name(),
                    ))
                }
            };
            Ok(Value::make_int(n))
        }),
    );
    registry.register(
        4,
        HostFunction::new("push_back", |_ctx, args| match &args[0] {
            Value::Vector(v) => {
                let mut elements = v.elements.clone();
                elements.push(args[1].clone());
                Ok(Value::make_vector(v.element_type.clone(), elements))
            }
            Value::String(s) => {
                let tail = args[1].get_string_value()?;
                let mut out = (**s).clone();
                out.push_str(tail);
                Ok(Value::make_string(out))
            }
            other => Err(FloydError::type_mismatch(
                "vector or string",
                other.type_name(),
            )),
        }),
    );
    registry.register(
        5,
        HostFunction::new("update", |_ctx, args| match &args[0] {
            Value::Vector(v) => {
                let index = args[1].get_int_value()?;
                if index < 0 || index as usize >= v.elements.len() {
                    return Err(FloydError::eval(format!(
                        "update: index {index} out of bounds (size {})",
                        v.elements.len()
                    )));
                }
                let mut elements = v.elements.clone();
                elements[index as usize] = args[2].clone();
                Ok(Value::make_vector(v.element_type.clone(), elements))
            }
            Value::Dict(d) => {
                let key = args[1].get_string_value()?;
                let mut entries = d.entries.clone();
                entries.insert(key.to_string(), args[2].clone());
                Ok(Value::make_dict(d.value_type.clone(), entries))
            }
            other => Err(FloydError::type_mismatch(
                "vector or dict",
                other.type_name(),
            )),
        }),
    );
    registry.register(
        6,
        HostFunction::new("exists", |_ctx, args| {
            let d = args[0].get_dict_value()?;
            let key = args[1].get_string_value()?;
            Ok(Value::make_bool(d.entries.contains_key(key)))
        }),
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: i64, args: &[Value]) -> Result<Value, FloydError> {
        let registry = default_host_registry();
        let mut print_output = Vec::new();
        let mut ctx = HostContext {
            print_output: &mut print_output,
        };
        registry.get(id).unwrap().call(&mut ctx, args)
    }

    #[test]
    fn test_print_appends_to_buffer() {
        let registry = default_host_registry();
        let mut print_output = Vec::new();
        let mut ctx = HostContext {
            print_output: &mut print_output,
        };
        let print = registry.get(0).unwrap();
        print.call(&mut ctx, &[Value::make_string("hello")]).unwrap();
        print.call(&mut ctx, &[Value::make_int(42)]).unwrap();
        assert_eq!(print_output, vec!["hello".to_string(), "42".to_string()]);
    }

    #[test]
    fn test_assert_fails_on_false() {
        assert!(call(1, &[Value::make_bool(true)]).is_ok());
        assert!(call(1, &[Value::make_bool(false)]).is_err());
        assert!(call(1, &[Value::make_int(0)]).is_err());
    }

    #[test]
    fn test_size() {
        let v = Value::make_vector(
            TypeDesc::Int,
            vec![Value::make_int(1), Value::make_int(2)],
        );
        assert_eq!(call(3, &[v]).unwrap(), Value::make_int(2));
        assert_eq!(
            call(3, &[Value::make_string("abc")]).unwrap(),
            Value::make_int(3)
        );
        assert!(call(3, &[Value::make_int(1)]).is_err());
    }

    #[test]
    fn test_push_back_is_nonmutating() {
        let v = Value::make_vector(TypeDesc::Int, vec![Value::make_int(1)]);
        let v2 = call(4, &[v.clone(), Value::make_int(2)]).unwrap();
        assert_eq!(v.get_vector_value().unwrap().elements.len(), 1);
        assert_eq!(v2.get_vector_value().unwrap().elements.len(), 2);
    }

    #[test]
    fn test_update_dict_and_vector() {
        let d = Value::make_dict(
            TypeDesc::Int,
            [("a".to_string(), Value::make_int(1))].into_iter().collect(),
        );
        let d2 = call(5, &[d, Value::make_string("b"), Value::make_int(2)]).unwrap();
        assert_eq!(d2.get_dict_value().unwrap().entries.len(), 2);

        let v = Value::make_vector(TypeDesc::Int, vec![Value::make_int(1)]);
        let v2 = call(5, &[v, Value::make_int(0), Value::make_int(9)]).unwrap();
        assert_eq!(
            v2.get_vector_value().unwrap().elements[0],
            Value::make_int(9)
        );
        let v3 = Value::make_vector(TypeDesc::Int, vec![]);
        assert!(call(5, &[v3, Value::make_int(0), Value::make_int(9)]).is_err());
    }

    #[test]
    fn test_exists() {
        let d = Value::make_dict(
            TypeDesc::Int,
            [("a".to_string(), Value::make_int(1))].into_iter().collect(),
        );
        assert_eq!(
            call(6, &[d.clone(), Value::make_string("a")]).unwrap(),
            Value::make_bool(true)
        );
        assert_eq!(
            call(6, &[d, Value::make_string("zz")]).unwrap(),
            Value::make_bool(false)
        );
    }

    #[test]
    fn test_default_defs_align_with_registry() {
        let defs = default_host_defs();
        let registry = default_host_registry();
        for def in &defs {
            let id = def.host_function_id.unwrap();
            assert_eq!(registry.get(id).unwrap().name, def.name);
        }
    }
}
