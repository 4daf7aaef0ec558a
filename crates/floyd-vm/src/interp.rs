//! The execution engine: walks a resolved program statement by
//! statement against a shared value stack.
//!
//! Each executing body pushes an `Environment` (a base offset into the
//! value stack); resolved addresses walk this frame chain. The only
//! mutable state in the whole system lives here — program, bodies and
//! symbol tables are read-only during execution.

use std::rc::Rc;

use floyd_core::{
    compare_value_deep, ArithOp, Body, CompareOp, Expression, FloydError, LogicalOp, RangeKind,
    Statement, StatementKind, TypeDesc, Value, VariableAddress,
};

use crate::bcvalue::{bc_to_value, value_to_bc, BcValue};
use crate::host::{HostContext, HostRegistry};
use crate::program::BcProgram;

/// The outcome of executing one statement (or a whole body).
///
/// `ReturnUnwind` unwinds every enclosing body up to the call boundary
/// without executing further sibling statements. `Passive` is the value
/// of a bare expression statement — observable only at the top level,
/// where a REPL would echo it.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    None,
    ReturnUnwind(BcValue),
    Passive(BcValue),
}

/// A stack frame: the base offset of its slots in the shared value stack.
#[derive(Debug, Clone, Copy)]
struct Environment {
    values_offset: usize,
}

/// The interpreter state. A plain value: cloning it snapshots the whole
/// execution state (the host registry is shared, everything else is
/// copied with shared immutable payloads).
#[derive(Debug, Clone)]
pub struct Interpreter {
    program: Rc<BcProgram>,
    value_stack: Vec<BcValue>,
    call_stack: Vec<Environment>,
    print_output: Vec<String>,
    host: HostRegistry,
}

impl Interpreter {
    pub fn new(program: Rc<BcProgram>, host: HostRegistry) -> Self {
        Interpreter {
            program,
            value_stack: Vec::with_capacity(256),
            call_stack: Vec::with_capacity(16),
            print_output: Vec::new(),
            host,
        }
    }

    pub fn program(&self) -> &BcProgram {
        &self.program
    }

    /// Execute the global statements. The global frame stays on the call
    /// stack afterwards so globals remain addressable.
    pub fn run_globals(&mut self) -> Result<StatementResult, FloydError> {
        if !self.call_stack.is_empty() {
            return Err(FloydError::eval("globals already executed"));
        }
        let program = self.program.clone();
        self.push_frame(&program.globals, Vec::new());
        self.execute_statements(&program.globals.statements)
    }

    /// Read a global by name. Fails before `run_globals` has run.
    pub fn get_global(&self, name: &str) -> Result<Value, FloydError> {
        let env = self
            .call_stack
            .first()
            .ok_or_else(|| FloydError::eval("globals have not been executed"))?;
        let (slot, _) = self
            .program
            .globals
            .symbols
            .find(name)
            .ok_or_else(|| FloydError::Unbound(name.to_string()))?;
        Ok(bc_to_value(&self.value_stack[env.values_offset + slot]))
    }

    /// Call a function value with model-value arguments. This is the
    /// public entry used by drivers and host callbacks.
    pub fn call_function(&mut self, f: &Value, args: &[Value]) -> Result<Value, FloydError> {
        let func = f.get_function_value()?;
        let args: Vec<BcValue> = args.iter().map(value_to_bc).collect();
        let result = self.call_function_by_id(func.function_id, args)?;
        Ok(bc_to_value(&result))
    }

    /// The ordered print buffer appended to by executed code.
    pub fn print_output(&self) -> &[String] {
        &self.print_output
    }

    /// Drain the print buffer.
    pub fn take_print_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.print_output)
    }

    // --- Frames ---

    fn push_frame(&mut self, body: &Body, init: Vec<BcValue>) {
        let values_offset = self.value_stack.len();
        let mut init = init.into_iter();
        for (_, symbol) in &body.symbols.symbols {
            match init.next() {
                Some(v) => self.value_stack.push(v),
                None => self.value_stack.push(value_to_bc(&symbol.init)),
            }
        }
        self.call_stack.push(Environment { values_offset });
    }

    fn pop_frame(&mut self) {
        let env = self.call_stack.pop().expect("unbalanced frame pop");
        self.value_stack.truncate(env.values_offset);
    }

    fn slot_of(&self, address: VariableAddress) -> Result<usize, FloydError> {
        let env = if address.parent_steps == VariableAddress::GLOBAL_STEPS {
            self.call_stack.first()
        } else {
            self.call_stack
                .len()
                .checked_sub(1 + address.parent_steps as usize)
                .and_then(|i| self.call_stack.get(i))
        }
        .ok_or_else(|| {
            FloydError::eval(format!(
                "invalid variable address ({}, {})",
                address.parent_steps, address.index
            ))
        })?;
        Ok(env.values_offset + address.index as usize)
    }

    // --- Statements ---

    fn execute_body(
        &mut self,
        body: &Body,
        init: Vec<BcValue>,
    ) -> Result<StatementResult, FloydError> {
        self.push_frame(body, init);
        let result = self.execute_statements(&body.statements);
        self.pop_frame();
        result
    }

    fn execute_statements(
        &mut self,
        statements: &[Statement],
    ) -> Result<StatementResult, FloydError> {
        let mut last_passive = StatementResult::None;
        for statement in statements {
            match self.execute_statement(statement)? {
                r @ StatementResult::ReturnUnwind(_) => return Ok(r),
                r @ StatementResult::Passive(_) => last_passive = r,
                StatementResult::None => {}
            }
        }
        Ok(last_passive)
    }

    fn execute_statement(&mut self, statement: &Statement) -> Result<StatementResult, FloydError> {
        match &statement.kind {
            StatementKind::Return(expr) => {
                let v = self.evaluate_expression(expr)?;
                Ok(StatementResult::ReturnUnwind(v))
            }
            StatementKind::Init2 { address, expr } | StatementKind::Assign2 { address, expr } => {
                let v = self.evaluate_expression(expr)?;
                let slot = self.slot_of(*address)?;
                self.value_stack[slot] = v;
                Ok(StatementResult::None)
            }
            StatementKind::Block(body) => self.execute_body(body, Vec::new()),
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let cond = self.evaluate_expression(condition)?.get_bool()?;
                if cond {
                    self.execute_body(then_body, Vec::new())
                } else {
                    self.execute_body(else_body, Vec::new())
                }
            }
            StatementKind::For {
                start,
                end,
                body,
                range,
                ..
            } => {
                let start = self.evaluate_expression(start)?.get_int()?;
                let end = self.evaluate_expression(end)?.get_int()?;
                let last = match range {
                    RangeKind::Closed => Some(end),
                    RangeKind::Open => end.checked_sub(1),
                };
                let Some(last) = last else {
                    return Ok(StatementResult::None);
                };
                let mut i = start;
                while i <= last {
                    let r = self.execute_body(body, vec![BcValue::Int(i)])?;
                    if let StatementResult::ReturnUnwind(_) = r {
                        return Ok(r);
                    }
                    if i == last {
                        break;
                    }
                    i += 1;
                }
                Ok(StatementResult::None)
            }
            StatementKind::While { condition, body } => {
                loop {
                    let cond = self.evaluate_expression(condition)?.get_bool()?;
                    if !cond {
                        break;
                    }
                    let r = self.execute_body(body, Vec::new())?;
                    if let StatementResult::ReturnUnwind(_) = r {
                        return Ok(r);
                    }
                }
                Ok(StatementResult::None)
            }
            StatementKind::Expression(expr) => {
                let v = self.evaluate_expression(expr)?;
                Ok(StatementResult::Passive(v))
            }
            StatementKind::SoftwareSystem(_) | StatementKind::ContainerDef(_) => {
                Ok(StatementResult::None)
            }
            StatementKind::DefineStruct { .. }
            | StatementKind::DefineFunction { .. }
            | StatementKind::BindLocal { .. }
            | StatementKind::Assign { .. } => Err(FloydError::eval(
                "name-based statement reached execution; run the resolution pass first",
            )),
        }
    }

    // --- Expressions ---

    fn evaluate_expression(&mut self, expr: &Expression) -> Result<BcValue, FloydError> {
        match expr {
            Expression::Literal(v) => Ok(value_to_bc(v)),
            Expression::LoadAddress { address, .. } => {
                let slot = self.slot_of(*address)?;
                Ok(self.value_stack[slot].clone())
            }
            Expression::Load { name } => Err(FloydError::eval(format!(
                "unresolved variable reference '{name}'; run the resolution pass first"
            ))),
            Expression::ResolveMember {
                parent,
                member_name,
                ..
            } => {
                let parent = self.evaluate_expression(parent)?;
                match &parent {
                    BcValue::Struct(s) => {
                        let index = s.def.find_member(member_name).ok_or_else(|| {
                            FloydError::eval(format!("unknown struct member '{member_name}'"))
                        })?;
                        Ok(s.members[index].clone())
                    }
                    other => Err(FloydError::type_mismatch("struct", other.type_name())),
                }
            }
            Expression::LookupElement { parent, key, .. } => {
                let parent = self.evaluate_expression(parent)?;
                let key = self.evaluate_expression(key)?;
                self.lookup_element(&parent, &key)
            }
            Expression::Call { callee, args, .. } => {
                let callee = self.evaluate_expression(callee)?;
                let func = callee.get_function()?.clone();
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(self.evaluate_expression(a)?);
                }
                self.call_function_by_id(func.function_id, arg_values)
            }
            Expression::UnaryMinus { expr, .. } => {
                match self.evaluate_expression(expr)? {
                    BcValue::Int(n) => Ok(BcValue::Int(n.wrapping_neg())),
                    BcValue::Double(d) => Ok(BcValue::Double(-d)),
                    other => Err(FloydError::type_mismatch("number", other.type_name())),
                }
            }
            Expression::Arithmetic {
                op, left, right, ..
            } => {
                let a = self.evaluate_expression(left)?;
                let b = self.evaluate_expression(right)?;
                bc_arithmetic(*op, &a, &b)
            }
            Expression::Comparison { op, left, right } => {
                let a = self.evaluate_expression(left)?;
                let b = self.evaluate_expression(right)?;
                bc_comparison(*op, &a, &b)
            }
            Expression::Logical { op, left, right } => {
                let a = self.evaluate_expression(left)?.get_bool()?;
                match (op, a) {
                    (LogicalOp::And, false) => Ok(BcValue::Bool(false)),
                    (LogicalOp::Or, true) => Ok(BcValue::Bool(true)),
                    _ => Ok(BcValue::Bool(self.evaluate_expression(right)?.get_bool()?)),
                }
            }
            Expression::Conditional {
                condition, a, b, ..
            } => {
                if self.evaluate_expression(condition)?.get_bool()? {
                    self.evaluate_expression(a)
                } else {
                    self.evaluate_expression(b)
                }
            }
            Expression::ConstructValue { value_type, args } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for a in args {
                    arg_values.push(bc_to_value(&self.evaluate_expression(a)?));
                }
                let value = construct_value_from_typeid(value_type, &arg_values)?;
                Ok(value_to_bc(&value))
            }
            Expression::FunctionDefinition(def) => Err(FloydError::eval(format!(
                "unresolved function definition '{}'; run the resolution pass first",
                def.name
            ))),
        }
    }

    fn lookup_element(&self, parent: &BcValue, key: &BcValue) -> Result<BcValue, FloydError> {
        match parent {
            BcValue::Vector(v) => {
                let index = key.get_int()?;
                if index < 0 || index as usize >= v.elements.len() {
                    return Err(FloydError::eval(format!(
                        "lookup in vector: index {index} out of bounds (size {})",
                        v.elements.len()
                    )));
                }
                Ok(v.elements[index as usize].clone())
            }
            BcValue::Dict(d) => {
                let k = key.get_string()?;
                d.entries.get(k).cloned().ok_or_else(|| {
                    FloydError::eval(format!("lookup in dict: unknown key '{k}'"))
                })
            }
            BcValue::String(s) => {
                let index = key.get_int()?;
                let bytes = s.as_bytes();
                if index < 0 || index as usize >= bytes.len() {
                    return Err(FloydError::eval(format!(
                        "lookup in string: index {index} out of bounds (size {})",
                        bytes.len()
                    )));
                }
                Ok(BcValue::Int(bytes[index as usize] as i64))
            }
            BcValue::Json(j) => match (&**j, key) {
                (serde_json::Value::Array(items), BcValue::Int(index)) => {
                    if *index < 0 || *index as usize >= items.len() {
                        return Err(FloydError::eval(format!(
                            "lookup in json array: index {index} out of bounds (size {})",
                            items.len()
                        )));
                    }
                    Ok(BcValue::Json(Rc::new(items[*index as usize].clone())))
                }
                (serde_json::Value::Object(obj), BcValue::String(k)) => obj
                    .get(&**k)
                    .map(|v| BcValue::Json(Rc::new(v.clone())))
                    .ok_or_else(|| {
                        FloydError::eval(format!("lookup in json object: unknown key '{k}'"))
                    }),
                (_, key) => Err(FloydError::type_mismatch(
                    "json array with int key or json object with string key",
                    format!("{} with {} key", parent.type_name(), key.type_name()),
                )),
            },
            other => Err(FloydError::type_mismatch(
                "vector, dict, string or json",
                other.type_name(),
            )),
        }
    }

    // --- Calls ---

    fn call_function_by_id(
        &mut self,
        function_id: i64,
        args: Vec<BcValue>,
    ) -> Result<BcValue, FloydError> {
        let def = self
            .program
            .function_defs
            .get(function_id as usize)
            .cloned()
            .ok_or_else(|| FloydError::eval(format!("unknown function id {function_id}")))?;

        if args.len() != def.params.len() {
            let name = if def.name.is_empty() {
                "<lambda>".to_string()
            } else {
                def.name.clone()
            };
            return Err(FloydError::arity(name, def.params.len(), args.len()));
        }

        if let Some(host_id) = def.host_function_id {
            let host = self.host.get(host_id).ok_or_else(|| {
                FloydError::eval(format!(
                    "host function '{}' (id {host_id}) is not registered",
                    def.name
                ))
            })?;
            let args: Vec<Value> = args.iter().map(bc_to_value).collect();
            let mut ctx = HostContext {
                print_output: &mut self.print_output,
            };
            let result = host.call(&mut ctx, &args)?;
            Ok(value_to_bc(&result))
        } else {
            let body = def
                .body
                .clone()
                .ok_or_else(|| FloydError::eval(format!("function '{}' has no body", def.name)))?;
            match self.execute_body(&body, args)? {
                StatementResult::ReturnUnwind(v) => Ok(v),
                // A body that falls through returns nothing.
                _ => Ok(BcValue::Undefined),
            }
        }
    }
}

// --- Operators ---

// Floyd is strictly typed: operands must share one type. No implicit
// int/double coercion.
fn bc_arithmetic(op: ArithOp, a: &BcValue, b: &BcValue) -> Result<BcValue, FloydError> {
    match (op, a, b) {
        (ArithOp::Add, BcValue::Int(x), BcValue::Int(y)) => Ok(BcValue::Int(x.wrapping_add(*y))),
        (ArithOp::Add, BcValue::Double(x), BcValue::Double(y)) => Ok(BcValue::Double(x + y)),
        (ArithOp::Add, BcValue::String(x), BcValue::String(y)) => {
            let mut s = (**x).clone();
            s.push_str(y);
            Ok(BcValue::String(Rc::new(s)))
        }
        (ArithOp::Add, BcValue::Vector(x), BcValue::Vector(y)) => {
            if x.element_type != y.element_type {
                return Err(FloydError::incomparable(
                    TypeDesc::make_vector(x.element_type.clone()).to_string(),
                    TypeDesc::make_vector(y.element_type.clone()).to_string(),
                ));
            }
            let mut elements = x.elements.clone();
            elements.append(y.elements.clone());
            Ok(BcValue::Vector(Rc::new(crate::bcvalue::BcVectorValue {
                element_type: x.element_type.clone(),
                elements,
            })))
        }
        (ArithOp::Sub, BcValue::Int(x), BcValue::Int(y)) => Ok(BcValue::Int(x.wrapping_sub(*y))),
        (ArithOp::Sub, BcValue::Double(x), BcValue::Double(y)) => Ok(BcValue::Double(x - y)),
        (ArithOp::Mul, BcValue::Int(x), BcValue::Int(y)) => Ok(BcValue::Int(x.wrapping_mul(*y))),
        (ArithOp::Mul, BcValue::Double(x), BcValue::Double(y)) => Ok(BcValue::Double(x * y)),
        (ArithOp::Div, BcValue::Int(_), BcValue::Int(0)) => Err(FloydError::DivideByZero),
        (ArithOp::Div, BcValue::Int(x), BcValue::Int(y)) => Ok(BcValue::Int(x / y)),
        // IEEE: double division by zero yields inf/NaN, never an error.
        (ArithOp::Div, BcValue::Double(x), BcValue::Double(y)) => Ok(BcValue::Double(x / y)),
        (ArithOp::Rem, BcValue::Int(_), BcValue::Int(0)) => Err(FloydError::DivideByZero),
        (ArithOp::Rem, BcValue::Int(x), BcValue::Int(y)) => Ok(BcValue::Int(x % y)),
        (op, a, b) => Err(FloydError::type_mismatch(
            format!("matching operands for '{}'", op.token()),
            format!("{} and {}", a.type_name(), b.type_name()),
        )),
    }
}

fn bc_comparison(op: CompareOp, a: &BcValue, b: &BcValue) -> Result<BcValue, FloydError> {
    if a.get_type() != b.get_type() {
        return Err(FloydError::incomparable(
            a.get_type().to_string(),
            b.get_type().to_string(),
        ));
    }
    match op {
        // Equality never orders; json and function values support it
        // even though they have no deep ordering.
        CompareOp::Eq => Ok(BcValue::Bool(a == b)),
        CompareOp::Ne => Ok(BcValue::Bool(a != b)),
        _ => {
            let ordering = compare_value_deep(&bc_to_value(a), &bc_to_value(b))?;
            let result = match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            };
            Ok(BcValue::Bool(result))
        }
    }
}

/// Type-directed construction of a value from an argument list: identity
/// or coercion for scalars and json, an arity-checked member list for
/// structs, the argument list itself for vectors, alternating key/value
/// arguments for dicts.
pub fn construct_value_from_typeid(
    value_type: &TypeDesc,
    args: &[Value],
) -> Result<Value, FloydError> {
    match value_type {
        TypeDesc::Json => {
            expect_construct_arity(value_type, args, 1)?;
            match &args[0] {
                Value::Json(_) => Ok(args[0].clone()),
                other => Ok(Value::make_json(floyd_core::json::value_to_json(
                    other,
                    floyd_core::TypeJsonMode::Resolved,
                )?)),
            }
        }
        TypeDesc::Bool | TypeDesc::Int | TypeDesc::Double | TypeDesc::Typeid => {
            expect_construct_arity(value_type, args, 1)?;
            if args[0].get_type() == *value_type {
                Ok(args[0].clone())
            } else {
                Err(FloydError::type_mismatch(
                    value_type.to_string(),
                    args[0].type_name(),
                ))
            }
        }
        TypeDesc::String => {
            expect_construct_arity(value_type, args, 1)?;
            match &args[0] {
                Value::String(_) => Ok(args[0].clone()),
                // json("...") unwraps to the plain string.
                Value::Json(j) => match &**j {
                    serde_json::Value::String(s) => Ok(Value::make_string(s.clone())),
                    other => Err(FloydError::type_mismatch("json string", other.to_string())),
                },
                other => Err(FloydError::type_mismatch("string", other.type_name())),
            }
        }
        TypeDesc::Struct(def) => {
            if args.len() != def.members.len() {
                return Err(FloydError::arity(
                    value_type.to_string(),
                    def.members.len(),
                    args.len(),
                ));
            }
            for (m, v) in def.members.iter().zip(args.iter()) {
                if v.get_type() != m.member_type {
                    return Err(FloydError::type_mismatch(
                        m.member_type.to_string(),
                        v.type_name(),
                    ));
                }
            }
            Ok(Value::make_struct(def.clone(), args.to_vec()))
        }
        TypeDesc::Vector(element_type) => {
            for v in args {
                if v.get_type() != **element_type {
                    return Err(FloydError::type_mismatch(
                        element_type.to_string(),
                        v.type_name(),
                    ));
                }
            }
            Ok(Value::make_vector((**element_type).clone(), args.to_vec()))
        }
        TypeDesc::Dict(dict_value_type) => {
            if args.len() % 2 != 0 {
                return Err(FloydError::eval(
                    "dict construction needs alternating key, value arguments",
                ));
            }
            let mut entries = std::collections::BTreeMap::new();
            for pair in args.chunks(2) {
                let key = pair[0].get_string_value()?;
                if pair[1].get_type() != **dict_value_type {
                    return Err(FloydError::type_mismatch(
                        dict_value_type.to_string(),
                        pair[1].type_name(),
                    ));
                }
                entries.insert(key.to_string(), pair[1].clone());
            }
            Ok(Value::make_dict((**dict_value_type).clone(), entries))
        }
        other => Err(FloydError::eval(format!(
            "cannot construct a value of type {other}"
        ))),
    }
}

fn expect_construct_arity(
    value_type: &TypeDesc,
    args: &[Value],
    expected: usize,
) -> Result<(), FloydError> {
    if args.len() != expected {
        return Err(FloydError::arity(
            value_type.to_string(),
            expected,
            args.len(),
        ));
    }
    Ok(())
}

/// Execute a resolved program: run the global statements, then call the
/// global `main` if one exists. Without a `main` the globals still ran
/// for their side effects and the result is `undefined`.
pub fn run_program(
    program: BcProgram,
    host: HostRegistry,
    main_args: &[Value],
) -> Result<(Interpreter, Value), FloydError> {
    let mut interp = Interpreter::new(Rc::new(program), host);
    interp.run_globals()?;

    let main = interp.program.globals.symbols.find("main").map(|_| ());
    if main.is_none() {
        return Ok((interp, Value::make_undefined()));
    }
    let f = interp.get_global("main")?;
    let func = f.get_function_value()?;
    let def = interp
        .program
        .function_defs
        .get(func.function_id as usize)
        .cloned()
        .ok_or_else(|| FloydError::eval("main has an unknown function id"))?;
    let result = if def.params.is_empty() {
        interp.call_function(&f, &[])?
    } else {
        interp.call_function(&f, main_args)?
    };
    Ok((interp, result))
}
