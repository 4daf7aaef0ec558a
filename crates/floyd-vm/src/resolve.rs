//! The address resolution pass: the bridge between the name-based AST the
//! front end produces and the slot-based AST the interpreter executes.
//!
//! One walk over the program (a) collects binds, function definitions and
//! struct definitions into each body's symbol table, (b) rewrites
//! `BindLocal` → `Init2`, `Assign` → `Assign2` and `Load` →
//! `LoadAddress` with `(parent_steps, index)` addresses, (c) extracts
//! function definitions into a flat id-indexed table, and (d) rejects
//! unknown names, redefinition and assignment to immutables.
//!
//! Addresses are relative to the lexical scope chain. Functions do not
//! capture enclosing function locals — a name inside a function body
//! resolves either within that function's own scopes or straight to the
//! global scope (`parent_steps == -1`).

use std::rc::Rc;

use floyd_core::{
    Body, Expression, FloydError, FunctionDef, Member, Mutability, Statement, StatementKind,
    Symbol, SymbolTable, TypeDesc, Value, VariableAddress,
};

use crate::program::BcProgram;

struct Scope {
    names: hashbrown::HashMap<String, usize>,
    table: SymbolTable,
    is_function_boundary: bool,
}

impl Scope {
    fn new(is_function_boundary: bool) -> Self {
        Scope {
            names: hashbrown::HashMap::new(),
            table: SymbolTable::new(),
            is_function_boundary,
        }
    }
}

struct Resolver {
    scopes: Vec<Scope>,
    function_defs: Vec<Rc<FunctionDef>>,
}

/// Resolve a program against the given host-function signatures. Host
/// functions are seeded into the global scope first, so their ids are
/// their positions in `host_defs`.
pub fn resolve_program(
    globals: &Body,
    host_defs: &[FunctionDef],
) -> Result<BcProgram, FloydError> {
    let mut resolver = Resolver {
        scopes: vec![Scope::new(true)],
        function_defs: Vec::new(),
    };

    for def in host_defs {
        if def.host_function_id.is_none() {
            return Err(FloydError::eval(format!(
                "host signature '{}' has no host function id",
                def.name
            )));
        }
        let id = resolver.function_defs.len() as i64;
        resolver.function_defs.push(Rc::new(def.clone()));
        resolver.define(
            &def.name,
            Symbol::make_constant(Value::make_function(def.func_type.clone(), id)),
        )?;
    }

    let statements = resolver.resolve_statements(&globals.statements)?;
    let table = resolver.scopes.pop().expect("global scope").table;
    let program = BcProgram {
        globals: Body::with_symbols(statements, table),
        function_defs: resolver.function_defs,
    };

    if !program.check_types_resolved() {
        return Err(FloydError::eval(
            "program contains unresolved types after resolution",
        ));
    }
    Ok(program)
}

impl Resolver {
    fn current_scope(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack never empty")
    }

    fn define(&mut self, name: &str, symbol: Symbol) -> Result<usize, FloydError> {
        let scope = self.current_scope();
        if scope.names.contains_key(name) {
            return Err(FloydError::eval(format!("'{name}' is already defined")));
        }
        let slot = scope.table.add(name, symbol);
        scope.names.insert(name.to_string(), slot);
        Ok(slot)
    }

    /// The address of a slot just defined in the current scope.
    fn current_scope_address(&self, slot: usize) -> VariableAddress {
        if self.scopes.len() == 1 {
            VariableAddress::new(VariableAddress::GLOBAL_STEPS, slot as i32)
        } else {
            VariableAddress::new(0, slot as i32)
        }
    }

    /// Walk the scope chain for a name. Stops at the innermost function
    /// boundary, then falls through to the global scope.
    fn lookup(&self, name: &str) -> Option<(VariableAddress, Symbol)> {
        let mut steps = 0i32;
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if i == 0 {
                break;
            }
            if let Some(&slot) = scope.names.get(name) {
                return Some((
                    VariableAddress::new(steps, slot as i32),
                    scope.table.symbols[slot].1.clone(),
                ));
            }
            if scope.is_function_boundary {
                break;
            }
            steps += 1;
        }
        let scope = &self.scopes[0];
        scope.names.get(name).map(|&slot| {
            (
                VariableAddress::new(VariableAddress::GLOBAL_STEPS, slot as i32),
                scope.table.symbols[slot].1.clone(),
            )
        })
    }

    /// Replace named type identifiers with the concrete types their
    /// struct definitions introduced.
    fn resolve_type(&self, t: &TypeDesc) -> Result<TypeDesc, FloydError> {
        match t {
            TypeDesc::Unresolved(name) => {
                let (_, symbol) = self
                    .lookup(name)
                    .ok_or_else(|| FloydError::eval(format!("unknown type '{name}'")))?;
                match &symbol.init {
                    Value::Typeid(inner) => Ok((**inner).clone()),
                    _ => Err(FloydError::eval(format!("'{name}' is not a type"))),
                }
            }
            TypeDesc::Vector(e) => Ok(TypeDesc::make_vector(self.resolve_type(e)?)),
            TypeDesc::Dict(v) => Ok(TypeDesc::make_dict(self.resolve_type(v)?)),
            TypeDesc::Function { ret, params } => {
                let params: Result<Vec<TypeDesc>, FloydError> =
                    params.iter().map(|p| self.resolve_type(p)).collect();
                Ok(TypeDesc::make_function(self.resolve_type(ret)?, params?))
            }
            TypeDesc::Struct(def) => {
                let members: Result<Vec<Member>, FloydError> = def
                    .members
                    .iter()
                    .map(|m| {
                        Ok(Member::new(
                            self.resolve_type(&m.member_type)?,
                            m.name.clone(),
                        ))
                    })
                    .collect();
                Ok(TypeDesc::make_struct(Rc::new(
                    floyd_core::StructDef::new(members?),
                )))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_members(&self, members: &[Member]) -> Result<Vec<Member>, FloydError> {
        members
            .iter()
            .map(|m| {
                Ok(Member::new(
                    self.resolve_type(&m.member_type)?,
                    m.name.clone(),
                ))
            })
            .collect()
    }

    /// Register a function definition: reserve its id, then resolve its
    /// body in a fresh function-boundary scope with the parameters bound
    /// to the leading slots.
    fn register_function(&mut self, def: &FunctionDef) -> Result<(i64, TypeDesc), FloydError> {
        let params = self.resolve_members(&def.params)?;
        let return_type = self.resolve_type(&def.return_type)?;
        let func_type = TypeDesc::make_function(
            return_type.clone(),
            params.iter().map(|p| p.member_type.clone()).collect(),
        );

        let id = self.function_defs.len() as i64;
        match (&def.body, def.host_function_id) {
            (Some(body), None) => {
                // Reserve the slot before resolving the body so nested
                // definitions get later ids and recursion can resolve.
                self.function_defs.push(Rc::new(FunctionDef {
                    name: def.name.clone(),
                    func_type: func_type.clone(),
                    params: params.clone(),
                    body: None,
                    host_function_id: None,
                    return_type: return_type.clone(),
                }));
                let body = self.resolve_function_body(body, &params)?;
                self.function_defs[id as usize] = Rc::new(FunctionDef {
                    name: def.name.clone(),
                    func_type: func_type.clone(),
                    params,
                    body: Some(Rc::new(body)),
                    host_function_id: None,
                    return_type,
                });
            }
            (None, Some(host_id)) => {
                self.function_defs.push(Rc::new(FunctionDef {
                    name: def.name.clone(),
                    func_type: func_type.clone(),
                    params,
                    body: None,
                    host_function_id: Some(host_id),
                    return_type,
                }));
            }
            _ => {
                return Err(FloydError::eval(format!(
                    "function '{}' must have exactly one of body, host id",
                    def.name
                )))
            }
        }
        Ok((id, func_type))
    }

    fn resolve_function_body(
        &mut self,
        body: &Body,
        params: &[Member],
    ) -> Result<Body, FloydError> {
        self.resolve_child_body(body, params, true)
    }

    fn resolve_child_body(
        &mut self,
        body: &Body,
        params: &[Member],
        is_function_boundary: bool,
    ) -> Result<Body, FloydError> {
        self.scopes.push(Scope::new(is_function_boundary));
        let result = (|| {
            for p in params {
                self.define(&p.name, Symbol::make_immutable(p.member_type.clone()))?;
            }
            self.resolve_statements(&body.statements)
        })();
        let scope = self.scopes.pop().expect("child scope");
        Ok(Body::with_symbols(result?, scope.table))
    }

    fn resolve_statements(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<Statement>, FloydError> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            if let Some(resolved) = self.resolve_statement(statement)? {
                out.push(resolved);
            }
        }
        Ok(out)
    }

    /// Returns `None` for definition statements — they live on as symbol
    /// table constants, not as executable statements.
    fn resolve_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Option<Statement>, FloydError> {
        let location = statement.location;
        match &statement.kind {
            StatementKind::DefineFunction { name, def } => {
                // Define the name first so the body can recurse into it.
                let params = self.resolve_members(&def.params)?;
                let return_type = self.resolve_type(&def.return_type)?;
                let func_type = TypeDesc::make_function(
                    return_type,
                    params.iter().map(|p| p.member_type.clone()).collect(),
                );
                let id = self.function_defs.len() as i64;
                self.define(
                    name,
                    Symbol::make_constant(Value::make_function(func_type, id)),
                )?;
                self.register_function(def)?;
                Ok(None)
            }
            StatementKind::DefineStruct { name, def } => {
                let members = self.resolve_members(&def.members)?;
                let resolved = TypeDesc::make_struct(Rc::new(floyd_core::StructDef::new(members)));
                self.define(name, Symbol::make_constant(Value::make_typeid(resolved)))?;
                Ok(None)
            }
            StatementKind::BindLocal {
                name,
                bind_type,
                expr,
                mutability,
            } => {
                // The initializer resolves before the name exists, so
                // `let x = x` refers to an outer x, not itself.
                let expr = self.resolve_expression(expr)?;
                let mut value_type = self.resolve_type(bind_type)?;
                if value_type.is_undefined() {
                    value_type = expr.result_type();
                }
                let symbol = match mutability {
                    Mutability::Immutable => Symbol::make_immutable(value_type),
                    Mutability::Mutable => Symbol::make_mutable(value_type),
                };
                let slot = self.define(name, symbol)?;
                Ok(Some(Statement::make_init2(
                    location,
                    self.current_scope_address(slot),
                    expr,
                )))
            }
            StatementKind::Assign { name, expr } => {
                let expr = self.resolve_expression(expr)?;
                let (address, symbol) = self
                    .lookup(name)
                    .ok_or_else(|| FloydError::Unbound(name.clone()))?;
                if symbol.mutability == Mutability::Immutable {
                    return Err(FloydError::eval(format!(
                        "cannot assign to immutable '{name}'"
                    )));
                }
                Ok(Some(Statement::make_assign2(location, address, expr)))
            }
            StatementKind::Assign2 { address, expr } => Ok(Some(Statement::make_assign2(
                location,
                *address,
                self.resolve_expression(expr)?,
            ))),
            StatementKind::Init2 { address, expr } => Ok(Some(Statement::make_init2(
                location,
                *address,
                self.resolve_expression(expr)?,
            ))),
            StatementKind::Return(expr) => Ok(Some(Statement::make_return(
                location,
                self.resolve_expression(expr)?,
            ))),
            StatementKind::Block(body) => {
                let body = self.resolve_child_body(body, &[], false)?;
                Ok(Some(Statement::make_block(location, body)))
            }
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.resolve_expression(condition)?;
                let then_body = self.resolve_child_body(then_body, &[], false)?;
                let else_body = self.resolve_child_body(else_body, &[], false)?;
                Ok(Some(Statement::make_ifelse(
                    location, condition, then_body, else_body,
                )))
            }
            StatementKind::For {
                iterator_name,
                start,
                end,
                body,
                range,
            } => {
                let start = self.resolve_expression(start)?;
                let end = self.resolve_expression(end)?;
                let iterator = Member::new(TypeDesc::Int, iterator_name.clone());
                let body = self.resolve_child_body(body, &[iterator], false)?;
                Ok(Some(Statement::make_for(
                    location,
                    iterator_name.clone(),
                    start,
                    end,
                    body,
                    *range,
                )))
            }
            StatementKind::While { condition, body } => {
                let condition = self.resolve_expression(condition)?;
                let body = self.resolve_child_body(body, &[], false)?;
                Ok(Some(Statement::make_while(location, condition, body)))
            }
            StatementKind::Expression(expr) => Ok(Some(Statement::make_expression(
                location,
                self.resolve_expression(expr)?,
            ))),
            StatementKind::SoftwareSystem(_) | StatementKind::ContainerDef(_) => {
                Ok(Some(statement.clone()))
            }
        }
    }

    fn resolve_expression(&mut self, expr: &Expression) -> Result<Expression, FloydError> {
        match expr {
            Expression::Literal(_) | Expression::LoadAddress { .. } => Ok(expr.clone()),
            Expression::Load { name } => {
                let (address, symbol) = self
                    .lookup(name)
                    .ok_or_else(|| FloydError::Unbound(name.clone()))?;
                Ok(Expression::load_address(address, symbol.value_type))
            }
            Expression::ResolveMember {
                parent,
                member_name,
                result_type,
            } => {
                let parent = self.resolve_expression(parent)?;
                let result_type = if result_type.is_undefined() {
                    // Infer from the parent's struct type when the front
                    // end left the slot empty.
                    match parent.result_type() {
                        TypeDesc::Struct(def) => def
                            .find_member(member_name)
                            .map(|i| def.members[i].member_type.clone())
                            .unwrap_or(TypeDesc::Undefined),
                        _ => TypeDesc::Undefined,
                    }
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::resolve_member(
                    parent,
                    member_name.clone(),
                    result_type,
                ))
            }
            Expression::LookupElement {
                parent,
                key,
                result_type,
            } => {
                let parent = self.resolve_expression(parent)?;
                let key = self.resolve_expression(key)?;
                let result_type = if result_type.is_undefined() {
                    match parent.result_type() {
                        TypeDesc::Vector(e) => (*e).clone(),
                        TypeDesc::Dict(v) => (*v).clone(),
                        TypeDesc::String => TypeDesc::Int,
                        TypeDesc::Json => TypeDesc::Json,
                        _ => TypeDesc::Undefined,
                    }
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::lookup_element(parent, key, result_type))
            }
            Expression::Call {
                callee,
                args,
                result_type,
            } => {
                let callee = self.resolve_expression(callee)?;
                let args: Result<Vec<Expression>, FloydError> =
                    args.iter().map(|a| self.resolve_expression(a)).collect();
                let result_type = if result_type.is_undefined() {
                    match callee.result_type() {
                        TypeDesc::Function { ret, .. } => (*ret).clone(),
                        _ => TypeDesc::Undefined,
                    }
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::call(callee, args?, result_type))
            }
            Expression::UnaryMinus { expr, result_type } => {
                let expr = self.resolve_expression(expr)?;
                let result_type = if result_type.is_undefined() {
                    expr.result_type()
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::unary_minus(expr, result_type))
            }
            Expression::Arithmetic {
                op,
                left,
                right,
                result_type,
            } => {
                let left = self.resolve_expression(left)?;
                let right = self.resolve_expression(right)?;
                let result_type = if result_type.is_undefined() {
                    left.result_type()
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::arithmetic(*op, left, right, result_type))
            }
            Expression::Comparison { op, left, right } => Ok(Expression::comparison(
                *op,
                self.resolve_expression(left)?,
                self.resolve_expression(right)?,
            )),
            Expression::Logical { op, left, right } => Ok(Expression::logical(
                *op,
                self.resolve_expression(left)?,
                self.resolve_expression(right)?,
            )),
            Expression::Conditional {
                condition,
                a,
                b,
                result_type,
            } => {
                let condition = self.resolve_expression(condition)?;
                let a = self.resolve_expression(a)?;
                let b = self.resolve_expression(b)?;
                let result_type = if result_type.is_undefined() {
                    a.result_type()
                } else {
                    self.resolve_type(result_type)?
                };
                Ok(Expression::conditional(condition, a, b, result_type))
            }
            Expression::ConstructValue { value_type, args } => {
                let value_type = self.resolve_type(value_type)?;
                let args: Result<Vec<Expression>, FloydError> =
                    args.iter().map(|a| self.resolve_expression(a)).collect();
                Ok(Expression::construct_value(value_type, args?))
            }
            Expression::FunctionDefinition(def) => {
                let (id, func_type) = self.register_function(def)?;
                Ok(Expression::literal(Value::make_function(func_type, id)))
            }
        }
    }
}
