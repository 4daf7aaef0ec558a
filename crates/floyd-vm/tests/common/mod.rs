#![allow(dead_code)]

use std::rc::Rc;

use floyd_core::{
    Body, Expression, FloydError, FunctionDef, Location, Member, Mutability, Statement, TypeDesc,
    Value,
};
use floyd_vm::{default_host_defs, default_host_registry, resolve_program, run_program, Interpreter};

pub fn loc() -> Location {
    Location::none()
}

/// Resolve and execute a global statement list; returns the interpreter
/// and the program result (the result of `main`, or undefined).
pub fn run(statements: Vec<Statement>) -> (Interpreter, Value) {
    let program =
        resolve_program(&Body::new(statements), &default_host_defs()).expect("resolution failed");
    run_program(program, default_host_registry(), &[]).expect("execution failed")
}

/// Resolve and execute, with arguments passed to `main`.
pub fn run_with_args(statements: Vec<Statement>, args: &[Value]) -> (Interpreter, Value) {
    let program =
        resolve_program(&Body::new(statements), &default_host_defs()).expect("resolution failed");
    run_program(program, default_host_registry(), args).expect("execution failed")
}

/// Resolve and execute, expecting a failure in either phase.
pub fn run_expect_err(statements: Vec<Statement>) -> FloydError {
    match resolve_program(&Body::new(statements), &default_host_defs()) {
        Err(e) => e,
        Ok(program) => match run_program(program, default_host_registry(), &[]) {
            Err(e) => e,
            Ok(_) => panic!("program unexpectedly succeeded"),
        },
    }
}

pub fn int(n: i64) -> Expression {
    Expression::literal_int(n)
}

pub fn double(d: f64) -> Expression {
    Expression::literal_double(d)
}

pub fn string(s: &str) -> Expression {
    Expression::literal_string(s)
}

pub fn load(name: &str) -> Expression {
    Expression::load(name)
}

/// Call a function by global name, leaving the result type for the
/// resolution pass to infer.
pub fn call(name: &str, args: Vec<Expression>) -> Expression {
    Expression::call(load(name), args, TypeDesc::Undefined)
}

pub fn bind(name: &str, ty: TypeDesc, expr: Expression) -> Statement {
    Statement::make_bind_local(loc(), name, ty, expr, Mutability::Immutable)
}

pub fn bind_mut(name: &str, ty: TypeDesc, expr: Expression) -> Statement {
    Statement::make_bind_local(loc(), name, ty, expr, Mutability::Mutable)
}

pub fn assign(name: &str, expr: Expression) -> Statement {
    Statement::make_assign(loc(), name, expr)
}

pub fn ret(expr: Expression) -> Statement {
    Statement::make_return(loc(), expr)
}

pub fn expr_stmt(expr: Expression) -> Statement {
    Statement::make_expression(loc(), expr)
}

/// `func <ret> <name>(int a, int b, …) { body }` as a define statement.
pub fn def_func(
    name: &str,
    params: Vec<(&str, TypeDesc)>,
    return_type: TypeDesc,
    body: Vec<Statement>,
) -> Statement {
    let params: Vec<Member> = params
        .into_iter()
        .map(|(n, t)| Member::new(t, n))
        .collect();
    let def = FunctionDef::make_floyd_func(name, params, return_type, Rc::new(Body::new(body)));
    Statement::make_define_function(loc(), name, Rc::new(def))
}

/// A `main` that returns the given expression.
pub fn main_returning(expr: Expression, return_type: TypeDesc) -> Statement {
    def_func("main", vec![], return_type, vec![ret(expr)])
}
