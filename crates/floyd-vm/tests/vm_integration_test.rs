mod common;

use std::rc::Rc;

use common::*;
use floyd_core::{
    ArithOp, Body, CompareOp, Expression, FloydError, LogicalOp, Member, RangeKind, Statement,
    StructDef, TypeDesc, Value,
};

fn add(left: Expression, right: Expression) -> Expression {
    Expression::arithmetic(ArithOp::Add, left, right, TypeDesc::Undefined)
}

#[test]
fn test_function_call_scenario() {
    // int f(int a, int b){ return a + b; }  f(3, 4) == 7
    let (_, result) = run(vec![
        def_func(
            "f",
            vec![("a", TypeDesc::Int), ("b", TypeDesc::Int)],
            TypeDesc::Int,
            vec![ret(add(load("a"), load("b")))],
        ),
        main_returning(call("f", vec![int(3), int(4)]), TypeDesc::Int),
    ]);
    assert_eq!(result, Value::make_int(7));
}

#[test]
fn test_int_divide_by_zero_raises() {
    let err = run_expect_err(vec![main_returning(
        Expression::arithmetic(ArithOp::Div, int(5), int(0), TypeDesc::Int),
        TypeDesc::Int,
    )]);
    assert!(matches!(err, FloydError::DivideByZero));
}

#[test]
fn test_double_divide_by_zero_is_inf() {
    let (_, result) = run(vec![main_returning(
        Expression::arithmetic(ArithOp::Div, double(5.0), double(0.0), TypeDesc::Double),
        TypeDesc::Double,
    )]);
    let d = result.get_double_value().unwrap();
    assert!(d.is_infinite() && d > 0.0);
}

fn loop_count_program(range: RangeKind, end: i64) -> Vec<Statement> {
    // mutable int count = 0; for i in 0 (..<|...) end { count = count + 1 }
    vec![
        bind_mut("count", TypeDesc::Int, int(0)),
        Statement::make_for(
            loc(),
            "i",
            int(0),
            int(end),
            Body::new(vec![assign("count", add(load("count"), int(1)))]),
            range,
        ),
    ]
}

#[test]
fn test_for_closed_range_is_inclusive() {
    let (interp, _) = run(loop_count_program(RangeKind::Closed, 3));
    assert_eq!(interp.get_global("count").unwrap(), Value::make_int(4));
}

#[test]
fn test_for_open_range_is_exclusive() {
    let (interp, _) = run(loop_count_program(RangeKind::Open, 3));
    assert_eq!(interp.get_global("count").unwrap(), Value::make_int(3));
}

#[test]
fn test_for_empty_range_runs_zero_times() {
    let (interp, _) = run(loop_count_program(RangeKind::Open, 0));
    assert_eq!(interp.get_global("count").unwrap(), Value::make_int(0));
}

#[test]
fn test_for_iterator_visible_in_body() {
    // mutable int sum = 0; for i in 0...4 { sum = sum + i }  -> 10
    let (interp, _) = run(vec![
        bind_mut("sum", TypeDesc::Int, int(0)),
        Statement::make_for(
            loc(),
            "i",
            int(0),
            int(4),
            Body::new(vec![assign("sum", add(load("sum"), load("i")))]),
            RangeKind::Closed,
        ),
    ]);
    assert_eq!(interp.get_global("sum").unwrap(), Value::make_int(10));
}

#[test]
fn test_while_loop() {
    // mutable int n = 1; while n < 100 { n = n * 2 }  -> 128
    let (interp, _) = run(vec![
        bind_mut("n", TypeDesc::Int, int(1)),
        Statement::make_while(
            loc(),
            Expression::comparison(CompareOp::Lt, load("n"), int(100)),
            Body::new(vec![assign(
                "n",
                Expression::arithmetic(ArithOp::Mul, load("n"), int(2), TypeDesc::Int),
            )]),
        ),
    ]);
    assert_eq!(interp.get_global("n").unwrap(), Value::make_int(128));
}

#[test]
fn test_return_unwinds_nested_bodies() {
    // return from inside for+if skips all trailing statements.
    let body = vec![
        Statement::make_for(
            loc(),
            "i",
            int(0),
            int(9),
            Body::new(vec![Statement::make_ifelse(
                loc(),
                Expression::comparison(CompareOp::Eq, load("i"), int(2)),
                Body::new(vec![ret(load("i"))]),
                Body::default(),
            )]),
            RangeKind::Closed,
        ),
        ret(int(-1)),
    ];
    let (_, result) = run(vec![def_func("main", vec![], TypeDesc::Int, body)]);
    assert_eq!(result, Value::make_int(2));
}

#[test]
fn test_print_buffer_is_ordered() {
    let (interp, _) = run(vec![
        expr_stmt(call("print", vec![string("first")])),
        expr_stmt(call("print", vec![int(2)])),
        expr_stmt(call("print", vec![string("third")])),
    ]);
    assert_eq!(interp.print_output(), &["first", "2", "third"]);
}

#[test]
fn test_globals_run_without_main() {
    // No main: globals still execute for side effects, result is undefined.
    let (interp, result) = run(vec![expr_stmt(call("print", vec![string("side effect")]))]);
    assert!(result.is_undefined());
    assert_eq!(interp.print_output(), &["side effect"]);
}

#[test]
fn test_main_receives_args() {
    let args_type = TypeDesc::make_vector(TypeDesc::String);
    let program = vec![def_func(
        "main",
        vec![("args", args_type.clone())],
        args_type.clone(),
        vec![ret(load("args"))],
    )];
    let args = Value::make_vector(
        TypeDesc::String,
        vec![Value::make_string("one"), Value::make_string("two")],
    );
    let (_, result) = run_with_args(program, &[args.clone()]);
    assert_eq!(result, args);
}

#[test]
fn test_struct_define_construct_and_member_access() {
    let pixel = Rc::new(StructDef::new(vec![
        Member::new(TypeDesc::Int, "red"),
        Member::new(TypeDesc::Int, "green"),
        Member::new(TypeDesc::Int, "blue"),
    ]));
    let (_, result) = run(vec![
        Statement::make_define_struct(loc(), "pixel_t", pixel),
        bind(
            "p",
            TypeDesc::Unresolved("pixel_t".to_string()),
            Expression::construct_value(
                TypeDesc::Unresolved("pixel_t".to_string()),
                vec![int(10), int(20), int(30)],
            ),
        ),
        main_returning(
            Expression::resolve_member(load("p"), "green", TypeDesc::Undefined),
            TypeDesc::Int,
        ),
    ]);
    assert_eq!(result, Value::make_int(20));
}

#[test]
fn test_vector_construct_and_lookup() {
    let (_, result) = run(vec![
        bind(
            "xs",
            TypeDesc::make_vector(TypeDesc::Int),
            Expression::construct_value(
                TypeDesc::make_vector(TypeDesc::Int),
                vec![int(10), int(20), int(30)],
            ),
        ),
        main_returning(
            Expression::lookup_element(load("xs"), int(2), TypeDesc::Undefined),
            TypeDesc::Int,
        ),
    ]);
    assert_eq!(result, Value::make_int(30));
}

#[test]
fn test_vector_lookup_out_of_bounds_errors() {
    let err = run_expect_err(vec![
        bind(
            "xs",
            TypeDesc::make_vector(TypeDesc::Int),
            Expression::construct_value(TypeDesc::make_vector(TypeDesc::Int), vec![int(1)]),
        ),
        main_returning(
            Expression::lookup_element(load("xs"), int(5), TypeDesc::Undefined),
            TypeDesc::Int,
        ),
    ]);
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn test_dict_construct_and_lookup() {
    let (_, result) = run(vec![
        bind(
            "d",
            TypeDesc::make_dict(TypeDesc::Int),
            Expression::construct_value(
                TypeDesc::make_dict(TypeDesc::Int),
                vec![string("a"), int(1), string("b"), int(2)],
            ),
        ),
        main_returning(
            Expression::lookup_element(load("d"), string("b"), TypeDesc::Undefined),
            TypeDesc::Int,
        ),
    ]);
    assert_eq!(result, Value::make_int(2));
}

#[test]
fn test_recursion() {
    // int fact(int n){ if n <= 1 { return 1 } return n * fact(n - 1) }
    let fact = def_func(
        "fact",
        vec![("n", TypeDesc::Int)],
        TypeDesc::Int,
        vec![
            Statement::make_ifelse(
                loc(),
                Expression::comparison(CompareOp::Le, load("n"), int(1)),
                Body::new(vec![ret(int(1))]),
                Body::default(),
            ),
            ret(Expression::arithmetic(
                ArithOp::Mul,
                load("n"),
                call(
                    "fact",
                    vec![Expression::arithmetic(
                        ArithOp::Sub,
                        load("n"),
                        int(1),
                        TypeDesc::Int,
                    )],
                ),
                TypeDesc::Int,
            )),
        ],
    );
    let (_, result) = run(vec![
        fact,
        main_returning(call("fact", vec![int(6)]), TypeDesc::Int),
    ]);
    assert_eq!(result, Value::make_int(720));
}

#[test]
fn test_short_circuit_and_skips_right() {
    // false && (1/0 == 0) must not evaluate the division.
    let (_, result) = run(vec![main_returning(
        Expression::logical(
            LogicalOp::And,
            Expression::literal_bool(false),
            Expression::comparison(
                CompareOp::Eq,
                Expression::arithmetic(ArithOp::Div, int(1), int(0), TypeDesc::Int),
                int(0),
            ),
        ),
        TypeDesc::Bool,
    )]);
    assert_eq!(result, Value::make_bool(false));
}

#[test]
fn test_short_circuit_or_skips_right() {
    let (_, result) = run(vec![main_returning(
        Expression::logical(
            LogicalOp::Or,
            Expression::literal_bool(true),
            Expression::comparison(
                CompareOp::Eq,
                Expression::arithmetic(ArithOp::Div, int(1), int(0), TypeDesc::Int),
                int(0),
            ),
        ),
        TypeDesc::Bool,
    )]);
    assert_eq!(result, Value::make_bool(true));
}

#[test]
fn test_conditional_takes_one_branch() {
    // true ? 1 : 1/0 — the untaken branch must not run.
    let (_, result) = run(vec![main_returning(
        Expression::conditional(
            Expression::literal_bool(true),
            int(1),
            Expression::arithmetic(ArithOp::Div, int(1), int(0), TypeDesc::Int),
            TypeDesc::Int,
        ),
        TypeDesc::Int,
    )]);
    assert_eq!(result, Value::make_int(1));
}

#[test]
fn test_vector_comparison_longer_sorts_first() {
    // [1,2,3] < [1,2] is true under the inverted prefix convention.
    let vec3 = Expression::construct_value(
        TypeDesc::make_vector(TypeDesc::Int),
        vec![int(1), int(2), int(3)],
    );
    let vec2 =
        Expression::construct_value(TypeDesc::make_vector(TypeDesc::Int), vec![int(1), int(2)]);
    let (_, result) = run(vec![main_returning(
        Expression::comparison(CompareOp::Lt, vec3, vec2),
        TypeDesc::Bool,
    )]);
    assert_eq!(result, Value::make_bool(true));
}

#[test]
fn test_string_comparison_and_concat() {
    let (_, result) = run(vec![main_returning(
        add(string("foo"), string("bar")),
        TypeDesc::String,
    )]);
    assert_eq!(result, Value::make_string("foobar"));

    let (_, result) = run(vec![main_returning(
        Expression::comparison(CompareOp::Lt, string("a"), string("b")),
        TypeDesc::Bool,
    )]);
    assert_eq!(result, Value::make_bool(true));
}

#[test]
fn test_comparing_different_types_aborts() {
    let err = run_expect_err(vec![main_returning(
        Expression::comparison(CompareOp::Eq, int(1), string("1")),
        TypeDesc::Bool,
    )]);
    assert!(matches!(err, FloydError::Incomparable { .. }));
}

#[test]
fn test_assert_aborts_program() {
    let err = run_expect_err(vec![
        expr_stmt(call("print", vec![string("before")])),
        expr_stmt(call(
            "assert",
            vec![Expression::literal_bool(false)],
        )),
        expr_stmt(call("print", vec![string("after")])),
    ]);
    assert!(err.to_string().contains("assertion"));
}

#[test]
fn test_arity_mismatch_aborts() {
    let err = run_expect_err(vec![
        def_func(
            "f",
            vec![("a", TypeDesc::Int)],
            TypeDesc::Int,
            vec![ret(load("a"))],
        ),
        main_returning(call("f", vec![int(1), int(2)]), TypeDesc::Int),
    ]);
    assert!(matches!(err, FloydError::Arity { expected: 1, got: 2, .. }));
}

#[test]
fn test_host_size_and_push_back() {
    let vec_ty = TypeDesc::make_vector(TypeDesc::Int);
    let (_, result) = run(vec![
        bind(
            "xs",
            vec_ty.clone(),
            Expression::construct_value(vec_ty.clone(), vec![int(1), int(2)]),
        ),
        bind("ys", vec_ty, call("push_back", vec![load("xs"), int(3)])),
        main_returning(call("size", vec![load("ys")]), TypeDesc::Int),
    ]);
    assert_eq!(result, Value::make_int(3));
}

#[test]
fn test_block_scoping_shadowing() {
    // The block's own x shadows the global; the initializer still sees
    // the outer x. The global is untouched afterwards.
    let (interp, _) = run(vec![
        bind("x", TypeDesc::Int, int(1)),
        Statement::make_block(
            loc(),
            Body::new(vec![
                bind("x", TypeDesc::Int, add(load("x"), int(10))),
                expr_stmt(call("print", vec![load("x")])),
            ]),
        ),
    ]);
    assert_eq!(interp.get_global("x").unwrap(), Value::make_int(1));
    assert_eq!(interp.print_output(), &["11"]);
}

#[test]
fn test_passive_expression_output_at_top_level() {
    let program = resolve_and_keep(vec![expr_stmt(add(int(1), int(2)))]);
    let mut interp =
        floyd_vm::Interpreter::new(Rc::new(program), floyd_vm::default_host_registry());
    let result = interp.run_globals().unwrap();
    assert_eq!(
        result,
        floyd_vm::StatementResult::Passive(floyd_vm::BcValue::Int(3))
    );
}

fn resolve_and_keep(statements: Vec<Statement>) -> floyd_vm::BcProgram {
    floyd_vm::resolve_program(&Body::new(statements), &floyd_vm::default_host_defs())
        .expect("resolution failed")
}
