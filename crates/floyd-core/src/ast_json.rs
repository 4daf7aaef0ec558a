//! The opcode-tagged JSON encoding of the AST — the interchange format
//! between compiler passes.
//!
//! Nodes are arrays with a string opcode in position 0, e.g.
//! `["return", EXPR]`. A statement with a known source location is
//! prefixed with it: `[1032, "return", EXPR]`. Decoding is strict: an
//! unknown opcode or wrong arity is a fatal `Decode` error, never a skip.
//!
//! Types embedded in AST nodes use preserve mode, so unresolved type
//! identifiers survive the round trip between front-end passes.

use std::rc::Rc;

use serde_json::Value as J;

use crate::ast::{
    ArithOp, Body, CompareOp, Expression, FunctionDef, LogicalOp, Mutability, RangeKind,
    Statement, StatementKind, Symbol, SymbolTable, VariableAddress,
};
use crate::error::{FloydError, Location};
use crate::json::{json_to_value, value_to_json};
use crate::types::{typedesc_from_json, typedesc_to_json, Member, StructDef, TypeDesc, TypeJsonMode};
use crate::value::Value;

const MODE: TypeJsonMode = TypeJsonMode::Preserve;

// --- Encoding ---

pub fn expression_to_json(e: &Expression) -> Result<J, FloydError> {
    let arr = |items: Vec<J>| J::Array(items);
    let tag = |s: &str| J::String(s.to_string());
    match e {
        Expression::Literal(v) => Ok(arr(vec![
            tag("k"),
            value_to_json(v, MODE)?,
            typedesc_to_json(&v.get_type(), MODE)?,
        ])),
        Expression::Load { name } => Ok(arr(vec![tag("@"), J::String(name.clone())])),
        Expression::LoadAddress {
            address,
            result_type,
        } => Ok(arr(vec![
            tag("@i"),
            J::Number(address.parent_steps.into()),
            J::Number(address.index.into()),
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::ResolveMember {
            parent,
            member_name,
            result_type,
        } => Ok(arr(vec![
            tag("->"),
            expression_to_json(parent)?,
            J::String(member_name.clone()),
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::LookupElement {
            parent,
            key,
            result_type,
        } => Ok(arr(vec![
            tag("["),
            expression_to_json(parent)?,
            expression_to_json(key)?,
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::Call {
            callee,
            args,
            result_type,
        } => {
            let args: Result<Vec<J>, FloydError> = args.iter().map(expression_to_json).collect();
            Ok(arr(vec![
                tag("call"),
                expression_to_json(callee)?,
                J::Array(args?),
                typedesc_to_json(result_type, MODE)?,
            ]))
        }
        Expression::UnaryMinus { expr, result_type } => Ok(arr(vec![
            tag("unary-minus"),
            expression_to_json(expr)?,
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::Arithmetic {
            op,
            left,
            right,
            result_type,
        } => Ok(arr(vec![
            tag(op.token()),
            expression_to_json(left)?,
            expression_to_json(right)?,
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::Comparison { op, left, right } => Ok(arr(vec![
            tag(op.token()),
            expression_to_json(left)?,
            expression_to_json(right)?,
            typedesc_to_json(&TypeDesc::Bool, MODE)?,
        ])),
        Expression::Logical { op, left, right } => Ok(arr(vec![
            tag(op.token()),
            expression_to_json(left)?,
            expression_to_json(right)?,
            typedesc_to_json(&TypeDesc::Bool, MODE)?,
        ])),
        Expression::Conditional {
            condition,
            a,
            b,
            result_type,
        } => Ok(arr(vec![
            tag("?:"),
            expression_to_json(condition)?,
            expression_to_json(a)?,
            expression_to_json(b)?,
            typedesc_to_json(result_type, MODE)?,
        ])),
        Expression::ConstructValue { value_type, args } => {
            let args: Result<Vec<J>, FloydError> = args.iter().map(expression_to_json).collect();
            Ok(arr(vec![
                tag("construct-value"),
                typedesc_to_json(value_type, MODE)?,
                J::Array(args?),
            ]))
        }
        Expression::FunctionDefinition(def) => {
            Ok(arr(vec![tag("func-def"), function_def_to_json(def)?]))
        }
    }
}

fn function_def_to_json(def: &FunctionDef) -> Result<J, FloydError> {
    let args: Result<Vec<J>, FloydError> = def.params.iter().map(member_to_json).collect();
    let mut obj = serde_json::Map::new();
    obj.insert("name".to_string(), J::String(def.name.clone()));
    obj.insert("args".to_string(), J::Array(args?));
    obj.insert(
        "body".to_string(),
        match &def.body {
            Some(b) => body_to_json(b)?,
            None => J::Null,
        },
    );
    obj.insert(
        "host_function_id".to_string(),
        match def.host_function_id {
            Some(id) => J::Number(id.into()),
            None => J::Null,
        },
    );
    obj.insert(
        "return_type".to_string(),
        typedesc_to_json(&def.return_type, MODE)?,
    );
    Ok(J::Object(obj))
}

fn member_to_json(m: &Member) -> Result<J, FloydError> {
    Ok(J::Array(vec![
        typedesc_to_json(&m.member_type, MODE)?,
        J::String(m.name.clone()),
    ]))
}

fn symbol_to_json(symbol: &Symbol) -> Result<J, FloydError> {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "symbol_type".to_string(),
        J::String(
            match symbol.mutability {
                Mutability::Immutable => "immutable",
                Mutability::Mutable => "mutable",
            }
            .to_string(),
        ),
    );
    obj.insert(
        "value_type".to_string(),
        typedesc_to_json(&symbol.value_type, MODE)?,
    );
    obj.insert(
        "init".to_string(),
        if symbol.init.is_undefined() {
            J::Null
        } else {
            value_to_json(&symbol.init, MODE)?
        },
    );
    Ok(J::Object(obj))
}

pub fn body_to_json(body: &Body) -> Result<J, FloydError> {
    let statements: Result<Vec<J>, FloydError> =
        body.statements.iter().map(statement_to_json).collect();
    let mut symbols = Vec::with_capacity(body.symbols.len());
    for (index, (name, symbol)) in body.symbols.symbols.iter().enumerate() {
        symbols.push(J::Array(vec![
            J::Number(index.into()),
            J::String(name.clone()),
            symbol_to_json(symbol)?,
        ]));
    }
    let mut obj = serde_json::Map::new();
    obj.insert("statements".to_string(), J::Array(statements?));
    obj.insert("symbols".to_string(), J::Array(symbols));
    Ok(J::Object(obj))
}

pub fn statement_to_json(statement: &Statement) -> Result<J, FloydError> {
    let tag = |s: &str| J::String(s.to_string());
    let payload = match &statement.kind {
        StatementKind::Return(e) => vec![tag("return"), expression_to_json(e)?],
        StatementKind::DefineStruct { name, def } => {
            let members: Result<Vec<J>, FloydError> =
                def.members.iter().map(member_to_json).collect();
            let mut obj = serde_json::Map::new();
            obj.insert("name".to_string(), J::String(name.clone()));
            obj.insert("members".to_string(), J::Array(members?));
            vec![tag("def-struct"), J::Object(obj)]
        }
        StatementKind::DefineFunction { def, .. } => {
            vec![tag("def-func"), function_def_to_json(def)?]
        }
        StatementKind::BindLocal {
            name,
            bind_type,
            expr,
            mutability,
        } => {
            let meta = if *mutability == Mutability::Mutable {
                let mut obj = serde_json::Map::new();
                obj.insert("mutable".to_string(), J::Bool(true));
                J::Object(obj)
            } else {
                J::Null
            };
            vec![
                tag("bind"),
                typedesc_to_json(bind_type, MODE)?,
                J::String(name.clone()),
                expression_to_json(expr)?,
                meta,
            ]
        }
        StatementKind::Assign { name, expr } => vec![
            tag("assign"),
            J::String(name.clone()),
            expression_to_json(expr)?,
        ],
        StatementKind::Assign2 { address, expr } => vec![
            tag("assign2"),
            J::Number(address.parent_steps.into()),
            J::Number(address.index.into()),
            expression_to_json(expr)?,
        ],
        StatementKind::Init2 { address, expr } => vec![
            tag("init2"),
            J::Number(address.parent_steps.into()),
            J::Number(address.index.into()),
            expression_to_json(expr)?,
        ],
        StatementKind::Block(body) => vec![tag("block"), body_to_json(body)?],
        StatementKind::IfElse {
            condition,
            then_body,
            else_body,
        } => vec![
            tag("if"),
            expression_to_json(condition)?,
            body_to_json(then_body)?,
            body_to_json(else_body)?,
        ],
        StatementKind::For {
            iterator_name,
            start,
            end,
            body,
            range,
        } => vec![
            tag("for"),
            tag(match range {
                RangeKind::Open => "open-range",
                RangeKind::Closed => "closed-range",
            }),
            J::String(iterator_name.clone()),
            expression_to_json(start)?,
            expression_to_json(end)?,
            body_to_json(body)?,
        ],
        StatementKind::While { condition, body } => vec![
            tag("while"),
            expression_to_json(condition)?,
            body_to_json(body)?,
        ],
        StatementKind::Expression(e) => {
            vec![tag("expression-statement"), expression_to_json(e)?]
        }
        StatementKind::SoftwareSystem(json) => vec![tag("software-system"), json.clone()],
        StatementKind::ContainerDef(json) => vec![tag("container-def"), json.clone()],
    };

    let mut items = Vec::with_capacity(payload.len() + 1);
    if let Some(offset) = statement.location.offset() {
        items.push(J::Number(offset.into()));
    }
    items.extend(payload);
    Ok(J::Array(items))
}

pub fn statements_to_json(statements: &[Statement]) -> Result<J, FloydError> {
    let items: Result<Vec<J>, FloydError> = statements.iter().map(statement_to_json).collect();
    Ok(J::Array(items?))
}

// --- Decoding ---

pub fn expression_from_json(json: &J) -> Result<Expression, FloydError> {
    let items = json
        .as_array()
        .ok_or_else(|| FloydError::decode(format!("expression must be an array, got {json}")))?;
    let opcode = items
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| FloydError::decode("expression array without string opcode"))?;

    match opcode {
        "k" => {
            expect_arity(items, 3, "k")?;
            let t = typedesc_from_json(&items[2])?;
            Ok(Expression::literal(json_to_value(&t, &items[1])?))
        }
        "@" => {
            expect_arity(items, 2, "@")?;
            Ok(Expression::load(expect_string(&items[1], "@ name")?))
        }
        "@i" => {
            expect_arity(items, 4, "@i")?;
            Ok(Expression::load_address(
                VariableAddress::new(
                    expect_i32(&items[1], "@i parent_steps")?,
                    expect_i32(&items[2], "@i index")?,
                ),
                typedesc_from_json(&items[3])?,
            ))
        }
        "->" => {
            expect_arity(items, 4, "->")?;
            Ok(Expression::resolve_member(
                expression_from_json(&items[1])?,
                expect_string(&items[2], "-> member")?,
                typedesc_from_json(&items[3])?,
            ))
        }
        "[" => {
            expect_arity(items, 4, "[")?;
            Ok(Expression::lookup_element(
                expression_from_json(&items[1])?,
                expression_from_json(&items[2])?,
                typedesc_from_json(&items[3])?,
            ))
        }
        "call" => {
            expect_arity(items, 4, "call")?;
            let args_json = items[2]
                .as_array()
                .ok_or_else(|| FloydError::decode("call args must be an array"))?;
            let args: Result<Vec<Expression>, FloydError> =
                args_json.iter().map(expression_from_json).collect();
            Ok(Expression::call(
                expression_from_json(&items[1])?,
                args?,
                typedesc_from_json(&items[3])?,
            ))
        }
        "unary-minus" => {
            expect_arity(items, 3, "unary-minus")?;
            Ok(Expression::unary_minus(
                expression_from_json(&items[1])?,
                typedesc_from_json(&items[2])?,
            ))
        }
        "+" | "-" | "*" | "/" | "%" => {
            expect_arity(items, 4, opcode)?;
            let op = match opcode {
                "+" => ArithOp::Add,
                "-" => ArithOp::Sub,
                "*" => ArithOp::Mul,
                "/" => ArithOp::Div,
                _ => ArithOp::Rem,
            };
            Ok(Expression::arithmetic(
                op,
                expression_from_json(&items[1])?,
                expression_from_json(&items[2])?,
                typedesc_from_json(&items[3])?,
            ))
        }
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            expect_arity(items, 4, opcode)?;
            let op = match opcode {
                "==" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                "<" => CompareOp::Lt,
                "<=" => CompareOp::Le,
                ">" => CompareOp::Gt,
                _ => CompareOp::Ge,
            };
            Ok(Expression::comparison(
                op,
                expression_from_json(&items[1])?,
                expression_from_json(&items[2])?,
            ))
        }
        "&&" | "||" => {
            expect_arity(items, 4, opcode)?;
            let op = if opcode == "&&" {
                LogicalOp::And
            } else {
                LogicalOp::Or
            };
            Ok(Expression::logical(
                op,
                expression_from_json(&items[1])?,
                expression_from_json(&items[2])?,
            ))
        }
        "?:" => {
            expect_arity(items, 5, "?:")?;
            Ok(Expression::conditional(
                expression_from_json(&items[1])?,
                expression_from_json(&items[2])?,
                expression_from_json(&items[3])?,
                typedesc_from_json(&items[4])?,
            ))
        }
        "construct-value" => {
            expect_arity(items, 3, "construct-value")?;
            let args_json = items[2]
                .as_array()
                .ok_or_else(|| FloydError::decode("construct-value args must be an array"))?;
            let args: Result<Vec<Expression>, FloydError> =
                args_json.iter().map(expression_from_json).collect();
            Ok(Expression::construct_value(
                typedesc_from_json(&items[1])?,
                args?,
            ))
        }
        "func-def" => {
            expect_arity(items, 2, "func-def")?;
            Ok(Expression::function_definition(Rc::new(
                function_def_from_json(&items[1])?,
            )))
        }
        other => Err(FloydError::decode(format!(
            "unknown expression opcode '{other}'"
        ))),
    }
}

fn function_def_from_json(json: &J) -> Result<FunctionDef, FloydError> {
    let obj = json
        .as_object()
        .ok_or_else(|| FloydError::decode("function definition must be an object"))?;
    let name = obj
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FloydError::decode("function definition needs a name"))?;
    let args_json = obj
        .get("args")
        .and_then(|v| v.as_array())
        .ok_or_else(|| FloydError::decode("function definition needs an args array"))?;
    let params: Result<Vec<Member>, FloydError> = args_json.iter().map(member_from_json).collect();
    let params = params?;
    let return_type = typedesc_from_json(
        obj.get("return_type")
            .ok_or_else(|| FloydError::decode("function definition needs a return_type"))?,
    )?;
    let body_json = obj.get("body").unwrap_or(&J::Null);
    let host_id = obj.get("host_function_id").unwrap_or(&J::Null);

    match (body_json, host_id) {
        (J::Null, J::Null) => Err(FloydError::decode(
            "function definition needs a body or a host_function_id",
        )),
        (body, J::Null) => Ok(FunctionDef::make_floyd_func(
            name,
            params,
            return_type,
            Rc::new(body_from_json(body)?),
        )),
        (J::Null, id) => {
            let id = id
                .as_i64()
                .ok_or_else(|| FloydError::decode("host_function_id must be a number"))?;
            Ok(FunctionDef::make_host_func(name, params, return_type, id))
        }
        _ => Err(FloydError::decode(
            "function definition cannot have both a body and a host_function_id",
        )),
    }
}

fn member_from_json(json: &J) -> Result<Member, FloydError> {
    let pair = json
        .as_array()
        .filter(|a| a.len() == 2)
        .ok_or_else(|| FloydError::decode("member must be [TYPE, name]"))?;
    Ok(Member::new(
        typedesc_from_json(&pair[0])?,
        expect_string(&pair[1], "member name")?,
    ))
}

fn symbol_from_json(json: &J) -> Result<Symbol, FloydError> {
    let obj = json
        .as_object()
        .ok_or_else(|| FloydError::decode("symbol must be an object"))?;
    let symbol_type = obj
        .get("symbol_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FloydError::decode("symbol needs a symbol_type"))?;
    let mutability = match symbol_type {
        "immutable" => Mutability::Immutable,
        "mutable" => Mutability::Mutable,
        other => {
            return Err(FloydError::decode(format!(
                "unknown symbol_type '{other}'"
            )))
        }
    };
    let value_type = typedesc_from_json(
        obj.get("value_type")
            .ok_or_else(|| FloydError::decode("symbol needs a value_type"))?,
    )?;
    let init = match obj.get("init") {
        None | Some(J::Null) => Value::make_undefined(),
        Some(j) => json_to_value(&value_type, j)?,
    };
    Ok(Symbol {
        mutability,
        value_type,
        init,
    })
}

pub fn body_from_json(json: &J) -> Result<Body, FloydError> {
    let obj = json
        .as_object()
        .ok_or_else(|| FloydError::decode("body must be an object"))?;
    let statements = match obj.get("statements") {
        None | Some(J::Null) => Vec::new(),
        Some(j) => statements_from_json(j)?,
    };
    let symbols = match obj.get("symbols") {
        None | Some(J::Null) => SymbolTable::new(),
        Some(j) => symbols_from_json(j)?,
    };
    Ok(Body::with_symbols(statements, symbols))
}

fn symbols_from_json(json: &J) -> Result<SymbolTable, FloydError> {
    let items = json
        .as_array()
        .ok_or_else(|| FloydError::decode("symbols must be an array"))?;
    let mut table = SymbolTable::new();
    for entry in items {
        let triple = entry
            .as_array()
            .filter(|a| a.len() == 3)
            .ok_or_else(|| FloydError::decode("symbol entry must be [index, name, SYMBOL]"))?;
        let index = triple[0]
            .as_u64()
            .ok_or_else(|| FloydError::decode("symbol index must be a number"))?;
        if index as usize != table.len() {
            return Err(FloydError::decode(format!(
                "symbol index {index} out of order (expected {})",
                table.len()
            )));
        }
        let name = expect_string(&triple[1], "symbol name")?;
        table.add(name, symbol_from_json(&triple[2])?);
    }
    Ok(table)
}

pub fn statement_from_json(json: &J) -> Result<Statement, FloydError> {
    let items = json
        .as_array()
        .ok_or_else(|| FloydError::decode(format!("statement must be an array, got {json}")))?;

    // A leading number is the source location; the opcode follows.
    let (location, items) = match items.first() {
        Some(J::Number(n)) => {
            let offset = n
                .as_u64()
                .ok_or_else(|| FloydError::decode("statement location must be unsigned"))?;
            (Location::new(offset as usize), &items[1..])
        }
        _ => (Location::none(), &items[..]),
    };

    let opcode = items
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| FloydError::decode("statement array without string opcode"))?;

    match opcode {
        "return" => {
            expect_arity(items, 2, "return")?;
            Ok(Statement::make_return(
                location,
                expression_from_json(&items[1])?,
            ))
        }
        "def-struct" => {
            expect_arity(items, 2, "def-struct")?;
            let obj = items[1]
                .as_object()
                .ok_or_else(|| FloydError::decode("def-struct payload must be an object"))?;
            let name = obj
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| FloydError::decode("def-struct needs a name"))?;
            let members_json = obj
                .get("members")
                .and_then(|v| v.as_array())
                .ok_or_else(|| FloydError::decode("def-struct needs a members array"))?;
            let members: Result<Vec<Member>, FloydError> =
                members_json.iter().map(member_from_json).collect();
            Ok(Statement::make_define_struct(
                location,
                name,
                Rc::new(StructDef::new(members?)),
            ))
        }
        "def-func" => {
            expect_arity(items, 2, "def-func")?;
            let def = function_def_from_json(&items[1])?;
            let name = def.name.clone();
            Ok(Statement::make_define_function(location, name, Rc::new(def)))
        }
        "bind" => {
            expect_arity(items, 5, "bind")?;
            let bind_type = typedesc_from_json(&items[1])?;
            let name = expect_string(&items[2], "bind name")?;
            let expr = expression_from_json(&items[3])?;
            let mutability = match &items[4] {
                J::Null => Mutability::Immutable,
                J::Object(meta) => {
                    if meta.get("mutable").and_then(|v| v.as_bool()) == Some(true) {
                        Mutability::Mutable
                    } else {
                        Mutability::Immutable
                    }
                }
                other => {
                    return Err(FloydError::decode(format!(
                        "bind meta must be an object or null, got {other}"
                    )))
                }
            };
            Ok(Statement::make_bind_local(
                location, name, bind_type, expr, mutability,
            ))
        }
        "assign" => {
            expect_arity(items, 3, "assign")?;
            Ok(Statement::make_assign(
                location,
                expect_string(&items[1], "assign name")?,
                expression_from_json(&items[2])?,
            ))
        }
        "assign2" => {
            expect_arity(items, 4, "assign2")?;
            Ok(Statement::make_assign2(
                location,
                VariableAddress::new(
                    expect_i32(&items[1], "assign2 parent_steps")?,
                    expect_i32(&items[2], "assign2 index")?,
                ),
                expression_from_json(&items[3])?,
            ))
        }
        "init2" => {
            expect_arity(items, 4, "init2")?;
            Ok(Statement::make_init2(
                location,
                VariableAddress::new(
                    expect_i32(&items[1], "init2 parent_steps")?,
                    expect_i32(&items[2], "init2 index")?,
                ),
                expression_from_json(&items[3])?,
            ))
        }
        "block" => {
            expect_arity(items, 2, "block")?;
            Ok(Statement::make_block(location, body_from_json(&items[1])?))
        }
        "if" => {
            expect_arity(items, 4, "if")?;
            Ok(Statement::make_ifelse(
                location,
                expression_from_json(&items[1])?,
                body_from_json(&items[2])?,
                body_from_json(&items[3])?,
            ))
        }
        "for" => {
            expect_arity(items, 6, "for")?;
            let range = match items[1].as_str() {
                Some("open-range") => RangeKind::Open,
                Some("closed-range") => RangeKind::Closed,
                _ => {
                    return Err(FloydError::decode(
                        "for range must be 'open-range' or 'closed-range'",
                    ))
                }
            };
            Ok(Statement::make_for(
                location,
                expect_string(&items[2], "for iterator")?,
                expression_from_json(&items[3])?,
                expression_from_json(&items[4])?,
                body_from_json(&items[5])?,
                range,
            ))
        }
        "while" => {
            expect_arity(items, 3, "while")?;
            Ok(Statement::make_while(
                location,
                expression_from_json(&items[1])?,
                body_from_json(&items[2])?,
            ))
        }
        "expression-statement" => {
            expect_arity(items, 2, "expression-statement")?;
            Ok(Statement::make_expression(
                location,
                expression_from_json(&items[1])?,
            ))
        }
        "software-system" => {
            expect_arity(items, 2, "software-system")?;
            Ok(Statement::make_software_system(location, items[1].clone()))
        }
        "container-def" => {
            expect_arity(items, 2, "container-def")?;
            Ok(Statement::make_container_def(location, items[1].clone()))
        }
        other => Err(FloydError::decode(format!(
            "unknown statement opcode '{other}'"
        ))),
    }
}

pub fn statements_from_json(json: &J) -> Result<Vec<Statement>, FloydError> {
    let items = json
        .as_array()
        .ok_or_else(|| FloydError::decode("statements must be an array"))?;
    items.iter().map(statement_from_json).collect()
}

// --- Decode helpers ---

fn expect_arity(items: &[J], expected: usize, opcode: &str) -> Result<(), FloydError> {
    if items.len() != expected {
        return Err(FloydError::decode(format!(
            "'{opcode}' expects {expected} elements, got {}",
            items.len()
        )));
    }
    Ok(())
}

fn expect_string(json: &J, what: &str) -> Result<String, FloydError> {
    json.as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| FloydError::decode(format!("{what} must be a string, got {json}")))
}

fn expect_i32(json: &J, what: &str) -> Result<i32, FloydError> {
    json.as_i64()
        .map(|n| n as i32)
        .ok_or_else(|| FloydError::decode(format!("{what} must be a number, got {json}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip_statement(s: &Statement) -> Statement {
        let json = statement_to_json(s).unwrap();
        statement_from_json(&json).unwrap()
    }

    fn round_trip_expression(e: &Expression) -> Expression {
        let json = expression_to_json(e).unwrap();
        expression_from_json(&json).unwrap()
    }

    #[test]
    fn test_literal_round_trip() {
        let e = Expression::literal_int(3);
        assert_eq!(round_trip_expression(&e), e);
        let json = expression_to_json(&e).unwrap();
        assert_eq!(json, json!(["k", 3, "^int"]));
    }

    #[test]
    fn test_binary_ops_round_trip() {
        let e = Expression::arithmetic(
            ArithOp::Add,
            Expression::literal_int(1),
            Expression::literal_int(2),
            TypeDesc::Int,
        );
        assert_eq!(round_trip_expression(&e), e);

        let c = Expression::comparison(
            CompareOp::Le,
            Expression::literal_int(1),
            Expression::literal_int(2),
        );
        assert_eq!(round_trip_expression(&c), c);

        let l = Expression::logical(
            LogicalOp::And,
            Expression::literal_bool(true),
            Expression::literal_bool(false),
        );
        assert_eq!(round_trip_expression(&l), l);
    }

    #[test]
    fn test_call_and_lookup_round_trip() {
        let e = Expression::call(
            Expression::load("f"),
            vec![Expression::literal_int(3), Expression::literal_int(4)],
            TypeDesc::Int,
        );
        assert_eq!(round_trip_expression(&e), e);

        let lookup = Expression::lookup_element(
            Expression::load("xs"),
            Expression::literal_int(0),
            TypeDesc::Int,
        );
        assert_eq!(round_trip_expression(&lookup), lookup);

        let member = Expression::resolve_member(Expression::load("p"), "x", TypeDesc::Int);
        assert_eq!(round_trip_expression(&member), member);
    }

    #[test]
    fn test_conditional_and_construct_round_trip() {
        let e = Expression::conditional(
            Expression::literal_bool(true),
            Expression::literal_int(1),
            Expression::literal_int(2),
            TypeDesc::Int,
        );
        assert_eq!(round_trip_expression(&e), e);

        let c = Expression::construct_value(
            TypeDesc::make_vector(TypeDesc::Int),
            vec![Expression::literal_int(1), Expression::literal_int(2)],
        );
        assert_eq!(round_trip_expression(&c), c);
    }

    #[test]
    fn test_load_address_round_trip() {
        let e = Expression::load_address(VariableAddress::new(-1, 3), TypeDesc::Int);
        assert_eq!(round_trip_expression(&e), e);
        let json = expression_to_json(&e).unwrap();
        assert_eq!(json, json!(["@i", -1, 3, "^int"]));
    }

    #[test]
    fn test_statement_round_trips() {
        let loc = Location::new(1032);
        let bind = Statement::make_bind_local(
            loc,
            "x",
            TypeDesc::Int,
            Expression::literal_int(5),
            Mutability::Mutable,
        );
        let rt = round_trip_statement(&bind);
        assert_eq!(rt, bind);
        assert_eq!(rt.location, loc);

        let ret = Statement::make_return(Location::none(), Expression::literal_int(1));
        assert_eq!(round_trip_statement(&ret), ret);

        let assign2 = Statement::make_assign2(
            Location::none(),
            VariableAddress::new(0, 2),
            Expression::literal_int(9),
        );
        assert_eq!(round_trip_statement(&assign2), assign2);

        let forstmt = Statement::make_for(
            Location::none(),
            "i",
            Expression::literal_int(0),
            Expression::literal_int(3),
            Body::default(),
            RangeKind::Closed,
        );
        assert_eq!(round_trip_statement(&forstmt), forstmt);

        let meta = Statement::make_software_system(Location::none(), json!({"name": "demo"}));
        assert_eq!(round_trip_statement(&meta), meta);
    }

    #[test]
    fn test_def_func_round_trip() {
        let def = FunctionDef::make_floyd_func(
            "f",
            vec![Member::new(TypeDesc::Int, "a"), Member::new(TypeDesc::Int, "b")],
            TypeDesc::Int,
            Rc::new(Body::new(vec![Statement::make_return(
                Location::none(),
                Expression::arithmetic(
                    ArithOp::Add,
                    Expression::load("a"),
                    Expression::load("b"),
                    TypeDesc::Int,
                ),
            )])),
        );
        let s = Statement::make_define_function(Location::none(), "f", Rc::new(def));
        assert_eq!(round_trip_statement(&s), s);
    }

    #[test]
    fn test_body_with_symbols_round_trip() {
        let mut symbols = SymbolTable::new();
        symbols.add("x", Symbol::make_mutable(TypeDesc::Int));
        symbols.add("k", Symbol::make_constant(Value::make_int(7)));
        let body = Body::with_symbols(
            vec![Statement::make_init2(
                Location::none(),
                VariableAddress::new(0, 0),
                Expression::literal_int(1),
            )],
            symbols,
        );
        let json = body_to_json(&body).unwrap();
        assert_eq!(body_from_json(&json).unwrap(), body);
    }

    #[test]
    fn test_unknown_opcode_is_fatal() {
        assert!(statement_from_json(&json!(["frobnicate", 1])).is_err());
        assert!(expression_from_json(&json!(["frobnicate", 1])).is_err());
    }

    #[test]
    fn test_malformed_arity_is_fatal() {
        assert!(statement_from_json(&json!(["return"])).is_err());
        assert!(statement_from_json(&json!(["if", ["k", 1, "^int"]])).is_err());
        assert!(expression_from_json(&json!(["call", ["@", "f"]])).is_err());
    }

    #[test]
    fn test_preserve_mode_keeps_unresolved_types() {
        let bind = Statement::make_bind_local(
            Location::none(),
            "p",
            TypeDesc::Unresolved("pixel_t".to_string()),
            Expression::literal_int(0),
            Mutability::Immutable,
        );
        let rt = round_trip_statement(&bind);
        assert_eq!(rt, bind);
    }
}
