use std::rc::Rc;

use crate::error::Location;
use crate::types::{Member, StructDef, TypeDesc};
use crate::value::Value;

/// A resolved variable slot: how many enclosing scopes to step up, and
/// the index into that scope's symbol table. `parent_steps == -1`
/// addresses the global scope directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableAddress {
    pub parent_steps: i32,
    pub index: i32,
}

impl VariableAddress {
    pub fn new(parent_steps: i32, index: i32) -> Self {
        VariableAddress {
            parent_steps,
            index,
        }
    }

    /// Steps value that addresses the global scope from anywhere.
    pub const GLOBAL_STEPS: i32 = -1;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Immutable,
    Mutable,
}

/// An entry in a lexical scope: a reserved slot with a mutability flag,
/// a declared type, and an optional precomputed constant.
///
/// Function values and struct types land in symbol tables as constants,
/// so `print(my_func)` and `print(pixel_t)` work without evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub mutability: Mutability,
    pub value_type: TypeDesc,
    /// `Value::Undefined` when there is no precomputed constant.
    pub init: Value,
}

impl Symbol {
    pub fn make_immutable(value_type: TypeDesc) -> Symbol {
        Symbol {
            mutability: Mutability::Immutable,
            value_type,
            init: Value::make_undefined(),
        }
    }

    pub fn make_mutable(value_type: TypeDesc) -> Symbol {
        Symbol {
            mutability: Mutability::Mutable,
            value_type,
            init: Value::make_undefined(),
        }
    }

    /// An immutable symbol whose value is known up front.
    pub fn make_constant(init: Value) -> Symbol {
        Symbol {
            mutability: Mutability::Immutable,
            value_type: init.get_type(),
            init,
        }
    }

    pub fn check_invariant(&self) -> bool {
        self.init.is_undefined() || self.init.get_type() == self.value_type
    }
}

/// An ordered sequence of (name, symbol) pairs. Order is load-bearing:
/// resolved addresses index this table, so entries are only ever appended.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolTable {
    pub symbols: Vec<(String, Symbol)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: Vec::new(),
        }
    }

    /// Append a symbol and return its slot index.
    pub fn add(&mut self, name: impl Into<String>, symbol: Symbol) -> usize {
        debug_assert!(symbol.check_invariant());
        self.symbols.push((name.into(), symbol));
        self.symbols.len() - 1
    }

    /// Find a symbol by name, returning its slot index and the symbol.
    pub fn find(&self, name: &str) -> Option<(usize, &Symbol)> {
        self.symbols
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| (i, &self.symbols[i].1))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// A lexical block: ordered statements plus the block's own symbol table.
/// Bodies nest — if/for/while/block statements each own child bodies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub statements: Vec<Statement>,
    pub symbols: SymbolTable,
}

impl Body {
    pub fn new(statements: Vec<Statement>) -> Self {
        Body {
            statements,
            symbols: SymbolTable::new(),
        }
    }

    pub fn with_symbols(statements: Vec<Statement>, symbols: SymbolTable) -> Self {
        Body {
            statements,
            symbols,
        }
    }

    pub fn check_types_resolved(&self) -> bool {
        self.statements.iter().all(|s| s.check_types_resolved())
            && self.symbols.symbols.iter().all(|(_, sym)| {
                sym.value_type.is_resolved()
                    && (sym.init.is_undefined() || sym.init.get_type().is_resolved())
            })
    }
}

/// A function definition: either a Floyd-defined body or a host function
/// dispatched by numeric id — exactly one of the two is present.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub func_type: TypeDesc,
    pub params: Vec<Member>,
    pub body: Option<Rc<Body>>,
    pub host_function_id: Option<i64>,
    pub return_type: TypeDesc,
}

impl FunctionDef {
    pub fn make_floyd_func(
        name: impl Into<String>,
        params: Vec<Member>,
        return_type: TypeDesc,
        body: Rc<Body>,
    ) -> Self {
        let func_type = TypeDesc::make_function(
            return_type.clone(),
            params.iter().map(|p| p.member_type.clone()).collect(),
        );
        FunctionDef {
            name: name.into(),
            func_type,
            params,
            body: Some(body),
            host_function_id: None,
            return_type,
        }
    }

    pub fn make_host_func(
        name: impl Into<String>,
        params: Vec<Member>,
        return_type: TypeDesc,
        host_function_id: i64,
    ) -> Self {
        let func_type = TypeDesc::make_function(
            return_type.clone(),
            params.iter().map(|p| p.member_type.clone()).collect(),
        );
        FunctionDef {
            name: name.into(),
            func_type,
            params,
            body: None,
            host_function_id: Some(host_function_id),
            return_type,
        }
    }

    pub fn check_types_resolved(&self) -> bool {
        self.func_type.is_resolved()
            && self.return_type.is_resolved()
            && self.params.iter().all(|p| p.member_type.is_resolved())
            && self.body.as_ref().map_or(true, |b| b.check_types_resolved())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn token(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn token(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn token(&self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

/// An expression node. Immutable; each node carries its statically
/// resolved result type once semantic analysis has run.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Value),
    /// A free variable, by name. Rewritten to `LoadAddress` by the
    /// resolution pass; reaching the interpreter unrewritten is an error.
    Load { name: String },
    LoadAddress {
        address: VariableAddress,
        result_type: TypeDesc,
    },
    ResolveMember {
        parent: Box<Expression>,
        member_name: String,
        result_type: TypeDesc,
    },
    LookupElement {
        parent: Box<Expression>,
        key: Box<Expression>,
        result_type: TypeDesc,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
        result_type: TypeDesc,
    },
    UnaryMinus {
        expr: Box<Expression>,
        result_type: TypeDesc,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Expression>,
        right: Box<Expression>,
        result_type: TypeDesc,
    },
    Comparison {
        op: CompareOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Short-circuit: the right operand must not be evaluated when the
    /// left already decides the result.
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        a: Box<Expression>,
        b: Box<Expression>,
        result_type: TypeDesc,
    },
    ConstructValue {
        value_type: TypeDesc,
        args: Vec<Expression>,
    },
    FunctionDefinition(Rc<FunctionDef>),
}

impl Expression {
    pub fn literal(value: Value) -> Expression {
        Expression::Literal(value)
    }

    pub fn literal_int(n: i64) -> Expression {
        Expression::Literal(Value::make_int(n))
    }

    pub fn literal_bool(b: bool) -> Expression {
        Expression::Literal(Value::make_bool(b))
    }

    pub fn literal_double(d: f64) -> Expression {
        Expression::Literal(Value::make_double(d))
    }

    pub fn literal_string(s: impl Into<String>) -> Expression {
        Expression::Literal(Value::make_string(s))
    }

    pub fn load(name: impl Into<String>) -> Expression {
        Expression::Load { name: name.into() }
    }

    pub fn load_address(address: VariableAddress, result_type: TypeDesc) -> Expression {
        Expression::LoadAddress {
            address,
            result_type,
        }
    }

    pub fn resolve_member(
        parent: Expression,
        member_name: impl Into<String>,
        result_type: TypeDesc,
    ) -> Expression {
        Expression::ResolveMember {
            parent: Box::new(parent),
            member_name: member_name.into(),
            result_type,
        }
    }

    pub fn lookup_element(parent: Expression, key: Expression, result_type: TypeDesc) -> Expression {
        Expression::LookupElement {
            parent: Box::new(parent),
            key: Box::new(key),
            result_type,
        }
    }

    pub fn call(callee: Expression, args: Vec<Expression>, result_type: TypeDesc) -> Expression {
        Expression::Call {
            callee: Box::new(callee),
            args,
            result_type,
        }
    }

    pub fn unary_minus(expr: Expression, result_type: TypeDesc) -> Expression {
        Expression::UnaryMinus {
            expr: Box::new(expr),
            result_type,
        }
    }

    pub fn arithmetic(
        op: ArithOp,
        left: Expression,
        right: Expression,
        result_type: TypeDesc,
    ) -> Expression {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
            result_type,
        }
    }

    pub fn comparison(op: CompareOp, left: Expression, right: Expression) -> Expression {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Expression {
        Expression::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn conditional(
        condition: Expression,
        a: Expression,
        b: Expression,
        result_type: TypeDesc,
    ) -> Expression {
        Expression::Conditional {
            condition: Box::new(condition),
            a: Box::new(a),
            b: Box::new(b),
            result_type,
        }
    }

    pub fn construct_value(value_type: TypeDesc, args: Vec<Expression>) -> Expression {
        Expression::ConstructValue { value_type, args }
    }

    pub fn function_definition(def: Rc<FunctionDef>) -> Expression {
        Expression::FunctionDefinition(def)
    }

    /// The statically resolved type of the value this expression yields.
    /// `Undefined` for an unresolved `Load`.
    pub fn result_type(&self) -> TypeDesc {
        match self {
            Expression::Literal(v) => v.get_type(),
            Expression::Load { .. } => TypeDesc::Undefined,
            Expression::LoadAddress { result_type, .. } => result_type.clone(),
            Expression::ResolveMember { result_type, .. } => result_type.clone(),
            Expression::LookupElement { result_type, .. } => result_type.clone(),
            Expression::Call { result_type, .. } => result_type.clone(),
            Expression::UnaryMinus { result_type, .. } => result_type.clone(),
            Expression::Arithmetic { result_type, .. } => result_type.clone(),
            Expression::Comparison { .. } => TypeDesc::Bool,
            Expression::Logical { .. } => TypeDesc::Bool,
            Expression::Conditional { result_type, .. } => result_type.clone(),
            Expression::ConstructValue { value_type, .. } => value_type.clone(),
            Expression::FunctionDefinition(def) => def.func_type.clone(),
        }
    }

    pub fn check_types_resolved(&self) -> bool {
        match self {
            Expression::Literal(v) => v.get_type().is_resolved(),
            Expression::Load { .. } => false,
            Expression::LoadAddress { result_type, .. } => result_type.is_resolved(),
            Expression::ResolveMember {
                parent,
                result_type,
                ..
            } => parent.check_types_resolved() && result_type.is_resolved(),
            Expression::LookupElement {
                parent,
                key,
                result_type,
            } => {
                parent.check_types_resolved()
                    && key.check_types_resolved()
                    && result_type.is_resolved()
            }
            Expression::Call {
                callee,
                args,
                result_type,
            } => {
                callee.check_types_resolved()
                    && args.iter().all(|a| a.check_types_resolved())
                    && result_type.is_resolved()
            }
            Expression::UnaryMinus { expr, result_type } => {
                expr.check_types_resolved() && result_type.is_resolved()
            }
            Expression::Arithmetic {
                left,
                right,
                result_type,
                ..
            } => {
                left.check_types_resolved()
                    && right.check_types_resolved()
                    && result_type.is_resolved()
            }
            Expression::Comparison { left, right, .. } => {
                left.check_types_resolved() && right.check_types_resolved()
            }
            Expression::Logical { left, right, .. } => {
                left.check_types_resolved() && right.check_types_resolved()
            }
            Expression::Conditional {
                condition,
                a,
                b,
                result_type,
            } => {
                condition.check_types_resolved()
                    && a.check_types_resolved()
                    && b.check_types_resolved()
                    && result_type.is_resolved()
            }
            Expression::ConstructValue { value_type, args } => {
                value_type.is_resolved() && args.iter().all(|a| a.check_types_resolved())
            }
            Expression::FunctionDefinition(def) => def.check_types_resolved(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// `0 ..< 3`: excludes the end value.
    Open,
    /// `0 ... 3`: includes the end value.
    Closed,
}

/// A statement together with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub location: Location,
    pub kind: StatementKind,
}

/// The closed set of statement forms.
///
/// Bind/assign come in two deliberate flavors: by name (before the
/// resolution pass) and by resolved address (after it). Slot addressing
/// gives O(1) variable access during execution instead of name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Return(Expression),
    DefineStruct {
        name: String,
        def: Rc<StructDef>,
    },
    DefineFunction {
        name: String,
        def: Rc<FunctionDef>,
    },
    /// Introduce a new name in the current lexical scope and initialize it.
    BindLocal {
        name: String,
        bind_type: TypeDesc,
        expr: Expression,
        mutability: Mutability,
    },
    /// Mutate an existing variable, by name.
    Assign {
        name: String,
        expr: Expression,
    },
    /// Mutate an existing variable, by resolved address.
    Assign2 {
        address: VariableAddress,
        expr: Expression,
    },
    /// Initialize an existing slot, by resolved address.
    Init2 {
        address: VariableAddress,
        expr: Expression,
    },
    Block(Body),
    IfElse {
        condition: Expression,
        then_body: Body,
        else_body: Body,
    },
    For {
        iterator_name: String,
        start: Expression,
        end: Expression,
        body: Body,
        range: RangeKind,
    },
    While {
        condition: Expression,
        body: Body,
    },
    Expression(Expression),
    /// Declarative system metadata, carried opaquely.
    SoftwareSystem(serde_json::Value),
    /// Declarative container metadata, carried opaquely.
    ContainerDef(serde_json::Value),
}

impl Statement {
    pub fn make_return(location: Location, expr: Expression) -> Statement {
        Statement {
            location,
            kind: StatementKind::Return(expr),
        }
    }

    pub fn make_define_struct(
        location: Location,
        name: impl Into<String>,
        def: Rc<StructDef>,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::DefineStruct {
                name: name.into(),
                def,
            },
        }
    }

    pub fn make_define_function(
        location: Location,
        name: impl Into<String>,
        def: Rc<FunctionDef>,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::DefineFunction {
                name: name.into(),
                def,
            },
        }
    }

    pub fn make_bind_local(
        location: Location,
        name: impl Into<String>,
        bind_type: TypeDesc,
        expr: Expression,
        mutability: Mutability,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::BindLocal {
                name: name.into(),
                bind_type,
                expr,
                mutability,
            },
        }
    }

    pub fn make_assign(location: Location, name: impl Into<String>, expr: Expression) -> Statement {
        Statement {
            location,
            kind: StatementKind::Assign {
                name: name.into(),
                expr,
            },
        }
    }

    pub fn make_assign2(
        location: Location,
        address: VariableAddress,
        expr: Expression,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::Assign2 { address, expr },
        }
    }

    pub fn make_init2(location: Location, address: VariableAddress, expr: Expression) -> Statement {
        Statement {
            location,
            kind: StatementKind::Init2 { address, expr },
        }
    }

    pub fn make_block(location: Location, body: Body) -> Statement {
        Statement {
            location,
            kind: StatementKind::Block(body),
        }
    }

    pub fn make_ifelse(
        location: Location,
        condition: Expression,
        then_body: Body,
        else_body: Body,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            },
        }
    }

    pub fn make_for(
        location: Location,
        iterator_name: impl Into<String>,
        start: Expression,
        end: Expression,
        body: Body,
        range: RangeKind,
    ) -> Statement {
        Statement {
            location,
            kind: StatementKind::For {
                iterator_name: iterator_name.into(),
                start,
                end,
                body,
                range,
            },
        }
    }

    pub fn make_while(location: Location, condition: Expression, body: Body) -> Statement {
        Statement {
            location,
            kind: StatementKind::While { condition, body },
        }
    }

    pub fn make_expression(location: Location, expr: Expression) -> Statement {
        Statement {
            location,
            kind: StatementKind::Expression(expr),
        }
    }

    pub fn make_software_system(location: Location, json: serde_json::Value) -> Statement {
        Statement {
            location,
            kind: StatementKind::SoftwareSystem(json),
        }
    }

    pub fn make_container_def(location: Location, json: serde_json::Value) -> Statement {
        Statement {
            location,
            kind: StatementKind::ContainerDef(json),
        }
    }

    pub fn check_types_resolved(&self) -> bool {
        match &self.kind {
            StatementKind::Return(e) => e.check_types_resolved(),
            StatementKind::DefineStruct { def, .. } => {
                def.members.iter().all(|m| m.member_type.is_resolved())
            }
            StatementKind::DefineFunction { def, .. } => def.check_types_resolved(),
            StatementKind::BindLocal {
                bind_type, expr, ..
            } => bind_type.is_resolved() && expr.check_types_resolved(),
            StatementKind::Assign { expr, .. } => expr.check_types_resolved(),
            StatementKind::Assign2 { expr, .. } => expr.check_types_resolved(),
            StatementKind::Init2 { expr, .. } => expr.check_types_resolved(),
            StatementKind::Block(body) => body.check_types_resolved(),
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                condition.check_types_resolved()
                    && then_body.check_types_resolved()
                    && else_body.check_types_resolved()
            }
            StatementKind::For {
                start, end, body, ..
            } => {
                start.check_types_resolved()
                    && end.check_types_resolved()
                    && body.check_types_resolved()
            }
            StatementKind::While { condition, body } => {
                condition.check_types_resolved() && body.check_types_resolved()
            }
            StatementKind::Expression(e) => e.check_types_resolved(),
            StatementKind::SoftwareSystem(_) | StatementKind::ContainerDef(_) => true,
        }
    }
}
