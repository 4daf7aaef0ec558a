pub mod ast;
pub mod ast_json;
pub mod error;
pub mod json;
pub mod types;
pub mod value;

pub use ast::{
    ArithOp, Body, CompareOp, Expression, FunctionDef, LogicalOp, Mutability, RangeKind,
    Statement, StatementKind, Symbol, SymbolTable, VariableAddress,
};
pub use error::{FloydError, Location};
pub use types::{
    typedesc_from_json, typedesc_to_json, Member, StructDef, TypeDesc, TypeJsonMode,
};
pub use value::{
    compare_value_deep, DictValue, FunctionValue, StructValue, Value, VectorValue,
};
