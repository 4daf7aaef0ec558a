use std::rc::Rc;

use floyd_core::{Body, FunctionDef};

/// A fully resolved program, ready for execution: the global body (whose
/// symbol table is the global scope) plus the flat function table that
/// function values index by id. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct BcProgram {
    pub globals: Body,
    pub function_defs: Vec<Rc<FunctionDef>>,
}

impl BcProgram {
    /// The gate between resolution and execution: every type reachable
    /// from the program must be concrete.
    pub fn check_types_resolved(&self) -> bool {
        self.globals.check_types_resolved()
            && self
                .function_defs
                .iter()
                .all(|def| def.check_types_resolved())
    }
}
