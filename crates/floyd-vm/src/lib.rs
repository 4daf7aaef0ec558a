pub mod bcvalue;
pub mod host;
pub mod interp;
pub mod program;
pub mod resolve;

pub use bcvalue::{bc_to_value, value_to_bc, BcDictValue, BcStructValue, BcValue, BcVectorValue};
pub use host::{default_host_defs, default_host_registry, HostContext, HostFunction, HostRegistry};
pub use interp::{construct_value_from_typeid, run_program, Interpreter, StatementResult};
pub use program::BcProgram;
pub use resolve::resolve_program;
