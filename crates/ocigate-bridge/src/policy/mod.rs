//! Policy evaluator seam (function declarations, call context, dispatch).
//!
//! The rule engine itself is external. This module fixes what the bridge
//! needs from it: registration of native functions and an evaluate call
//! that threads a cancellable environment into every function invocation.

pub mod function;
pub mod table;

pub use function::{
    Builtin, BuiltinContext, BuiltinError, EvalEnv, EvalError, FunctionDecl, Location,
    PolicyEvaluator, ValueType,
};
pub use table::FunctionTable;
