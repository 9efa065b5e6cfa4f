use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use super::function::{Builtin, BuiltinContext, BuiltinError, FunctionDecl};

/// Registry of custom functions, keyed by declared name.
/// Evaluator implementations dispatch through it.
#[derive(Default)]
pub struct FunctionTable {
    functions: DashMap<&'static str, Arc<dyn Builtin>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }

    /// Returns the function previously registered under the same name.
    pub fn register(&self, function: Arc<dyn Builtin>) -> Option<Arc<dyn Builtin>> {
        self.functions.insert(function.decl().name, function)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions.iter().map(|e| *e.key()).collect()
    }

    pub fn decl(&self, name: &str) -> Option<FunctionDecl> {
        self.functions.get(name).map(|e| e.value().decl().clone())
    }

    /// Invoke by name. Argument checks belong to the function, so that a
    /// bad call goes through the same record-then-cancel path as any other
    /// failure.
    pub async fn call(
        &self,
        name: &str,
        bctx: &BuiltinContext,
        args: Vec<Value>,
    ) -> Result<Value, BuiltinError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| BuiltinError::Unknown(name.to_string()))?
            .value()
            .clone();

        function.call(bctx, args).await
    }
}
