use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::Extensions;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Argument/result types a custom function can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

/// Name and signature under which a function is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: &'static str,
    pub args: Vec<ValueType>,
    pub result: ValueType,
    /// Result depends on state outside the evaluation; never memoize.
    pub nondeterministic: bool,
}

impl FunctionDecl {
    pub fn new(name: &'static str, args: Vec<ValueType>, result: ValueType) -> Self {
        Self {
            name,
            args,
            result,
            nondeterministic: false,
        }
    }

    pub fn nondeterministic(mut self) -> Self {
        self.nondeterministic = true;
        self
    }
}

/// Call site of a function inside a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub row: u32,
    pub col: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            file: file.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

/// Execution environment handed to the evaluator for one evaluation.
#[derive(Clone)]
pub struct EvalEnv {
    pub cancel: CancellationToken,
    /// Type-keyed bag for per-request state.
    pub context: Arc<Extensions>,
}

impl EvalEnv {
    pub fn new(cancel: CancellationToken, context: Extensions) -> Self {
        Self {
            cancel,
            context: Arc::new(context),
        }
    }

    /// Context for one function call at `location`.
    pub fn builtin_context(&self, location: Location) -> BuiltinContext {
        BuiltinContext {
            cancel: self.cancel.clone(),
            location,
            context: Arc::clone(&self.context),
        }
    }
}

/// What a custom function sees of the running evaluation.
#[derive(Clone)]
pub struct BuiltinContext {
    pub cancel: CancellationToken,
    pub location: Location,
    pub context: Arc<Extensions>,
}

/// Function-level error as surfaced to the evaluator. Carries no registry detail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuiltinError {
    #[error("unknown function: {0}")]
    Unknown(String),
    #[error("{function}: builtin failed")]
    Failed { function: String },
}

/// Native function callable from policy rules.
#[async_trait]
pub trait Builtin: Send + Sync {
    fn decl(&self) -> &FunctionDecl;
    async fn call(&self, bctx: &BuiltinContext, args: Vec<Value>) -> Result<Value, BuiltinError>;
}

#[derive(Debug, Error)]
pub enum EvalError {
    /// Evaluation stopped because its token was cancelled.
    #[error("evaluation aborted")]
    Aborted,
    #[error(transparent)]
    Builtin(#[from] BuiltinError),
    #[error("registration failed: {0}")]
    Registration(String),
    #[error("{0}")]
    Other(String),
}

/// Rule evaluator collaborator: function registration plus evaluate-to-decision.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    fn register(&mut self, function: Arc<dyn Builtin>) -> Result<(), EvalError>;
    async fn evaluate(&self, query: &str, input: Value, env: EvalEnv) -> Result<Value, EvalError>;
}
