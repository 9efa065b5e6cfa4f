//! Registry-aware custom functions and their cancel-on-error adapter.
//!
//! Function bodies return `Result`. `Guarded` is the only place that turns
//! an error into the recorded-error-then-cancel protocol.

pub mod blob_digest;
pub mod request_body;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use ocigate_core::error::{OcigateError, Result};

use crate::context::EvaluationContext;
use crate::policy::{Builtin, BuiltinContext, BuiltinError, EvalError, FunctionDecl, PolicyEvaluator};
use crate::pool::BufferPool;

pub use blob_digest::BlobDigest;
pub use request_body::RequestBodyFn;

/// Function body running against the per-request context.
#[async_trait]
pub trait BridgeFunction: Send + Sync {
    fn decl(&self) -> &FunctionDecl;
    async fn eval(
        &self,
        fctx: &EvaluationContext,
        bctx: &BuiltinContext,
        args: Vec<Value>,
    ) -> Result<Value>;
}

/// Adapts a `BridgeFunction` to the evaluator's `Builtin` interface.
pub struct Guarded<F> {
    inner: F,
}

impl<F: BridgeFunction> Guarded<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<F: BridgeFunction> Builtin for Guarded<F> {
    fn decl(&self) -> &FunctionDecl {
        self.inner.decl()
    }

    async fn call(&self, bctx: &BuiltinContext, args: Vec<Value>) -> std::result::Result<Value, BuiltinError> {
        let name = self.inner.decl().name;

        let Some(fctx) = EvaluationContext::from_extensions(&bctx.context) else {
            tracing::error!(function = name, location = %bctx.location, "evaluation context not attached");
            bctx.cancel.cancel();
            return Err(BuiltinError::Failed {
                function: name.to_string(),
            });
        };

        let outcome = match check_arity(self.inner.decl(), &args) {
            Ok(()) => self.inner.eval(&fctx, bctx, args).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(
                    function = name,
                    location = %bctx.location,
                    kind = e.kind().as_str(),
                    error = %e,
                    "builtin failed, cancelling evaluation"
                );
                fctx.record(OcigateError::Builtin {
                    location: bctx.location.to_string(),
                    function: name.to_string(),
                    source: Box::new(e),
                });
                bctx.cancel.cancel();
                Err(BuiltinError::Failed {
                    function: name.to_string(),
                })
            }
        }
    }
}

/// Register every bridge function with `evaluator`.
pub fn register_builtins<E>(evaluator: &mut E, pool: BufferPool) -> std::result::Result<(), EvalError>
where
    E: PolicyEvaluator + ?Sized,
{
    evaluator.register(Arc::new(Guarded::new(BlobDigest::new())))?;
    evaluator.register(Arc::new(Guarded::new(RequestBodyFn::new(pool))))?;
    Ok(())
}

/// Race `fut` against cancellation of the evaluation.
pub(crate) async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OcigateError::Cancelled),
        out = fut => Ok(out),
    }
}

fn check_arity(decl: &FunctionDecl, args: &[Value]) -> Result<()> {
    if decl.args.len() != args.len() {
        return Err(OcigateError::BadArgument(format!(
            "{} takes {} arguments, got {}",
            decl.name,
            decl.args.len(),
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn string_arg<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| OcigateError::BadArgument(format!("{what} is not a string")))
}
