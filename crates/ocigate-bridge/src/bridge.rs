//! Policy bridge: wires the evaluator, the registry namespace and the buffer
//! pool, then evaluates one request at a time.
//!
//! Construct once at startup and share via `Arc`. Each `evaluate` call builds
//! a fresh `EvaluationContext`; after the evaluator returns, the recorded
//! function error (if any) takes precedence over whatever the evaluator
//! reported, since an aborted evaluation carries no function detail.

use std::sync::Arc;
use std::time::Duration;

use http::{Extensions, Request};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use ocigate_core::error::{OcigateError, Result};

use crate::body::RequestBody;
use crate::builtins;
use crate::config::BridgeConfig;
use crate::context::EvaluationContext;
use crate::input;
use crate::policy::{EvalEnv, EvalError, PolicyEvaluator};
use crate::pool::BufferPool;
use crate::registry::Namespace;

/// Outcome of one evaluation. The request comes back to the caller,
/// possibly with its body swapped for a replayable one.
#[derive(Debug)]
pub struct Evaluation {
    pub request: Request<RequestBody>,
    pub result: Result<Value>,
}

pub struct PolicyBridge<E> {
    evaluator: E,
    namespace: Arc<dyn Namespace>,
    pool: BufferPool,
    query: String,
    deadline: Duration,
}

impl<E: PolicyEvaluator> PolicyBridge<E> {
    /// Register the bridge functions with `evaluator`.
    pub fn new(cfg: &BridgeConfig, mut evaluator: E, namespace: Arc<dyn Namespace>) -> Result<Self> {
        cfg.validate()?;

        let pool = BufferPool::new(cfg.pool.max_idle);
        builtins::register_builtins(&mut evaluator, pool.clone())
            .map_err(|e| OcigateError::Config(format!("builtin registration failed: {e}")))?;

        tracing::info!(
            query = %cfg.evaluation.query,
            deadline_ms = cfg.evaluation.deadline_ms,
            max_idle = cfg.pool.max_idle,
            "policy bridge ready"
        );

        Ok(Self {
            evaluator,
            namespace,
            pool,
            query: cfg.evaluation.query.clone(),
            deadline: Duration::from_millis(cfg.evaluation.deadline_ms),
        })
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Evaluate the configured query for `request`.
    ///
    /// Cancelling `parent` aborts the evaluation; the bridge also cancels a
    /// child token when the deadline passes or a function fails.
    pub async fn evaluate(&self, request: Request<RequestBody>, parent: &CancellationToken) -> Evaluation {
        let cancel = parent.child_token();
        let span = tracing::info_span!(
            "policy_eval",
            method = %request.method(),
            path = %request.uri().path(),
        );

        let input = input::request_input(&request);
        let fctx = EvaluationContext::new(request, Arc::clone(&self.namespace));
        let mut extensions = Extensions::new();
        fctx.attach(&mut extensions);
        let env = EvalEnv::new(cancel.clone(), extensions);

        let outcome = tokio::time::timeout(self.deadline, self.evaluator.evaluate(&self.query, input, env))
            .instrument(span.clone())
            .await;

        let result = match (fctx.take_error(), outcome) {
            (Some(err), _) => Err(err),
            (None, Ok(Ok(decision))) => Ok(decision),
            (None, Ok(Err(EvalError::Aborted))) => Err(OcigateError::Cancelled),
            (None, Ok(Err(e))) if cancel.is_cancelled() => {
                Err(OcigateError::Evaluation(format!("cancelled: {e}")))
            }
            (None, Ok(Err(e))) => Err(OcigateError::Evaluation(e.to_string())),
            (None, Err(_)) => {
                cancel.cancel();
                Err(OcigateError::DeadlineExceeded)
            }
        };

        span.in_scope(|| match &result {
            Ok(_) => tracing::debug!("decision reached"),
            Err(e) => tracing::warn!(kind = e.kind().as_str(), error = %e, "evaluation failed"),
        });

        let request = fctx.take_request().await;
        Evaluation { request, result }
    }
}
