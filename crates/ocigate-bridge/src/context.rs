//! Per-request evaluation context.
//!
//! One instance per evaluation. It travels to custom functions through the
//! evaluator's extensions bag under a private key type, so nothing outside
//! this module can read, replace or collide with it.

use std::fmt;
use std::sync::{Arc, Mutex};

use http::{Extensions, Request};
use tokio::sync::MutexGuard;

use ocigate_core::error::OcigateError;

use crate::body::RequestBody;
use crate::registry::Namespace;

pub struct EvaluationContext {
    request: tokio::sync::Mutex<Request<RequestBody>>,
    namespace: Arc<dyn Namespace>,
    last_error: Mutex<Option<OcigateError>>,
}

#[derive(Clone)]
struct ContextKey(Arc<EvaluationContext>);

impl EvaluationContext {
    pub fn new(request: Request<RequestBody>, namespace: Arc<dyn Namespace>) -> Arc<Self> {
        Arc::new(Self {
            request: tokio::sync::Mutex::new(request),
            namespace,
            last_error: Mutex::new(None),
        })
    }

    pub fn attach(self: &Arc<Self>, extensions: &mut Extensions) {
        extensions.insert(ContextKey(Arc::clone(self)));
    }

    pub fn from_extensions(extensions: &Extensions) -> Option<Arc<Self>> {
        extensions.get::<ContextKey>().map(|k| Arc::clone(&k.0))
    }

    pub fn namespace(&self) -> &Arc<dyn Namespace> {
        &self.namespace
    }

    pub async fn request(&self) -> MutexGuard<'_, Request<RequestBody>> {
        self.request.lock().await
    }

    /// Move the request out, leaving an empty one behind.
    pub async fn take_request(&self) -> Request<RequestBody> {
        std::mem::take(&mut *self.request.lock().await)
    }

    /// Last writer wins.
    pub fn record(&self, err: OcigateError) {
        match self.last_error.lock() {
            Ok(mut slot) => *slot = Some(err),
            Err(poisoned) => *poisoned.into_inner() = Some(err),
        }
    }

    pub fn has_error(&self) -> bool {
        match self.last_error.lock() {
            Ok(slot) => slot.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    pub fn take_error(&self) -> Option<OcigateError> {
        match self.last_error.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("has_error", &self.has_error())
            .finish_non_exhaustive()
    }
}
