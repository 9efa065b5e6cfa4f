//! In-memory registry and a scripted evaluator shared by bridge tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use serde_json::{json, Map, Value};
use tokio::io::AsyncReadExt;

use ocigate_bridge::body::RequestBody;
use ocigate_bridge::policy::{
    Builtin, BuiltinContext, BuiltinError, EvalEnv, EvalError, FunctionDecl, FunctionTable,
    Location, PolicyEvaluator, ValueType,
};
use ocigate_bridge::registry::{
    Manifest, ManifestService, Namespace, Repository, StoredManifest, TagDescriptor, TagService,
};
use ocigate_core::digest::Digest;
use ocigate_core::error::RegistryError;
use ocigate_core::manifest::MEDIA_TYPE_IMAGE_MANIFEST;
use ocigate_core::reference::RepositoryName;

pub const RPM: &str = "application/x-rpm";
pub const TAR: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 64 hex chars made of `c`.
pub fn hex64(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

/// Manifest JSON with the given `(media_type, hex)` layers, in order.
pub fn manifest_json(layers: &[(&str, &str)]) -> String {
    let layers: Vec<Value> = layers
        .iter()
        .map(|(mt, hex)| json!({ "mediaType": mt, "size": 1, "digest": format!("sha256:{hex}") }))
        .collect();
    json!({
        "schemaVersion": 2,
        "mediaType": MEDIA_TYPE_IMAGE_MANIFEST,
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "size": 2,
            "digest": format!("sha256:{}", hex64('0')),
        },
        "layers": layers,
    })
    .to_string()
}

pub fn request(body: RequestBody) -> Request<RequestBody> {
    Request::builder()
        .method("PUT")
        .uri("/v2/team/app/manifests/v1?mode=strict")
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

pub async fn read_all(body: &mut RequestBody) -> Vec<u8> {
    let mut out = Vec::new();
    body.read_to_end(&mut out).await.unwrap();
    out
}

// --------------------
// In-memory registry
// --------------------

#[derive(Default)]
pub struct RepoState {
    tags: Mutex<HashMap<String, Digest>>,
    manifests: Mutex<HashMap<Digest, Bytes>>,
    tag_error: Mutex<Option<RegistryError>>,
    manifest_error: Mutex<Option<RegistryError>>,
    next: AtomicUsize,
}

impl RepoState {
    /// Store `payload` and point `tag` at it.
    pub fn put(&self, tag: &str, payload: impl Into<Bytes>) -> Digest {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let digest = Digest::parse(&format!("sha256:{n:064x}")).unwrap();
        self.manifests.lock().unwrap().insert(digest.clone(), payload.into());
        self.tags.lock().unwrap().insert(tag.to_string(), digest.clone());
        digest
    }

    pub fn remove_tag(&self, tag: &str) {
        self.tags.lock().unwrap().remove(tag);
    }

    pub fn fail_tags(&self, err: RegistryError) {
        *self.tag_error.lock().unwrap() = Some(err);
    }

    pub fn fail_manifests(&self, err: RegistryError) {
        *self.manifest_error.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl TagService for RepoState {
    async fn get(&self, tag: &str) -> Result<TagDescriptor, RegistryError> {
        if let Some(err) = self.tag_error.lock().unwrap().clone() {
            return Err(err);
        }
        let digest = self
            .tags
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .ok_or_else(|| RegistryError::TagUnknown { tag: tag.to_string() })?;
        Ok(TagDescriptor {
            media_type: MEDIA_TYPE_IMAGE_MANIFEST.to_string(),
            size: 0,
            digest,
        })
    }
}

#[async_trait]
impl ManifestService for RepoState {
    async fn get(&self, digest: &Digest) -> Result<Arc<dyn Manifest>, RegistryError> {
        if let Some(err) = self.manifest_error.lock().unwrap().clone() {
            return Err(err);
        }
        let payload = self
            .manifests
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .ok_or_else(|| RegistryError::ManifestUnknown { digest: digest.to_string() })?;
        Ok(Arc::new(StoredManifest::new(MEDIA_TYPE_IMAGE_MANIFEST, payload)))
    }
}

pub struct MemoryRepository {
    name: RepositoryName,
    state: Arc<RepoState>,
}

#[async_trait]
impl Repository for MemoryRepository {
    fn name(&self) -> &RepositoryName {
        &self.name
    }

    fn tags(&self) -> Arc<dyn TagService> {
        self.state.clone()
    }

    async fn manifests(&self) -> Result<Arc<dyn ManifestService>, RegistryError> {
        Ok(self.state.clone())
    }
}

#[derive(Default)]
pub struct MemoryNamespace {
    repos: Mutex<HashMap<String, Arc<RepoState>>>,
    open_error: Mutex<Option<RegistryError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryNamespace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every repository open waits `delay` first.
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn repo(&self, name: &str) -> Arc<RepoState> {
        self.repos
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn fail_open(&self, err: RegistryError) {
        *self.open_error.lock().unwrap() = Some(err);
    }

    /// Number of `repository` calls seen.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Namespace for MemoryNamespace {
    async fn repository(&self, name: &RepositoryName) -> Result<Arc<dyn Repository>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.open_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(Arc::new(MemoryRepository {
            name: name.clone(),
            state: self.repo(name.as_str()),
        }))
    }
}

// --------------------
// Scripted evaluator
// --------------------

/// One line of a scripted policy.
pub enum Step {
    /// Call `name(args)` and bind the result under `bind`.
    Call {
        name: &'static str,
        args: Vec<Value>,
        bind: &'static str,
    },
    /// Run arbitrary code between calls (e.g. mutate the registry).
    Hook(Box<dyn Fn() + Send + Sync>),
    Sleep(Duration),
}

pub fn call(name: &'static str, args: Vec<Value>, bind: &'static str) -> Step {
    Step::Call { name, args, bind }
}

/// Runs its steps in order, one call at a time, and stops scheduling once
/// the environment is cancelled. Deterministic functions are memoized per
/// evaluation.
pub struct ScriptedEvaluator {
    table: FunctionTable,
    steps: Vec<Step>,
}

impl ScriptedEvaluator {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            table: FunctionTable::new(),
            steps,
        }
    }

    pub fn table(&self) -> &FunctionTable {
        &self.table
    }
}

#[async_trait]
impl PolicyEvaluator for ScriptedEvaluator {
    fn register(&mut self, function: Arc<dyn Builtin>) -> Result<(), EvalError> {
        let name = function.decl().name;
        match self.table.register(function) {
            Some(_) => Err(EvalError::Registration(format!("duplicate function {name}"))),
            None => Ok(()),
        }
    }

    async fn evaluate(&self, _query: &str, input: Value, env: EvalEnv) -> Result<Value, EvalError> {
        let mut out = Map::new();
        out.insert("input".into(), input);
        let mut memo: HashMap<String, Value> = HashMap::new();

        for (row, step) in self.steps.iter().enumerate() {
            if env.cancel.is_cancelled() {
                return Err(EvalError::Aborted);
            }
            match step {
                Step::Call { name, args, bind } => {
                    let decl = self
                        .table
                        .decl(name)
                        .ok_or_else(|| EvalError::Other(format!("undefined function {name}")))?;
                    let key = format!("{name}{}", Value::Array(args.clone()));
                    if !decl.nondeterministic {
                        if let Some(v) = memo.get(&key) {
                            out.insert(bind.to_string(), v.clone());
                            continue;
                        }
                    }

                    let bctx = env.builtin_context(Location::new("router.rego", row as u32 + 1, 5));
                    match self.table.call(name, &bctx, args.clone()).await {
                        Ok(v) => {
                            if !decl.nondeterministic {
                                memo.insert(key, v.clone());
                            }
                            out.insert(bind.to_string(), v);
                        }
                        Err(_) if env.cancel.is_cancelled() => return Err(EvalError::Aborted),
                        Err(e) => return Err(e.into()),
                    }
                }
                Step::Hook(f) => f(),
                Step::Sleep(d) => {
                    tokio::select! {
                        _ = env.cancel.cancelled() => return Err(EvalError::Aborted),
                        _ = tokio::time::sleep(*d) => {}
                    }
                }
            }
        }

        Ok(Value::Object(out))
    }
}

/// Deterministic function counting its invocations.
pub struct CountingFn {
    decl: FunctionDecl,
    pub calls: AtomicUsize,
}

impl CountingFn {
    pub fn new(name: &'static str) -> Self {
        Self {
            decl: FunctionDecl::new(name, vec![ValueType::String], ValueType::Number),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Builtin for CountingFn {
    fn decl(&self) -> &FunctionDecl {
        &self.decl
    }

    async fn call(&self, _bctx: &BuiltinContext, _args: Vec<Value>) -> Result<Value, BuiltinError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!(n))
    }
}

// --------------------
// Direct call harness
// --------------------

/// Bridge functions registered on a scripted evaluator, called one at a time
/// against a fresh context, so tests can inspect the slot and the token.
pub struct Harness {
    pub evaluator: ScriptedEvaluator,
    pub namespace: Arc<MemoryNamespace>,
    pub pool: ocigate_bridge::pool::BufferPool,
}

pub struct Called {
    pub result: Result<Value, BuiltinError>,
    pub fctx: Arc<ocigate_bridge::EvaluationContext>,
    pub cancel: tokio_util::sync::CancellationToken,
}

impl Harness {
    pub fn new(namespace: Arc<MemoryNamespace>) -> Self {
        let pool = ocigate_bridge::pool::BufferPool::new(16);
        let mut evaluator = ScriptedEvaluator::new(vec![]);
        ocigate_bridge::builtins::register_builtins(&mut evaluator, pool.clone()).unwrap();
        Self {
            evaluator,
            namespace,
            pool,
        }
    }

    pub async fn call(&self, name: &str, args: Vec<Value>, request: Request<RequestBody>) -> Called {
        let fctx = ocigate_bridge::EvaluationContext::new(request, self.namespace.clone());
        self.call_in(&fctx, name, args).await
    }

    /// Call inside an existing context (several calls in one evaluation).
    pub async fn call_in(
        &self,
        fctx: &Arc<ocigate_bridge::EvaluationContext>,
        name: &str,
        args: Vec<Value>,
    ) -> Called {
        let cancel = tokio_util::sync::CancellationToken::new();
        let mut ext = http::Extensions::new();
        fctx.attach(&mut ext);
        let env = EvalEnv::new(cancel.clone(), ext);
        let bctx = env.builtin_context(Location::new("router.rego", 7, 3));
        let result = self.evaluator.table().call(name, &bctx, args).await;
        Called {
            result,
            fctx: Arc::clone(fctx),
            cancel,
        }
    }
}
