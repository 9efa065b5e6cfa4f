//! `request.body()`: the current request body parsed as one JSON value.
//!
//! The stream is buffered once into a pooled buffer and the request body is
//! replaced by a replayable view over exactly the bytes read, so later
//! consumers still see the body from offset 0. Only the first
//! `BUFFER_SIZE` bytes are captured.

use async_trait::async_trait;
use serde_json::Value;

use ocigate_core::error::{OcigateError, Result};

use super::{cancellable, BridgeFunction};
use crate::body::{fill_buffer, ReplayableBody, RequestBody};
use crate::context::EvaluationContext;
use crate::policy::{BuiltinContext, FunctionDecl, ValueType};
use crate::pool::BufferPool;

pub const NAME: &str = "request.body";

pub struct RequestBodyFn {
    decl: FunctionDecl,
    pool: BufferPool,
}

impl RequestBodyFn {
    pub fn new(pool: BufferPool) -> Self {
        Self {
            decl: FunctionDecl::new(NAME, vec![], ValueType::Any).nondeterministic(),
            pool,
        }
    }
}

#[async_trait]
impl BridgeFunction for RequestBodyFn {
    fn decl(&self) -> &FunctionDecl {
        &self.decl
    }

    async fn eval(
        &self,
        fctx: &EvaluationContext,
        bctx: &BuiltinContext,
        _args: Vec<Value>,
    ) -> Result<Value> {
        let mut request = fctx.request().await;
        let body = request.body_mut();

        match std::mem::take(body) {
            RequestBody::Empty => Ok(Value::Null),
            RequestBody::Replay(mut replay) => {
                replay.rewind();
                let value = parse_value(replay.bytes());
                *body = RequestBody::Replay(replay);
                value
            }
            RequestBody::Stream(mut stream) => {
                let mut buf = self.pool.acquire();
                let n = match cancellable(&bctx.cancel, fill_buffer(&mut stream, &mut buf)).await {
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) => {
                        *body = RequestBody::Stream(stream);
                        return Err(e.into());
                    }
                    Err(e) => {
                        *body = RequestBody::Stream(stream);
                        return Err(e);
                    }
                };
                if n == 0 {
                    return Err(OcigateError::EmptyBody);
                }
                if n == buf.len() {
                    tracing::debug!(captured = n, "request body truncated to one buffer");
                }

                let replay = ReplayableBody::new(buf, n)?;
                let value = parse_value(replay.bytes());
                *body = RequestBody::Replay(replay);
                value
            }
        }
    }
}

/// First JSON value in `bytes`; trailing bytes are ignored.
fn parse_value(bytes: &[u8]) -> Result<Value> {
    let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();
    match values.next() {
        Some(Ok(v)) => Ok(v),
        Some(Err(e)) => Err(OcigateError::InvalidBody(e.to_string())),
        None => Err(OcigateError::InvalidBody("no json value".into())),
    }
}
