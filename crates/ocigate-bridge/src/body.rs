//! Request bodies that can be peeked by policy and replayed downstream.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, ReadBuf};

use ocigate_core::error::{OcigateError, Result};

use crate::pool::PooledBuffer;

/// Opaque inbound byte stream.
pub type BodyStream = Pin<Box<dyn AsyncRead + Send>>;

/// Body of an inbound request as seen by the bridge.
#[derive(Default)]
pub enum RequestBody {
    /// No body at all.
    #[default]
    Empty,
    /// Not yet inspected.
    Stream(BodyStream),
    /// Already buffered by policy evaluation; reads start from offset 0.
    Replay(ReplayableBody),
}

impl RequestBody {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        RequestBody::Stream(Box::pin(reader))
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::from_reader(Cursor::new(bytes.into()))
    }

    pub fn is_empty_body(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn as_replay(&self) -> Option<&ReplayableBody> {
        match self {
            RequestBody::Replay(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("RequestBody::Empty"),
            RequestBody::Stream(_) => f.write_str("RequestBody::Stream(..)"),
            RequestBody::Replay(r) => f.debug_tuple("RequestBody::Replay").field(r).finish(),
        }
    }
}

impl AsyncRead for RequestBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            RequestBody::Empty => Poll::Ready(Ok(())),
            RequestBody::Stream(s) => s.as_mut().poll_read(cx, buf),
            RequestBody::Replay(r) => Pin::new(r).poll_read(cx, buf),
        }
    }
}

/// Read until `buf` is full or the stream ends. Returns the byte count.
pub async fn fill_buffer<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut n = 0;
    while n < buf.len() {
        let read = reader.read(&mut buf[n..]).await?;
        if read == 0 {
            break;
        }
        n += read;
    }
    Ok(n)
}

/// The valid prefix of a pooled buffer.
struct Filled {
    buf: Option<PooledBuffer>,
    len: usize,
}

impl AsRef<[u8]> for Filled {
    fn as_ref(&self) -> &[u8] {
        match &self.buf {
            Some(b) => &b[..self.len],
            None => &[],
        }
    }
}

/// Seekable view over the first `len` bytes of a pooled buffer.
///
/// Closing (explicitly or by drop) returns the buffer to its pool once;
/// later reads see an empty body.
pub struct ReplayableBody {
    cursor: Cursor<Filled>,
}

impl ReplayableBody {
    /// `len` must be in `1..=buf.capacity()`.
    pub fn new(buf: PooledBuffer, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(OcigateError::EmptyBody);
        }
        if len > buf.capacity() {
            return Err(OcigateError::InvalidBody(format!(
                "{len} bytes exceed buffer capacity {}",
                buf.capacity()
            )));
        }
        Ok(Self {
            cursor: Cursor::new(Filled {
                buf: Some(buf),
                len,
            }),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.cursor.get_ref().as_ref()
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn rewind(&mut self) {
        self.cursor.set_position(0);
    }

    /// Return the backing buffer to the pool. Idempotent.
    pub fn close(&mut self) {
        let filled = self.cursor.get_mut();
        filled.len = 0;
        if let Some(buf) = filled.buf.take() {
            buf.release();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.get_ref().buf.is_none()
    }
}

impl fmt::Debug for ReplayableBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayableBody")
            .field("len", &self.len())
            .field("position", &self.position())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Read for ReplayableBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.cursor, buf)
    }
}

impl Seek for ReplayableBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Seek::seek(&mut self.cursor, pos)
    }
}

impl AsyncRead for ReplayableBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().cursor).poll_read(cx, buf)
    }
}

impl AsyncSeek for ReplayableBody {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.get_mut().cursor).start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.get_mut().cursor).poll_complete(cx)
    }
}
