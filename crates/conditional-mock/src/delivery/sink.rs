//! Response body sinks.

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Blocking writer shared with the caller.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// Async stream shared with the caller.
pub type SharedStream = Arc<tokio::sync::Mutex<dyn AsyncWrite + Send + Unpin>>;

/// Where a successful response body is copied.
#[derive(Clone)]
pub enum Sink {
    /// Raw writable handle; the body is appended.
    Writer(SharedWriter),
    /// File path; the file's contents are replaced by the body.
    Path(PathBuf),
    /// Stream-like object written asynchronously.
    Stream(SharedStream),
}

impl Sink {
    pub fn writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Sink::Writer(Arc::new(Mutex::new(writer)))
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Sink::Path(path.into())
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: AsyncWrite + Send + Unpin + 'static,
    {
        Sink::Stream(Arc::new(tokio::sync::Mutex::new(stream)))
    }

    pub(crate) async fn write_body(&self, body: &[u8]) -> io::Result<()> {
        match self {
            Sink::Writer(writer) => {
                let mut writer = writer.lock();
                writer.write_all(body)?;
                writer.flush()
            }
            Sink::Path(path) => tokio::fs::write(path, body).await,
            Sink::Stream(stream) => {
                let mut guard = stream.lock().await;
                let stream = &mut *guard;
                stream.write_all(body).await?;
                stream.flush().await
            }
        }
    }
}

impl From<PathBuf> for Sink {
    fn from(path: PathBuf) -> Self {
        Sink::Path(path)
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Writer(_) => f.write_str("Writer(..)"),
            Sink::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Sink::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for Sink {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        PathBuf::deserialize(deserializer).map(Sink::Path)
    }
}
