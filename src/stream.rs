//! Byte stream abstraction consumed by the handshake engines.
//!
//! Any blocking `Read + Write` type is a [`Stream`]; with the `async`
//! feature any tokio `AsyncRead + AsyncWrite` type is an [`AsyncStream`].

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::error::{FailureKind, Phase, Socks5Error};

#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Failure reported by a stream.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The peer closed before the transfer completed (includes a 0-byte read)
    #[error("stream closed by peer")]
    Closed,

    #[error("{0}")]
    Io(io::Error),
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => StreamError::Closed,
            _ => StreamError::Io(e),
        }
    }
}

impl StreamError {
    /// Turn a transport failure into a handshake error for `phase`.
    pub(crate) fn into_handshake_error(self, phase: Phase, action: &str) -> Socks5Error {
        match self {
            StreamError::Closed => Socks5Error::handshake(
                FailureKind::TransportClosed,
                phase,
                format!("Proxy closed the connection while trying to {}", action),
            ),
            StreamError::Io(e) => Socks5Error::handshake(
                FailureKind::TransportError,
                phase,
                format!("Failed to {}: {}", action, e),
            ),
        }
    }
}

/// Established, ordered byte channel to the proxy.
pub trait Stream {
    /// Write the whole buffer and flush it.
    fn send(&mut self, buf: &[u8]) -> Result<(), StreamError>;

    /// Fill `buf` completely or fail.
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError>;
}

impl<T: Read + Write + ?Sized> Stream for T {
    fn send(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.write_all(buf)?;
        self.flush()?;
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        self.read_exact(buf)?;
        Ok(())
    }
}

/// Async counterpart of [`Stream`].
#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncStream: Send {
    /// Write the whole buffer and flush it.
    async fn send(&mut self, buf: &[u8]) -> Result<(), StreamError>;

    /// Fill `buf` completely or fail.
    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError>;
}

#[cfg(feature = "async")]
#[async_trait]
impl<T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized> AsyncStream for T {
    async fn send(&mut self, buf: &[u8]) -> Result<(), StreamError> {
        self.write_all(buf).await?;
        self.flush().await?;
        Ok(())
    }

    async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<(), StreamError> {
        self.read_exact(buf).await?;
        Ok(())
    }
}
