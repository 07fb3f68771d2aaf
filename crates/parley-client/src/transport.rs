//! Length-prefixed framing over a byte stream.
//!
//! [`FrameWriter`] and [`FrameReader`] turn the two halves of any
//! `AsyncRead + AsyncWrite` stream into discrete payload send/receive
//! operations. TCP is used in production, `tokio::io::duplex` in tests.
//!
//! The halves own independent buffers, so the receive loop and the sender
//! never wait on each other except for the socket itself.

use std::io;

use bytes::{Bytes, BytesMut};
use parley_proto::{Frame, FrameFormat, ProtocolError};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket failure, including the peer closing the connection
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed length header or oversized frame
    #[error("framing error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// True if the connection was closed or reset by the other side.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            Self::Protocol(_) => false,
        }
    }
}

/// Sending half of a framed connection.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    format: FrameFormat,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a writer.
    pub fn new(inner: W, format: FrameFormat) -> Self {
        Self { inner, format, buf: BytesMut::new() }
    }

    /// Framing parameters in use.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Write one frame carrying `payload`, then flush.
    ///
    /// # Errors
    ///
    /// - `Protocol` if the payload does not fit the header
    /// - `Io` if the connection is closed or reset
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.send_frame(&Frame::new(Bytes::copy_from_slice(payload))).await
    }

    /// Write an already built frame, then flush.
    pub async fn send_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.buf.clear();
        frame.encode(&self.format, &mut self.buf)?;

        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;

        tracing::trace!(bytes = frame.payload.len(), "frame sent");
        Ok(())
    }

    /// Shut down the write direction.
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Receiving half of a framed connection.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    format: FrameFormat,
    header: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader.
    pub fn new(inner: R, format: FrameFormat) -> Self {
        let header = vec![0; format.header_width()];
        Self { inner, format, header }
    }

    /// Framing parameters in use.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Wait for the next frame and return its payload.
    ///
    /// Reads exactly one header, validates it, then reads exactly the
    /// declared number of payload bytes. Not cancel-safe: a partially read
    /// frame is lost if the future is dropped.
    ///
    /// # Errors
    ///
    /// - `Io` (`UnexpectedEof`) if the connection closes mid-frame or
    ///   between frames
    /// - `Protocol` if the header is not a decimal length or exceeds the
    ///   payload ceiling
    pub async fn receive(&mut self) -> Result<Bytes, TransportError> {
        self.inner.read_exact(&mut self.header).await?;
        let header = self.format.parse_header(&self.header)?;

        let size = usize::try_from(header.payload_size()).map_err(|_| {
            ProtocolError::PayloadTooLarge {
                size: header.payload_size(),
                max: self.format.max_payload_size(),
            }
        })?;

        let mut payload = BytesMut::zeroed(size);
        self.inner.read_exact(&mut payload).await?;

        tracing::trace!(bytes = size, "frame received");
        Ok(payload.freeze())
    }

    /// Wait for the next frame.
    pub async fn receive_frame(&mut self) -> Result<Frame, TransportError> {
        self.receive().await.map(Frame::new)
    }
}

/// Both halves of one framed stream.
///
/// Convenient when a single task drives the connection. A session splits it
/// with [`FramedTransport::into_split`] so the halves can live in different
/// tasks.
#[derive(Debug)]
pub struct FramedTransport<S> {
    reader: FrameReader<ReadHalf<S>>,
    writer: FrameWriter<WriteHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite> FramedTransport<S> {
    /// Frame `stream` using `format`.
    pub fn new(stream: S, format: FrameFormat) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self { reader: FrameReader::new(read, format), writer: FrameWriter::new(write, format) }
    }

    /// Send one payload.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.writer.send(payload).await
    }

    /// Receive one payload.
    pub async fn receive(&mut self) -> Result<Bytes, TransportError> {
        self.reader.receive().await
    }

    /// Separate the halves.
    pub fn into_split(self) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }
}
