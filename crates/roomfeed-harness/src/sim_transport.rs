//! Simulated broker transport.
//!
//! STOMP frames over a Turmoil TCP stream. Unlike the WebSocket transport,
//! a TCP stream has no message boundaries, so reads go through a
//! [`FrameDecoder`] and a decode error loses the stream.

use async_trait::async_trait;
use roomfeed_client::{FrameSink, FrameStream, Transport, TransportError};
use roomfeed_core::Credentials;
use roomfeed_proto::{Frame, FrameDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

const READ_CHUNK: usize = 4096;

/// Connector for a simulated broker address such as `"broker:61613"`.
#[derive(Debug, Clone)]
pub struct SimTransport {
    addr: String,
}

impl SimTransport {
    /// Connector for `addr`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Sink = SimSink;
    type Stream = SimFrames;

    async fn open(
        &self,
        _credentials: &Credentials,
    ) -> Result<(Self::Sink, Self::Stream), TransportError> {
        let stream = TcpStream::connect(self.addr.as_str()).await?;
        let (read, write) = stream.into_split();
        tracing::debug!(addr = %self.addr, "simulated socket open");
        Ok((
            SimSink { inner: write },
            SimFrames { inner: read, decoder: FrameDecoder::new(), buf: vec![0; READ_CHUNK] },
        ))
    }
}

/// Write half.
pub struct SimSink {
    inner: OwnedWriteHalf,
}

#[async_trait]
impl FrameSink for SimSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.inner.write_all(&frame.to_bytes()).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Read half.
pub struct SimFrames {
    inner: OwnedReadHalf,
    decoder: FrameDecoder,
    buf: Vec<u8>,
}

#[async_trait]
impl FrameStream for SimFrames {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {},
                Err(err) => return Some(Err(TransportError::Framing(err))),
            }
            match self.inner.read(&mut self.buf).await {
                Ok(0) => return None,
                Ok(n) => self.decoder.extend(&self.buf[..n]),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}
