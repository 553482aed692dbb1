//! STOMP over WebSocket.
//!
//! Outbound frames are sent one per text message. Inbound messages are fed
//! through a [`FrameDecoder`], so a message holding several frames (or a
//! heart-beat) is handled the same as on a raw stream. Bearer credentials go
//! on the upgrade request as well as in `CONNECT`, since some brokers check
//! only one of the two.

use async_trait::async_trait;
use futures_util::{
    SinkExt, Stream, StreamExt,
    stream::{SplitSink, SplitStream},
};
use roomfeed_core::Credentials;
use roomfeed_proto::{Frame, FrameDecoder};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError, Message as WsMessage,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};

use crate::{
    error::TransportError,
    transport::{FrameSink, FrameStream, Transport},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector for a fixed broker URL (`ws://` or `wss://`).
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Connector for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sink = WebSocketSink;
    type Stream = WebSocketFrames;

    async fn open(
        &self,
        credentials: &Credentials,
    ) -> Result<(Self::Sink, Self::Stream), TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        if let Some(token) = credentials.token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| TransportError::Connect(err.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, response) =
            connect_async(request).await.map_err(|err| TransportError::Connect(err.to_string()))?;
        tracing::debug!(url = %self.url, status = %response.status(), "websocket open");

        let (sink, stream) = socket.split();
        let frames = WebSocketFrames { inner: stream, decoder: FrameDecoder::new() };
        Ok((WebSocketSink { inner: sink }, frames))
    }
}

/// Write half; each frame becomes one text message.
pub struct WebSocketSink {
    inner: SplitSink<Socket, WsMessage>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let text = frame.to_text().map_err(TransportError::Malformed)?;
        self.inner
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|err| TransportError::WebSocket(err.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await.map_err(|err| TransportError::WebSocket(err.to_string()))
    }
}

/// Read half; decodes the text and binary messages as a STOMP byte stream.
pub struct WebSocketFrames {
    inner: SplitStream<Socket>,
    decoder: FrameDecoder,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next(&mut self) -> Option<Result<Frame, TransportError>> {
        next_frame(&mut self.inner, &mut self.decoder).await
    }
}

/// Next frame from `messages`, reading more only once `decoder` runs dry.
///
/// A bad frame is reported as [`TransportError::Malformed`]. The decoder
/// drops its buffer on error and message boundaries resynchronize framing,
/// so the stream stays usable.
async fn next_frame<S>(
    messages: &mut S,
    decoder: &mut FrameDecoder,
) -> Option<Result<Frame, TransportError>>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        match decoder.next_frame() {
            Ok(Some(frame)) => return Some(Ok(frame)),
            Ok(None) => {},
            Err(err) => return Some(Err(TransportError::Malformed(err))),
        }
        match messages.next().await? {
            Ok(WsMessage::Text(text)) => decoder.extend(text.as_str().as_bytes()),
            Ok(WsMessage::Binary(data)) => decoder.extend(&data),
            Ok(WsMessage::Close(_)) => return None,
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {},
            Err(err) => return Some(Err(TransportError::WebSocket(err.to_string()))),
        }
    }
}
