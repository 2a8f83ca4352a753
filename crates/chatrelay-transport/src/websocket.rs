//! WebSocket backend sink using `tokio-tungstenite`.

use chatrelay_protocol::{Codec, JsonCodec, OutgoingPacket};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{ConnectionId, PacketSink, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A [`PacketSink`] that writes each packet as one binary WebSocket frame.
///
/// A WebSocket stream is ordered, and the stream sits behind a mutex so
/// only one frame is written at a time.
pub struct WebSocketSink<C: Codec = JsonCodec> {
    id: ConnectionId,
    ws: Mutex<WsStream>,
    codec: C,
}

impl WebSocketSink<JsonCodec> {
    /// Connects to a backend at `url` (e.g. `ws://127.0.0.1:25577`) using
    /// the JSON codec.
    pub async fn connect(
        id: ConnectionId,
        url: &str,
    ) -> Result<Self, TransportError> {
        Self::connect_with_codec(id, url, JsonCodec).await
    }
}

impl<C: Codec> WebSocketSink<C> {
    /// Connects to a backend at `url` with a custom codec.
    pub async fn connect_with_codec(
        id: ConnectionId,
        url: &str,
        codec: C,
    ) -> Result<Self, TransportError> {
        let (ws, _) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(%id, url, "connected backend sink");
        Ok(Self {
            id,
            ws: Mutex::new(ws),
            codec,
        })
    }

    /// The client connection this sink forwards for.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Closes the backend stream.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.ws.lock().await.close(None).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl<C: Codec> PacketSink for WebSocketSink<C> {
    type Error = TransportError;

    async fn send(&self, packet: OutgoingPacket) -> Result<(), Self::Error> {
        let bytes = self.codec.encode(&packet)?;
        tracing::trace!(id = %self.id, len = bytes.len(), "writing packet");
        self.ws
            .lock()
            .await
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    e,
                ))
            })
    }
}
