use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde_json::json;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::{
    events::SlackEnvelope,
    frames::{parse_socket_frame, FrameError, SocketFrame},
    socket::{SocketTransport, TransportError},
    web::{SlackWebClient, WebApiError},
};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Source of Socket Mode WebSocket URLs.
#[async_trait]
pub trait ConnectionOpener: Send + Sync {
    async fn open_connection(&self) -> Result<String, WebApiError>;
}

#[async_trait]
impl ConnectionOpener for SlackWebClient {
    async fn open_connection(&self) -> Result<String, WebApiError> {
        SlackWebClient::open_connection(self).await
    }
}

pub struct WebSocketTransport {
    opener: Arc<dyn ConnectionOpener>,
    sink: Mutex<Option<SplitSink<SocketStream, Message>>>,
    stream: Mutex<Option<SplitStream<SocketStream>>>,
}

impl WebSocketTransport {
    pub fn new(opener: Arc<dyn ConnectionOpener>) -> Self {
        Self { opener, sink: Mutex::new(None), stream: Mutex::new(None) }
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self
            .opener
            .open_connection()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (sink, stream) = socket.split();

        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream =
            guard.as_mut().ok_or_else(|| TransportError::Closed("not connected".to_owned()))?;

        loop {
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => return Err(TransportError::Closed("stream ended".to_owned())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "close frame".to_owned());
                    return Err(TransportError::Closed(reason));
                }
                _ => continue,
            };

            match parse_socket_frame(&text) {
                Ok(SocketFrame::Hello) => {
                    debug!(event_name = "ingress.slack.hello", "socket mode hello");
                }
                Ok(SocketFrame::Disconnect { reason }) => {
                    return Err(TransportError::Closed(reason));
                }
                Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                Err(FrameError::Payload { envelope_id, frame_type, message }) => {
                    warn!(
                        event_name = "ingress.slack.frame_invalid",
                        envelope_id = %envelope_id,
                        frame_type = %frame_type,
                        error = %message,
                        "dropping malformed envelope after acknowledgement"
                    );
                    self.acknowledge(&envelope_id).await?;
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.slack.frame_invalid",
                        error = %error,
                        "ignoring unreadable socket frame"
                    );
                }
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.sink.lock().await;
        let sink =
            guard.as_mut().ok_or_else(|| TransportError::Closed("not connected".to_owned()))?;
        sink.send(Message::Text(json!({ "envelope_id": envelope_id }).to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let sink = self.sink.lock().await.take();
        self.stream.lock().await.take();
        match sink {
            Some(mut sink) => {
                sink.close().await.map_err(|error| TransportError::Disconnect(error.to_string()))
            }
            None => Ok(()),
        }
    }
}
