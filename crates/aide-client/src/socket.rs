//! Persistent socket connection to the assistant backend.
//!
//! The connection is split into a read task and a write task. The read
//! task decodes incoming frames and pushes [`ServerAction`]s into an
//! unbounded channel in arrival order; the write task drains a channel of
//! [`ClientRequest`]s. Loss of the connection surfaces as a final
//! `Disconnected` action carrying a mapped reason; the adapter never
//! reconnects on its own.

use futures_util::SinkExt;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::warn;

use aide_core::actions::ClientRequest;
use aide_core::actions::DisconnectReason;
use aide_core::actions::ServerAction;

use crate::auth::TokenProvider;
use crate::error::ClientError;
use crate::error::Result;
use crate::protocol;

pub struct ChatSocket {
    outgoing: mpsc::UnboundedSender<ClientRequest>,
    events: mpsc::UnboundedReceiver<ServerAction>,
}

impl ChatSocket {
    pub async fn connect(url: &str, token: &dyn TokenProvider) -> Result<Self> {
        let mut request = url.into_client_request()?;
        let bearer = token.bearer_token()?;
        let value = HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|err| ClientError::Auth(format!("invalid bearer token: {err}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);

        let (stream, _response) = connect_async(request).await?;
        let (mut sink, mut source) = stream.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientRequest>();

        tokio::spawn(async move {
            while let Some(request) = out_rx.recv().await {
                let frame = match protocol::encode_client_request(&request) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(event = request.event_name(), %err, "dropping unencodable request");
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(frame)).await {
                    warn!(%err, "socket write failed");
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            let _ = event_tx.send(ServerAction::Connected);
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let _ = event_tx.send(protocol::decode_server_event(&text));
                    }
                    Some(Ok(Message::Close(frame))) => break close_reason(frame),
                    Some(Ok(other)) => {
                        debug!(kind = ?other, "ignoring non-text frame");
                    }
                    Some(Err(err)) => break error_reason(&err),
                    None => break DisconnectReason::TransportClose,
                }
            };
            let _ = event_tx.send(ServerAction::Disconnected { reason });
        });

        Ok(Self {
            outgoing: out_tx,
            events: event_rx,
        })
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<ClientRequest> {
        self.outgoing.clone()
    }

    pub fn split(self) -> (
        mpsc::UnboundedSender<ClientRequest>,
        mpsc::UnboundedReceiver<ServerAction>,
    ) {
        (self.outgoing, self.events)
    }
}

fn close_reason(frame: Option<CloseFrame<'_>>) -> DisconnectReason {
    match frame {
        None => DisconnectReason::TransportClose,
        Some(frame) => match frame.code {
            CloseCode::Normal | CloseCode::Away => DisconnectReason::ServerShutdown,
            CloseCode::Abnormal => DisconnectReason::TransportClose,
            _ => {
                let reason = frame.reason.trim();
                if reason.contains("timeout") {
                    DisconnectReason::PingTimeout
                } else if reason.is_empty() {
                    DisconnectReason::Other(format!("close code {}", u16::from(frame.code)))
                } else {
                    DisconnectReason::Other(reason.to_string())
                }
            }
        },
    }
}

fn error_reason(err: &tungstenite::Error) -> DisconnectReason {
    match err {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Io(_) => DisconnectReason::TransportClose,
        other => DisconnectReason::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use aide_core::actions::DisconnectReason;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    use super::close_reason;

    fn frame(code: CloseCode, reason: &str) -> Option<CloseFrame<'static>> {
        Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })
    }

    #[test]
    fn normal_close_maps_to_server_shutdown() {
        assert_eq!(
            close_reason(frame(CloseCode::Normal, "")),
            DisconnectReason::ServerShutdown
        );
        assert_eq!(
            close_reason(frame(CloseCode::Away, "restarting")),
            DisconnectReason::ServerShutdown
        );
    }

    #[test]
    fn missing_or_abnormal_close_maps_to_transport_close() {
        assert_eq!(close_reason(None), DisconnectReason::TransportClose);
        assert_eq!(
            close_reason(frame(CloseCode::Abnormal, "")),
            DisconnectReason::TransportClose
        );
    }

    #[test]
    fn timeout_reason_text_maps_to_ping_timeout() {
        assert_eq!(
            close_reason(frame(CloseCode::Policy, "ping timeout")),
            DisconnectReason::PingTimeout
        );
    }

    #[test]
    fn other_codes_keep_their_reason_text() {
        assert_eq!(
            close_reason(frame(CloseCode::Policy, "session revoked")),
            DisconnectReason::Other("session revoked".to_string())
        );
    }
}
