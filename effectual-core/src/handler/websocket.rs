//! WebSocket family: peer text I/O and connection close

use async_trait::async_trait;

use crate::effect::Effect;
use crate::error::Error;
use crate::handler::HandlerContract;
use crate::outcome::Outcome;
use crate::reply::Reply;

/// Close code reported when the peer vanished without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// The peer side of the connection is gone.
///
/// Ports report this for operations attempted against a closed connection;
/// the handler turns it into [`Error::WebSocketClosed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerClosed {
    /// Observed close code
    pub close_code: u16,
    /// Close reason text
    pub reason: String,
}

impl PeerClosed {
    /// Record an observed close
    pub fn new(close_code: u16, reason: impl Into<String>) -> Self {
        Self {
            close_code,
            reason: reason.into(),
        }
    }
}

/// Backend connection the embedder supplies for WebSocket effects.
#[async_trait]
pub trait WebSocketPort: Send + Sync {
    /// Whether the connection is currently open
    async fn is_open(&self) -> bool;

    /// Send a text frame
    async fn send_text(&self, text: &str) -> Result<(), PeerClosed>;

    /// Wait for the next text frame
    async fn receive_text(&self) -> Result<String, PeerClosed>;

    /// Close the connection with a wire code and reason.
    ///
    /// Must be idempotent: closing an already-closed connection succeeds.
    async fn close(&self, code: u16, reason: &str) -> Result<(), PeerClosed>;
}

/// Specialized handler for the WebSocket family.
pub struct WebSocketHandler<P> {
    port: P,
}

impl<P> WebSocketHandler<P> {
    const DISPATCHER_NAME: &'static str = "WebSocketHandler";

    /// Wrap a connection port
    pub fn new(port: P) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<P: WebSocketPort> HandlerContract for WebSocketHandler<P> {
    async fn handle(&self, effect: Effect) -> Outcome<Reply, Error> {
        match effect {
            Effect::SendText { ref text } => {
                if !self.port.is_open().await {
                    return Outcome::Err(Error::WebSocketClosed {
                        effect,
                        close_code: ABNORMAL_CLOSURE,
                        reason: "peer_gone".to_string(),
                    });
                }
                let sent = self.port.send_text(text).await;
                match sent {
                    Ok(()) => Outcome::Ok(Reply::Unit),
                    Err(closed) => Outcome::Err(Error::WebSocketClosed {
                        effect,
                        close_code: closed.close_code,
                        reason: closed.reason,
                    }),
                }
            }
            Effect::ReceiveText => match self.port.receive_text().await {
                Ok(text) => Outcome::Ok(Reply::Text { text }),
                Err(closed) => Outcome::Err(Error::WebSocketClosed {
                    effect,
                    close_code: closed.close_code,
                    reason: closed.reason,
                }),
            },
            Effect::Close { reason } => {
                // Ports report PeerClosed when the peer beat us to it; a close
                // race still counts as closed.
                let _ = self.port.close(reason.wire_code(), &reason.to_string()).await;
                Outcome::Ok(Reply::Unit)
            }
            other => Outcome::Err(Error::Unhandled {
                effect: other,
                dispatcher_name: Self::DISPATCHER_NAME,
            }),
        }
    }
}
