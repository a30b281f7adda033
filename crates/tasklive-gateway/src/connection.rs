use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};

use tasklive_types::api::Claims;

use crate::dispatcher::Dispatcher;

/// Run a channel whose token was already verified at handshake time.
/// The subject is bound for the connection's lifetime — there is no
/// re-verification per event.
pub async fn handle_socket(socket: WebSocket, dispatcher: Dispatcher, claims: Claims) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = dispatcher.subscribe();

    info!(
        "{} ({}) channel open ({} connected)",
        claims.username,
        claims.sub,
        dispatcher.channel_count()
    );

    loop {
        tokio::select! {
            result = events.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // At-most-once delivery: the missed window is gone.
                        warn!("channel for {} lagged by {} events", claims.username, n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to serialize gateway event: {}", e);
                        continue;
                    }
                };

                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // This channel only pushes; client frames are ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("{} ({}) channel closed", claims.username, claims.sub);
}
