//! Bridge connection loop.
//!
//! Forwards scoped realtime events to one browser client and answers its
//! control commands against the [`crate::service::SessionRegistry`].

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::messages::{BridgeCommand, BridgeMessage, BridgeRequest, CommandResult};
use super::scope::ChannelScope;
use crate::app_state::AppState;
use crate::domain::{ChannelForwarder, EventFilter, NormalizedEvent};
use crate::error::RealtimeError;

/// Bridge error code for a frame that is not a valid command.
const MALFORMED_COMMAND: u32 = 400;

/// Runs the read/write loop for a single bridge client.
///
/// Registers a [`ChannelForwarder`] with the dispatcher for the lifetime of
/// the connection and removes it on exit.
pub async fn run_connection(socket: WebSocket, state: AppState, scope: ChannelScope) {
    let scope = Arc::new(RwLock::new(scope));
    let client_id = uuid::Uuid::new_v4();
    let (forwarder, event_rx) =
        ChannelForwarder::new(format!("bridge-{client_id}"), state.bridge_buffer);
    let forwarder = Arc::new(forwarder);

    let filter_scope = Arc::clone(&scope);
    let handle = state.dispatcher.subscribe_filtered(
        Arc::clone(&forwarder) as Arc<dyn crate::domain::EventConsumer>,
        EventFilter::predicate(move |event| filter_scope.read().matches(&event.channel_id)),
    );
    tracing::debug!(%client_id, "bridge client connected");

    pump(socket, &state, &scope, event_rx).await;

    let _ = state.dispatcher.unsubscribe(handle);
    tracing::debug!(%client_id, dropped = forwarder.dropped(), "bridge client closed");
}

async fn pump(
    socket: WebSocket,
    state: &AppState,
    scope: &RwLock<ChannelScope>,
    mut event_rx: mpsc::Receiver<NormalizedEvent>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), state, scope).await;
                        if ws_tx.send(Message::text(reply.to_text())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let frame = BridgeMessage::Event(event).to_text();
                if ws_tx.send(Message::text(frame)).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Parses and executes one client command.
pub async fn handle_text_message(
    text: &str,
    state: &AppState,
    scope: &RwLock<ChannelScope>,
) -> BridgeMessage {
    let request = match serde_json::from_str::<BridgeRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            return BridgeMessage::Error {
                id: None,
                code: MALFORMED_COMMAND,
                message: format!("malformed command: {e}"),
            };
        }
    };

    match execute(request.command, state, scope).await {
        Ok(result) => BridgeMessage::Response {
            id: request.id,
            result,
        },
        Err(err) => BridgeMessage::Error {
            id: request.id,
            code: err.error_code(),
            message: err.to_string(),
        },
    }
}

async fn execute(
    command: BridgeCommand,
    state: &AppState,
    scope: &RwLock<ChannelScope>,
) -> Result<CommandResult, RealtimeError> {
    match command {
        BridgeCommand::Subscribe { channel_ids } => {
            let mut scope = scope.write();
            scope.subscribe(&channel_ids);
            Ok(scope_result(&scope))
        }
        BridgeCommand::Unsubscribe { channel_ids } => {
            let mut scope = scope.write();
            scope.unsubscribe(&channel_ids);
            Ok(scope_result(&scope))
        }
        BridgeCommand::Connect { channel_id } => {
            let current = state.registry.connect(channel_id.clone()).await?;
            Ok(CommandResult::Session {
                last_termination: state.registry.last_termination(&channel_id).await,
                channel_id,
                state: Some(current),
            })
        }
        BridgeCommand::Disconnect { channel_id } => {
            let existed = state.registry.disconnect(&channel_id).await;
            Ok(CommandResult::Disconnected {
                channel_id,
                existed,
            })
        }
        BridgeCommand::Status { channel_id } => Ok(CommandResult::Session {
            state: state.registry.status(&channel_id).await.ok(),
            last_termination: state.registry.last_termination(&channel_id).await,
            channel_id,
        }),
    }
}

fn scope_result(scope: &ChannelScope) -> CommandResult {
    CommandResult::Scope {
        channels: scope.channels(),
        all: scope.is_all(),
    }
}
