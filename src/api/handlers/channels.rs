//! Channel control handlers: list, connect, status, disconnect.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ChannelListResponse, ChannelStatusResponse, ChannelSummaryDto, ConnectResponse, TypingUserDto,
};
use crate::app_state::AppState;
use crate::domain::ChannelId;
use crate::error::RealtimeError;

/// `GET /channels`: List tracked channels and their states.
pub async fn list_channels(State(state): State<AppState>) -> impl IntoResponse {
    let channels: Vec<ChannelSummaryDto> = state
        .registry
        .list()
        .await
        .into_iter()
        .map(|(channel_id, state)| ChannelSummaryDto { channel_id, state })
        .collect();
    let total = channels.len();
    (StatusCode::OK, Json(ChannelListResponse { channels, total }))
}

/// `POST /channels/{id}/connect`: Start (or keep) a session.
///
/// # Errors
///
/// Returns [`RealtimeError::UnknownChannel`] if the channel has no secret.
pub async fn connect_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RealtimeError> {
    let channel_id = ChannelId::from(id);
    let session_state = state.registry.connect(channel_id.clone()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ConnectResponse {
            channel_id,
            state: session_state,
        }),
    ))
}

/// `GET /channels/{id}`: Session state, last termination, typing users.
///
/// # Errors
///
/// Returns [`RealtimeError::SessionNotFound`] if the channel has neither a
/// live session nor a recorded termination.
pub async fn channel_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RealtimeError> {
    let channel_id = ChannelId::from(id);
    let current = state.registry.status(&channel_id).await.ok();
    let last_termination = state.registry.last_termination(&channel_id).await;
    if current.is_none() && last_termination.is_none() {
        return Err(RealtimeError::SessionNotFound(channel_id));
    }

    let typing = state
        .typing
        .typing_in(&channel_id)
        .into_iter()
        .map(|(user_id, since)| TypingUserDto { user_id, since })
        .collect();

    Ok((
        StatusCode::OK,
        Json(ChannelStatusResponse {
            channel_id,
            state: current,
            last_termination,
            typing,
        }),
    ))
}

/// `DELETE /channels/{id}`: Stop a session.
///
/// # Errors
///
/// Returns [`RealtimeError::SessionNotFound`] if no session was tracked.
pub async fn disconnect_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RealtimeError> {
    let channel_id = ChannelId::from(id);
    if state.registry.disconnect(&channel_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(RealtimeError::SessionNotFound(channel_id))
    }
}

/// Channel routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/{id}", get(channel_status).delete(disconnect_channel))
        .route("/channels/{id}/connect", post(connect_channel))
}
