//! REST control layer: route handlers, DTOs, and router composition.
//!
//! Routes sit at the root: `/health` plus the `/channels` resource.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete control router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::channels::routes())
        .merge(handlers::system::routes())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::{Dispatcher, StaticChannelDirectory, TypingTracker};
    use crate::relay::testing::{AfterScript, ConnectPlan, ESTABLISHED, ScriptedConnector, StubAuth};
    use crate::relay::{AuthBroker, RelayConnector, SessionDeps, SessionSettings};
    use crate::service::SessionRegistry;

    fn app() -> Router {
        let dispatcher = Dispatcher::new();
        let connector = ScriptedConnector::new(vec![ConnectPlan::open(
            &[ESTABLISHED],
            AfterScript::Hang,
        )]);
        let deps = SessionDeps {
            connector: connector as Arc<dyn RelayConnector>,
            auth: StubAuth::granting() as Arc<dyn AuthBroker>,
            dispatcher: dispatcher.clone(),
            settings: Arc::new(SessionSettings::new("wss://relay.test/app/key")),
        };
        let directory = Arc::new(StaticChannelDirectory::new().with("42", "x"));
        let state = AppState {
            registry: Arc::new(SessionRegistry::new(directory, deps)),
            dispatcher,
            typing: Arc::new(TypingTracker::new()),
            bridge_buffer: 16,
        };
        build_router().with_state(state)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty());
        let Ok(request) = request else {
            panic!("request should build");
        };
        let Ok(response) = app.clone().oneshot(request).await;
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should read");
        };
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn connecting_unknown_channel_is_not_found() {
        let app = app();
        let (status, body) = call(&app, Method::POST, "/channels/999/connect").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2001);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_list_status_disconnect() {
        let app = app();

        let (status, body) = call(&app, Method::POST, "/channels/42/connect").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["channel_id"], "42");

        tokio::time::sleep(Duration::from_secs(1)).await;

        let (status, body) = call(&app, Method::GET, "/channels").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["channels"][0]["state"], "subscribed");

        let (status, body) = call(&app, Method::GET, "/channels/42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "subscribed");
        assert_eq!(body["last_termination"], Value::Null);

        let (status, _) = call(&app, Method::DELETE, "/channels/42").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, "/channels/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(&app, Method::GET, "/channels/42").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], Value::Null);
        assert_eq!(body["last_termination"]["reason"], "disconnected");
    }

    #[tokio::test]
    async fn status_of_untracked_channel_is_not_found() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/channels/5").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], 2002);
    }
}
