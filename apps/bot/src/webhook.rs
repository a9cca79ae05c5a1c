use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, BridgeError, Origin, Recipient, Request, WorkItem};
use crate::command::Command;

/// The subset of a Telegram update the bot reads.
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: Recipient,
}

#[derive(Clone)]
struct WebhookState {
    bridge: Bridge,
    token: Arc<str>,
}

pub fn router(bridge: Bridge, token: &str) -> Router {
    let state = WebhookState {
        bridge,
        token: Arc::from(token),
    };

    Router::new()
        .route("/", get(liveness))
        .route("/webhook/{token}", post(receive))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn liveness() -> &'static str {
    "Bot is running"
}

async fn receive(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    body: Bytes,
) -> StatusCode {
    if token != *state.token {
        return StatusCode::NOT_FOUND;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "malformed update");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let Some(item) = work_item(&update) else {
        debug!(update_id = update.update_id, "update carries no command");
        return StatusCode::OK;
    };

    match state.bridge.submit(item) {
        Ok(job_id) => {
            info!(update_id = update.update_id, job_id, "update queued");
            StatusCode::OK
        }
        Err(BridgeError::NotReady) => {
            warn!(update_id = update.update_id, "bridge not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn work_item(update: &Update) -> Option<WorkItem> {
    let message = update.message.as_ref()?;
    let command = Command::parse(message.text.as_deref()?)?;

    Some(WorkItem {
        origin: Origin::Webhook,
        recipient: message.chat.id,
        request: Request::Command(command),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_work_item_from_command() {
        let u = update(
            r#"{"update_id":1,"message":{"message_id":9,"chat":{"id":-100},"text":"/coin"}}"#,
        );

        assert_eq!(
            work_item(&u),
            Some(WorkItem {
                origin: Origin::Webhook,
                recipient: -100,
                request: Request::Command(Command::Coin),
            })
        );
    }

    #[test]
    fn test_updates_without_commands() {
        assert_eq!(work_item(&update(r#"{"update_id":2}"#)), None);
        assert_eq!(
            work_item(&update(r#"{"update_id":3,"message":{"chat":{"id":1}}}"#)),
            None
        );
        assert_eq!(
            work_item(&update(r#"{"update_id":4,"message":{"chat":{"id":1},"text":"hi"}}"#)),
            None
        );
    }
}
