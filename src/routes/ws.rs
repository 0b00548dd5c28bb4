//! WebSocket handler — notification stream for one view.
//!
//! DESIGN
//! ======
//! A view connects with `?view=admin` or `?view=user:<id>` and enters a
//! `select!` loop:
//! - Notification frames from the bus → filter by audience → forward
//! - Incoming view frames → parse + dispatch by syscall
//!
//! A view may post `conversations:refresh`; it is re-published on the bus
//! for the other views and acknowledged to the sender only. The admin view
//! may also request `dashboard:snapshot` and `dashboard:select`; service
//! errors come back as error frames carrying the typed error code.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with the view name
//! 2. Bus frames are forwarded until the socket closes or the bus shuts down
//! 3. A lagging view is told to refresh instead of receiving the frames it
//!    missed

use std::collections::{HashMap, HashSet};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services::dashboard;
use crate::services::notify::{ADMIN_CHANNEL, SYSCALL_REFRESH, SYSCALL_TOAST};
use crate::state::AppState;

pub const SYSCALL_CONNECTED: &str = "session:connected";
pub const SYSCALL_DASHBOARD_SNAPSHOT: &str = "dashboard:snapshot";
pub const SYSCALL_DASHBOARD_SELECT: &str = "dashboard:select";

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(view) = params.get("view").filter(|v| is_valid_view(v)).cloned() else {
        return (StatusCode::BAD_REQUEST, "view must be `admin` or `user:<id>`").into_response();
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, view))
}

fn is_valid_view(view: &str) -> bool {
    view == "admin" || view.strip_prefix("user:").is_some_and(|id| !id.is_empty())
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, view: String) {
    // Subscribe before the welcome frame so nothing published after it is missed.
    let mut bus = state.notifier.subscribe();
    // Frames this view published itself; skipped when they come back round.
    let mut own_frames: HashSet<Uuid> = HashSet::new();

    let welcome = Frame::request(SYSCALL_CONNECTED, Data::new()).with_data("view", view.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%view, "ws: view connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &view, &mut own_frames, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            result = bus.recv() => {
                let frame = match outbound_frame(&view, &mut own_frames, result) {
                    Outbound::Forward(frame) => frame,
                    Outbound::Skip => continue,
                    Outbound::Closed => break,
                };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    info!(%view, "ws: view disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(
    state: &AppState,
    view: &str,
    own_frames: &mut HashSet<Uuid>,
    text: &str,
) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%view, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    info!(%view, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    match req.syscall.as_str() {
        SYSCALL_REFRESH => {
            let channel = req.channel.clone().unwrap_or_else(|| ADMIN_CHANNEL.to_owned());
            let mut notice = Frame::request(SYSCALL_REFRESH, req.data.clone())
                .with_channel(channel)
                .with_from(view);
            notice.parent_id = Some(req.id);
            own_frames.insert(notice.id);
            let receivers = state.notifier.publish(notice);
            vec![req.done_with(Data::from([("receivers".to_owned(), serde_json::json!(receivers))]))]
        }
        SYSCALL_DASHBOARD_SNAPSHOT | SYSCALL_DASHBOARD_SELECT if view != "admin" => {
            vec![req.error(format!("{} is only available to the admin view", req.syscall))]
        }
        SYSCALL_DASHBOARD_SNAPSHOT => {
            let snapshot = dashboard::snapshot(state).await;
            vec![req.done_with(Data::from([("snapshot".to_owned(), serde_json::json!(snapshot))]))]
        }
        SYSCALL_DASHBOARD_SELECT => {
            let Some(user_id) = req.data_str("userId") else {
                return vec![req.error("userId required")];
            };
            match dashboard::select_thread(state, user_id).await {
                Ok(conversation) => {
                    vec![req.done_with(Data::from([("conversation".to_owned(), serde_json::json!(conversation))]))]
                }
                Err(e) => vec![req.error_from(&e)],
            }
        }
        _ => vec![req.error(format!("unknown syscall: {}", req.syscall))],
    }
}

/// What to do with one receive from the bus.
#[derive(Debug)]
enum Outbound {
    Forward(Frame),
    Skip,
    Closed,
}

/// Resolve one bus receive for this view. A lag replaces the missed frames
/// with a forced refresh and forgets the view's own frames, which may have
/// been among those skipped.
fn outbound_frame(view: &str, own_frames: &mut HashSet<Uuid>, result: Result<Frame, RecvError>) -> Outbound {
    match result {
        Ok(frame) if should_forward(view, own_frames, &frame) => Outbound::Forward(frame),
        Ok(_) => Outbound::Skip,
        Err(RecvError::Lagged(skipped)) => {
            warn!(%view, skipped, "ws: view lagged; forcing refresh");
            own_frames.clear();
            Outbound::Forward(Frame::request(SYSCALL_REFRESH, Data::new()).with_channel(ADMIN_CHANNEL))
        }
        Err(RecvError::Closed) => Outbound::Closed,
    }
}

/// Whether a bus frame belongs on this view's socket.
fn should_forward(view: &str, own_frames: &mut HashSet<Uuid>, frame: &Frame) -> bool {
    if own_frames.remove(&frame.id) {
        return false;
    }
    if frame.syscall == SYSCALL_TOAST {
        return frame.data_str("audience") == Some(view);
    }
    true
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let message = frame.data_str("message").unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
