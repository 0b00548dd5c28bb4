use super::*;
use crate::model::{MessageBody, UserProfile};
use crate::services::bridge;
use crate::services::conversation::ADMIN_THREAD_ID;
use crate::services::notify::{Audience, SYSCALL_STORAGE_CHANGED};
use crate::state::test_helpers;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// dispatch
// =============================================================================

#[test]
fn view_names() {
    assert!(is_valid_view("admin"));
    assert!(is_valid_view("user:u1"));
    assert!(!is_valid_view("user:"));
    assert!(!is_valid_view("guest"));
}

#[tokio::test]
async fn inbound_refresh_is_republished_and_acknowledged() {
    let state = test_helpers::test_app_state_quiet();
    let mut rx = state.notifier.subscribe();
    let mut own = HashSet::new();
    let req = Frame::request(SYSCALL_REFRESH, Data::new()).with_channel(ADMIN_CHANNEL);
    let text = serde_json::to_string(&req).expect("serialize");

    let replies = process_inbound_text(&state, "admin", &mut own, &text).await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].status, Status::Done);
    assert_eq!(replies[0].parent_id, Some(req.id));

    let notice = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("notice timed out")
        .expect("bus closed");
    assert_eq!(notice.syscall, SYSCALL_REFRESH);
    assert_eq!(notice.channel.as_deref(), Some(ADMIN_CHANNEL));
    assert_eq!(notice.from.as_deref(), Some("admin"));

    // The sender does not get its own notice back; other views do.
    assert!(!should_forward("admin", &mut own, &notice));
    assert!(should_forward("user:u1", &mut HashSet::new(), &notice));
}

#[tokio::test]
async fn invalid_json_yields_gateway_error() {
    let state = test_helpers::test_app_state_quiet();
    let replies = process_inbound_text(&state, "admin", &mut HashSet::new(), "{nope").await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].syscall, "gateway:error");
}

#[tokio::test]
async fn unknown_syscall_is_an_error_reply() {
    let state = test_helpers::test_app_state_quiet();
    let req = Frame::request("board:join", Data::new());
    let text = serde_json::to_string(&req).expect("serialize");

    let replies = process_inbound_text(&state, "admin", &mut HashSet::new(), &text).await;

    assert_eq!(replies[0].status, Status::Error);
    assert!(replies[0].data_str("message").is_some_and(|m| m.contains("board:join")));
}

#[tokio::test]
async fn dashboard_select_replies_with_the_thread() {
    let state = test_helpers::test_app_state_quiet();
    bridge::send_user_message(&state, &UserProfile::new("u1"), ADMIN_THREAD_ID, MessageBody::text("Shalom"))
        .await
        .expect("send");
    let req = Frame::request(SYSCALL_DASHBOARD_SELECT, Data::new()).with_data("userId", "u1");
    let text = serde_json::to_string(&req).expect("serialize");

    let replies = process_inbound_text(&state, "admin", &mut HashSet::new(), &text).await;

    assert_eq!(replies[0].status, Status::Done);
    let conversation = replies[0].data.get("conversation").expect("conversation");
    assert_eq!(conversation["id"], "u1");

    let req = Frame::request(SYSCALL_DASHBOARD_SNAPSHOT, Data::new());
    let text = serde_json::to_string(&req).expect("serialize");
    let replies = process_inbound_text(&state, "admin", &mut HashSet::new(), &text).await;
    let snapshot = replies[0].data.get("snapshot").expect("snapshot");
    assert_eq!(snapshot["selected"]["id"], "u1");
    assert_eq!(snapshot["unreadTotal"], 0);
}

#[tokio::test]
async fn dashboard_errors_carry_codes() {
    let state = test_helpers::test_app_state_quiet();
    let req = Frame::request(SYSCALL_DASHBOARD_SELECT, Data::new()).with_data("userId", "ghost");
    let text = serde_json::to_string(&req).expect("serialize");

    let replies = process_inbound_text(&state, "admin", &mut HashSet::new(), &text).await;
    assert_eq!(replies[0].status, Status::Error);
    assert_eq!(replies[0].data_str("code"), Some("E_ADMIN_THREAD_NOT_FOUND"));

    let replies = process_inbound_text(&state, "user:u1", &mut HashSet::new(), &text).await;
    assert_eq!(replies[0].status, Status::Error);
    assert!(replies[0].data_str("code").is_none());
}

#[test]
fn lag_forces_refresh_and_forgets_own_frames() {
    let mut own = HashSet::from([Uuid::new_v4(), Uuid::new_v4()]);

    let outbound = outbound_frame("admin", &mut own, Err(RecvError::Lagged(5)));

    let Outbound::Forward(frame) = outbound else {
        panic!("lag should forward a refresh, got {outbound:?}");
    };
    assert_eq!(frame.syscall, SYSCALL_REFRESH);
    assert_eq!(frame.channel.as_deref(), Some(ADMIN_CHANNEL));
    assert!(own.is_empty());
    assert!(matches!(outbound_frame("admin", &mut own, Err(RecvError::Closed)), Outbound::Closed));
}

#[test]
fn own_frame_is_skipped_once() {
    let frame = Frame::request(SYSCALL_REFRESH, Data::new());
    let mut own = HashSet::from([frame.id]);

    assert!(matches!(outbound_frame("admin", &mut own, Ok(frame.clone())), Outbound::Skip));
    assert!(matches!(outbound_frame("admin", &mut own, Ok(frame)), Outbound::Forward(_)));
}

#[test]
fn toasts_only_reach_their_audience() {
    let toast = Frame::request(SYSCALL_TOAST, Data::new()).with_data("audience", Audience::User("u1".into()).as_view());
    let mut own = HashSet::new();
    assert!(should_forward("user:u1", &mut own, &toast));
    assert!(!should_forward("user:u2", &mut own, &toast));
    assert!(!should_forward("admin", &mut own, &toast));

    let change = Frame::request(SYSCALL_STORAGE_CHANGED, Data::new());
    assert!(should_forward("user:u2", &mut own, &change));
}

// =============================================================================
// end to end
// =============================================================================

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, crate::routes::app(state)).await.expect("serve");
    });
    addr
}

async fn connect(addr: SocketAddr, view: &str) -> Client {
    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws?view={view}"))
        .await
        .expect("ws connect");
    let welcome = next_frame(&mut client).await;
    assert_eq!(welcome.syscall, SYSCALL_CONNECTED);
    assert_eq!(welcome.data_str("view"), Some(view));
    client
}

async fn next_frame(client: &mut Client) -> Frame {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("frame timed out")
            .expect("socket closed")
            .expect("socket error");
        if let WsMessage::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("frame json");
        }
    }
}

async fn next_with_syscall(client: &mut Client, syscall: &str) -> Frame {
    loop {
        let frame = next_frame(client).await;
        if frame.syscall == syscall {
            return frame;
        }
    }
}

#[tokio::test]
async fn user_send_reaches_admin_view_and_reply_toasts_user() {
    let state = test_helpers::test_app_state();
    let addr = spawn_server(state.clone()).await;
    let mut admin_view = connect(addr, "admin").await;
    let mut user_view = connect(addr, "user:u1").await;

    let outcome = bridge::send_user_message(
        &state,
        &UserProfile::new("u1").with_name("Miriam"),
        ADMIN_THREAD_ID,
        MessageBody::text("Bonjour"),
    )
    .await
    .expect("send");

    let refresh = next_with_syscall(&mut admin_view, SYSCALL_REFRESH).await;
    assert_eq!(refresh.channel.as_deref(), Some(ADMIN_CHANNEL));
    assert_eq!(refresh.from.as_deref(), Some("user:u1"));

    let reply = outcome.auto_reply.expect("auto-reply scheduled").wait().await.expect("reply delivered");
    let toast = next_with_syscall(&mut user_view, SYSCALL_TOAST).await;
    assert_eq!(toast.data_str("audience"), Some("user:u1"));
    assert_eq!(toast.data_str("description"), Some(reply.content.preview().as_str()));
}

#[tokio::test]
async fn view_refresh_is_relayed_to_other_views() {
    let state = test_helpers::test_app_state_quiet();
    let addr = spawn_server(state).await;
    let mut admin_view = connect(addr, "admin").await;
    let mut user_view = connect(addr, "user:u1").await;

    let req = Frame::request(SYSCALL_REFRESH, Data::new()).with_channel(ADMIN_CHANNEL);
    let text = serde_json::to_string(&req).expect("serialize");
    user_view.send(WsMessage::Text(text.into())).await.expect("send");

    let ack = next_frame(&mut user_view).await;
    assert_eq!(ack.parent_id, Some(req.id));
    assert_eq!(ack.status, Status::Done);

    let relayed = next_with_syscall(&mut admin_view, SYSCALL_REFRESH).await;
    assert_eq!(relayed.from.as_deref(), Some("user:u1"));
}

#[tokio::test]
async fn missing_view_is_rejected() {
    let state = test_helpers::test_app_state_quiet();
    let addr = spawn_server(state).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws")).await;

    assert!(result.is_err(), "upgrade without a view should be refused");
}
