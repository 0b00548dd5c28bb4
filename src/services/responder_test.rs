use super::*;
use crate::model::UserProfile;
use crate::services::admin;
use crate::services::notify::SYSCALL_TOAST;
use crate::state::test_helpers;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::timeout;

fn window(min_ms: u64, max_ms: u64) -> AutoReplyConfig {
    AutoReplyConfig { enabled: true, min_delay: Duration::from_millis(min_ms), max_delay: Duration::from_millis(max_ms) }
}

#[test]
fn delay_stays_inside_window() {
    let config = window(1000, 3000);
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let delay = pick_delay(&config, &mut rng);
        assert!(delay >= config.min_delay && delay <= config.max_delay, "delay {delay:?} out of range");
    }
}

#[test]
fn degenerate_window_uses_min() {
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(pick_delay(&window(500, 500), &mut rng), Duration::from_millis(500));
}

#[test]
fn replies_come_from_canned_set() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        assert!(CANNED_REPLIES.contains(&pick_reply(&mut rng)));
    }
}

#[test]
fn target_for_thread() {
    assert_eq!(ReplyTarget::for_thread("u1", ADMIN_THREAD_ID), ReplyTarget::AdminThread { user_id: "u1".into() });
    assert_eq!(
        ReplyTarget::for_thread("u1", "owner-7"),
        ReplyTarget::UserThread { user_id: "u1".into(), thread_id: "owner-7".into() }
    );
}

#[tokio::test]
async fn reply_in_other_thread_is_from_other_and_user_side_only() {
    let state = test_helpers::test_app_state();
    let owner = crate::model::Participant {
        id: "owner-7".into(),
        name: "Propriétaire".into(),
        avatar: "/placeholder.svg".into(),
        role: "owner".into(),
        email: None,
    };
    conversation::ensure_thread(&state, "u1", owner).await.expect("thread");
    let mut rx = state.notifier.subscribe();

    let pending = schedule_reply(&state, ReplyTarget::for_thread("u1", "owner-7"));
    let message = pending.wait().await.expect("reply should be delivered");

    assert_eq!(message.sender, Sender::Other);
    assert!(!message.read);
    let stored = conversation::load(&state, "u1").await.expect("load");
    let thread = stored.iter().find(|c| c.id == "owner-7").expect("thread");
    assert_eq!(thread.messages().last().expect("tail").id, message.id);
    assert!(admin::list_threads(&state).await.expect("list").is_empty());

    let toast = loop {
        let frame = timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("frame receive timed out")
            .expect("channel closed");
        if frame.syscall == SYSCALL_TOAST {
            break frame;
        }
    };
    assert_eq!(toast.data_str("audience"), Some("user:u1"));
    assert_eq!(toast.data_str("title"), Some(TOAST_TITLE));
}

#[tokio::test]
async fn reply_in_admin_thread_reaches_both_stores() {
    let state = test_helpers::test_app_state();
    admin::find_or_create_thread(&state, &UserProfile::new("u1")).await.expect("thread");

    let message = deliver_reply(&state, &ReplyTarget::for_thread("u1", ADMIN_THREAD_ID), CANNED_REPLIES[0])
        .await
        .expect("deliver");

    assert_eq!(message.sender, Sender::Admin);
    let admin_side = admin::list_threads(&state).await.expect("list");
    assert_eq!(admin_side[0].messages().last().expect("tail").id, message.id);
    let user_side = conversation::load(&state, "u1").await.expect("load");
    let thread = user_side.iter().find(|c| c.id == ADMIN_THREAD_ID).expect("thread");
    assert_eq!(thread.messages().last().expect("tail").id, message.id);
}

#[tokio::test]
async fn cancelled_reply_never_lands() {
    let mut state = test_helpers::test_app_state();
    let mut config = (*state.config).clone();
    config.auto_reply = window(200, 200);
    state.config = std::sync::Arc::new(config);
    let before = conversation::load(&state, "u1").await.expect("seed");

    let pending = schedule_reply(&state, ReplyTarget::UserThread { user_id: "u1".into(), thread_id: "welcome".into() });
    assert_eq!(pending.delay(), Duration::from_millis(200));
    pending.cancel();

    assert!(pending.wait().await.is_none());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(conversation::load(&state, "u1").await.expect("load"), before);
}

#[tokio::test]
async fn tracked_replies_cancel_per_thread() {
    let state = test_helpers::test_app_state_with_reply_delay(Duration::from_millis(200));
    let before = conversation::load(&state, "u1").await.expect("seed");
    let replies = PendingReplies::default();

    for _ in 0..2 {
        let pending = schedule_reply(&state, ReplyTarget::for_thread("u1", "welcome"));
        replies.track("u1", "welcome", pending).await;
    }

    assert_eq!(replies.cancel_thread("u1", "other-thread").await, 0);
    assert_eq!(replies.cancel_thread("u1", "welcome").await, 2);
    assert_eq!(replies.cancel_thread("u1", "welcome").await, 0);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(conversation::load(&state, "u1").await.expect("load"), before);
}

#[tokio::test]
async fn fired_replies_are_not_counted_as_cancelled() {
    let state = test_helpers::test_app_state();
    let replies = PendingReplies::default();

    let pending = schedule_reply(&state, ReplyTarget::for_thread("u1", "welcome"));
    replies.track("u1", "welcome", pending).await;
    tokio::time::sleep(test_helpers::TEST_REPLY_DELAY * 10).await;

    assert_eq!(replies.cancel_thread("u1", "welcome").await, 0);
}

#[tokio::test]
async fn failed_delivery_resolves_to_none() {
    let state = test_helpers::test_app_state();

    let pending = schedule_reply(&state, ReplyTarget::UserThread { user_id: "u1".into(), thread_id: "ghost".into() });

    assert!(pending.wait().await.is_none());
}
