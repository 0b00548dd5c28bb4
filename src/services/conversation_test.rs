use super::*;
use crate::frame::ErrorCode;
use crate::state::test_helpers;

fn text_of(message: &Message) -> &str {
    match &message.content {
        MessageBody::Text { text } => text,
        other => panic!("expected text body, got {other:?}"),
    }
}

#[tokio::test]
async fn load_seeds_defaults_for_new_user() {
    let state = test_helpers::test_app_state();

    let conversations = load(&state, "u1").await.expect("load should succeed");

    let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![WELCOME_THREAD_ID, ADMIN_THREAD_ID]);
    assert_eq!(conversations[0].messages()[0].sender, Sender::System);
    assert!(state.storage.get("conversations_u1").await.expect("get").is_some());
}

#[tokio::test]
async fn load_reseeds_corrupt_store() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_raw(&state, "conversations_u1", "{broken").await;

    let conversations = load(&state, "u1").await.expect("load should recover");

    assert_eq!(conversations.len(), 2);
    let reread = load(&state, "u1").await.expect("second load");
    assert_eq!(reread, conversations);
}

#[tokio::test]
async fn load_reads_legacy_bare_array() {
    let state = test_helpers::test_app_state();
    let legacy = r#"[{"id":"admin","participant":{"id":"admin","name":"Admin","avatar":"/a.svg","role":"admin"},
        "messages":[{"id":1,"content":"Salut","timestamp":5,"read":false,"sender":"admin"}],
        "lastMessage":{"content":"Salut","timestamp":5,"read":false,"sender":"admin"}}]"#;
    test_helpers::seed_raw(&state, "conversations_u1", legacy).await;

    let conversations = load(&state, "u1").await.expect("legacy store should load");

    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].messages()[0].id, "1");
}

#[tokio::test]
async fn append_message_updates_summary_and_persists() {
    let state = test_helpers::test_app_state();
    let message = Message::new(Sender::User, MessageBody::text("Bonjour")).with_read(true);

    let conversation = append_message(&state, "u1", ADMIN_THREAD_ID, message).await.expect("append");

    let last = conversation.last_message().expect("summary");
    assert_eq!(last.content, "Bonjour");
    assert_eq!(last.sender, Sender::User);
    assert!(last.read);

    let stored = load(&state, "u1").await.expect("load");
    let admin = stored.iter().find(|c| c.id == ADMIN_THREAD_ID).expect("admin thread");
    assert_eq!(text_of(admin.messages().last().expect("tail")), "Bonjour");
}

#[tokio::test]
async fn append_to_unknown_thread_fails_without_writing() {
    let state = test_helpers::test_app_state();
    let before = load(&state, "u1").await.expect("seed");

    let result = append_message(&state, "u1", "nope", Message::new(Sender::User, MessageBody::text("x"))).await;

    match result {
        Err(err @ ConversationError::ThreadNotFound(_)) => assert_eq!(err.error_code(), "E_THREAD_NOT_FOUND"),
        other => panic!("expected ThreadNotFound, got {other:?}"),
    }
    assert_eq!(load(&state, "u1").await.expect("load"), before);
}

#[tokio::test]
async fn mark_thread_read_flips_only_counterparty_messages() {
    let state = test_helpers::test_app_state();
    append_message(&state, "u1", ADMIN_THREAD_ID, Message::new(Sender::User, MessageBody::text("Bonjour")))
        .await
        .expect("append user");
    append_message(&state, "u1", ADMIN_THREAD_ID, Message::new(Sender::Admin, MessageBody::text("Bienvenue")))
        .await
        .expect("append admin");
    let before = load(&state, "u1").await.expect("load");
    let before_admin = before.iter().find(|c| c.id == ADMIN_THREAD_ID).expect("admin thread");

    let changed = mark_thread_read(&state, "u1", ADMIN_THREAD_ID).await.expect("mark read");

    assert_eq!(changed, 2);
    let after = load(&state, "u1").await.expect("load");
    let admin = after.iter().find(|c| c.id == ADMIN_THREAD_ID).expect("admin thread");
    for (old, new) in before_admin.messages().iter().zip(admin.messages()) {
        assert_eq!(old.id, new.id);
        assert_eq!(old.content, new.content);
        if new.sender == Sender::User {
            assert_eq!(old.read, new.read);
        } else {
            assert!(new.read);
        }
    }
    assert_eq!(admin.unread_count(Sender::User), 0);
}

#[tokio::test]
async fn ensure_thread_creates_once() {
    let state = test_helpers::test_app_state();
    let owner = Participant {
        id: "owner-7".into(),
        name: "Propriétaire".into(),
        avatar: PLACEHOLDER_AVATAR.into(),
        role: "owner".into(),
        email: None,
    };

    let created = ensure_thread(&state, "u1", owner.clone()).await.expect("create");
    let again = ensure_thread(&state, "u1", owner).await.expect("existing");

    assert_eq!(created.id, "owner-7");
    assert_eq!(again, created);
    assert_eq!(load(&state, "u1").await.expect("load").len(), 3);
}

#[tokio::test]
async fn list_threads_counts_unread_from_user_side() {
    let state = test_helpers::test_app_state();

    let threads = list_threads(&state, "u1").await.expect("list");

    assert!(threads.iter().all(|t| t.unread_count == 1));
}
