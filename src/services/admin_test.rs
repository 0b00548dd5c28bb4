use super::*;
use crate::model::MessageBody;
use crate::state::test_helpers;

fn user_message(text: &str) -> Message {
    Message::new(Sender::User, MessageBody::text(text)).with_read(true)
}

#[tokio::test]
async fn find_or_create_falls_back_for_missing_profile_fields() {
    let state = test_helpers::test_app_state();

    let thread = find_or_create_thread(&state, &UserProfile::new("u1")).await.expect("create");

    assert_eq!(thread.id, "u1");
    assert_eq!(thread.counterparty.name, UNKNOWN_USER_NAME);
    assert_eq!(thread.counterparty.avatar, PLACEHOLDER_AVATAR);
    assert_eq!(thread.counterparty.role, DEFAULT_USER_ROLE);
    assert!(thread.messages().is_empty());
}

#[tokio::test]
async fn find_or_create_reuses_existing_thread() {
    let state = test_helpers::test_app_state();
    let profile = UserProfile::new("u1").with_name("Miriam");

    find_or_create_thread(&state, &profile).await.expect("create");
    find_or_create_thread(&state, &UserProfile::new("u1")).await.expect("reuse");

    let threads = list_threads(&state).await.expect("list");
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].counterparty.name, "Miriam");
}

#[test]
fn blank_profile_fields_use_fallbacks() {
    let profile = UserProfile {
        id: "u1".into(),
        name: Some("   ".into()),
        email: Some(String::new()),
        avatar: None,
        role: Some("employer".into()),
    };
    let participant = participant_from_profile(&profile);
    assert_eq!(participant.name, UNKNOWN_USER_NAME);
    assert_eq!(participant.email, None);
    assert_eq!(participant.role, "employer");
}

#[tokio::test]
async fn append_exchange_orders_pair_and_sets_read_flags() {
    let state = test_helpers::test_app_state();
    let sent = user_message("Bonjour");
    let response = Message::new(Sender::Admin, MessageBody::text("Nous revenons vers vous"));

    let thread = append_exchange(&state, &UserProfile::new("u1"), &sent, Some(&response))
        .await
        .expect("append exchange");

    let messages = thread.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, sent.id);
    assert_eq!(messages[0].sender, Sender::User);
    assert!(!messages[0].read);
    assert_eq!(messages[1].sender, Sender::Admin);
    assert!(messages[1].read);
    assert_eq!(thread.last_message().expect("summary").sender, Sender::Admin);
}

#[tokio::test]
async fn append_exchange_without_response_ends_with_user_content() {
    let state = test_helpers::test_app_state();

    for text in ["un", "deux", "trois"] {
        append_exchange(&state, &UserProfile::new("u1"), &user_message(text), None)
            .await
            .expect("append exchange");
    }

    let threads = list_threads(&state).await.expect("list");
    let last = threads[0].last_message().expect("summary");
    assert_eq!(last.content, "trois");
    assert_eq!(unread_total(&state).await.expect("unread"), 3);
}

#[tokio::test]
async fn append_admin_message_requires_thread() {
    let state = test_helpers::test_app_state();
    let reply = Message::new(Sender::Admin, MessageBody::text("Bonjour"));

    let missing = append_admin_message(&state, "ghost", &reply).await;
    assert!(matches!(missing, Err(AdminError::ThreadNotFound(_))));

    find_or_create_thread(&state, &UserProfile::new("u1")).await.expect("create");
    let thread = append_admin_message(&state, "u1", &reply).await.expect("append");
    assert!(thread.messages()[0].read);
}

#[tokio::test]
async fn mark_thread_read_leaves_admin_messages_and_order() {
    let state = test_helpers::test_app_state();
    let profile = UserProfile::new("u1");
    append_exchange(&state, &profile, &user_message("un"), None).await.expect("append");
    append_exchange(&state, &profile, &user_message("deux"), None).await.expect("append");

    let changed = mark_thread_read(&state, "u1").await.expect("mark read");

    assert_eq!(changed, 2);
    assert_eq!(unread_total(&state).await.expect("unread"), 0);
    let threads = list_threads(&state).await.expect("list");
    let contents: Vec<_> = threads[0].messages().iter().map(|m| m.content.preview()).collect();
    assert_eq!(contents, vec!["un".to_string(), "deux".to_string()]);
}

#[tokio::test]
async fn corrupt_store_is_surfaced_on_list_and_replaced_on_write() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_raw(&state, keys::ADMIN_CONVERSATIONS, "not json").await;

    let listed = list_threads(&state).await;
    assert!(matches!(listed, Err(AdminError::Storage(StorageError::Corrupt { .. }))));

    append_exchange(&state, &UserProfile::new("u1"), &user_message("Bonjour"), None)
        .await
        .expect("write should replace corrupt store");
    assert_eq!(list_threads(&state).await.expect("list").len(), 1);
}

#[test]
fn admin_error_codes() {
    assert_eq!(AdminError::ThreadNotFound("u1".into()).error_code(), "E_ADMIN_THREAD_NOT_FOUND");
    let storage = AdminError::Storage(StorageError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(storage.error_code(), "E_DATABASE");
    assert!(storage.retryable());
}
