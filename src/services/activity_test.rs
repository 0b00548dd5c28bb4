use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn record_appends_structured_entry() {
    let state = test_helpers::test_app_state();

    let entry = record(&state, ActivityLog::Security, "login_failed", json!({"attempts": 3}))
        .await
        .expect("record");

    assert_eq!(entry["event"], "login_failed");
    assert_eq!(entry["details"]["attempts"], 3);
    let entries = list(&state, ActivityLog::Security).await.expect("list");
    assert_eq!(entries, vec![entry]);
    assert!(list(&state, ActivityLog::Suspicious).await.expect("list").is_empty());
}

#[tokio::test]
async fn log_keeps_newest_entries_up_to_limit() {
    let mut state = test_helpers::test_app_state();
    let mut config = (*state.config).clone();
    config.activity_log_limit = 3;
    state.config = std::sync::Arc::new(config);

    for i in 0..5 {
        record(&state, ActivityLog::AdminAccess, "view", json!({"n": i})).await.expect("record");
    }

    let entries = list(&state, ActivityLog::AdminAccess).await.expect("list");
    let ns: Vec<i64> = entries.iter().filter_map(|e| e["details"]["n"].as_i64()).collect();
    assert_eq!(ns, vec![2, 3, 4]);
}

#[tokio::test]
async fn legacy_free_form_entries_survive() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_raw(&state, keys::SUSPICIOUS_ACTIVITIES, r#"[{"type":"rapid_clicks","at":"2024-01-01"}]"#).await;

    record(&state, ActivityLog::Suspicious, "fingerprint_mismatch", json!({})).await.expect("record");

    let entries = list(&state, ActivityLog::Suspicious).await.expect("list");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["type"], "rapid_clicks");
}

#[tokio::test]
async fn clear_removes_log() {
    let state = test_helpers::test_app_state();
    record(&state, ActivityLog::Security, "x", json!(null)).await.expect("record");

    clear(&state, ActivityLog::Security).await.expect("clear");

    assert!(list(&state, ActivityLog::Security).await.expect("list").is_empty());
}

#[test]
fn log_keys() {
    assert_eq!(ActivityLog::Security.key(), "security_logs");
    assert_eq!(ActivityLog::AdminAccess.key(), "admin_access_logs");
    assert_eq!(ActivityLog::Suspicious.key(), "suspicious_activities");
}
