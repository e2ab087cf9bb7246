use std::sync::Arc;

use super::*;
use crate::state::test_helpers::{self, MockLlm};
use tutor::materials::MaterialItem;
use tutor::subscription::{BillingCycle, Plan, Subscription, SubscriptionStatus};
use tutor::{Preferences, ProficiencyLevel, Week};

fn request(question: &str) -> AskRequest {
    AskRequest::new(question, &Preferences::default(), None)
}

async fn exhaust(state: &AppState, account: &Account, n: u32) {
    let month = usage::current_month();
    for _ in 0..n {
        state.stores.usage.increment(account.id, &month).await.unwrap();
    }
}

// =============================================================================
// quota_signal
// =============================================================================

#[test]
fn quota_signal_counts_down() {
    assert_eq!(quota_signal(50, 10, false), (Some(40), false, false));
    assert_eq!(quota_signal(50, 45, false), (Some(5), true, false));
    assert_eq!(quota_signal(50, 50, false), (Some(0), true, true));
    assert_eq!(quota_signal(50, 60, false), (Some(0), true, true));
}

#[test]
fn quota_signal_is_silent_when_entitled() {
    assert_eq!(quota_signal(50, 500, true), (None, false, false));
}

// =============================================================================
// ask
// =============================================================================

#[tokio::test]
async fn blank_question_is_rejected_before_anything_else() {
    let llm = Arc::new(MockLlm::replying("x"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;

    let err = ask(&state, &account, request("   ")).await.unwrap_err();
    assert!(matches!(err, AskError::EmptyQuestion));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn first_ask_creates_conversation_and_counts() {
    let llm = Arc::new(MockLlm::replying("أهلين! كيفك؟"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;

    let resp = ask(&state, &account, request("how do I say hello?")).await.unwrap();
    assert_eq!(resp.answer.as_deref(), Some("أهلين! كيفك؟"));
    assert_eq!(resp.session_id.as_deref(), Some(session_id_for(&account).as_str()));
    assert_eq!(resp.remaining_messages, Some(49));
    assert!(!resp.limit_warning);
    assert!(!resp.max_limit_reached);
    assert_eq!(resp.direction.as_deref(), Some("rtl"));

    let conversation = resp.conversation.unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert!(conversation.messages[0].is_from_user());
    assert_eq!(conversation.messages[0].body, "how do I say hello?");
    assert!(!conversation.messages[1].is_from_user());
    assert_eq!(conversation.owner_email, "dana@x.io");
    assert_eq!(conversation.owner_name, "dana");

    let stored = state
        .stores
        .chat_logs
        .get(&session_id_for(&account))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.messages.len(), 2);
}

#[tokio::test]
async fn second_ask_appends_and_sends_history_in_prompt() {
    let llm = Arc::new(MockLlm::replying("reply"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;

    ask(&state, &account, request("first question")).await.unwrap();
    let resp = ask(&state, &account, request("second question")).await.unwrap();
    assert_eq!(resp.conversation.unwrap().messages.len(), 4);

    let prompt = llm.last_system_prompt().unwrap();
    assert!(prompt.contains("Student: first question"));
    assert!(prompt.contains("You (Laith): reply"));
    assert!(!prompt.contains("second question"));
}

#[tokio::test]
async fn lesson_materials_reach_the_prompt() {
    let llm = Arc::new(MockLlm::replying("ok"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;
    state
        .stores
        .materials
        .upsert_many(&[
            MaterialItem {
                id: "advanced_week_04_a".into(),
                hebrew_input: "בוקר טוב".into(),
                arabic_response: "صباح الخير".into(),
                pronunciation: "sabah el kheir".into(),
            },
            MaterialItem {
                id: "advanced_week_05_a".into(),
                hebrew_input: "לילה טוב".into(),
                arabic_response: "تصبح على خير".into(),
                pronunciation: "tisbah ala kheir".into(),
            },
        ])
        .await
        .unwrap();

    let prefs = Preferences {
        proficiency_level: ProficiencyLevel::Advanced,
        week: Week::new(4).unwrap(),
        ..Preferences::default()
    };
    ask(&state, &account, AskRequest::new("teach me", &prefs, None)).await.unwrap();

    let prompt = llm.last_system_prompt().unwrap();
    assert!(prompt.contains("صباح الخير"));
    assert!(!prompt.contains("تصبح على خير"));
}

#[tokio::test]
async fn limit_reached_refuses_without_llm_call() {
    let llm = Arc::new(MockLlm::replying("x"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;
    exhaust(&state, &account, 50).await;

    let err = ask(&state, &account, request("one more")).await.unwrap_err();
    assert!(matches!(err, AskError::QuotaExceeded));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn forty_ninth_to_fiftieth_reports_limit_reached() {
    let llm = Arc::new(MockLlm::replying("x"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;
    exhaust(&state, &account, 49).await;

    let resp = ask(&state, &account, request("last one")).await.unwrap();
    assert_eq!(resp.remaining_messages, Some(0));
    assert!(resp.max_limit_reached);
    assert!(resp.limit_warning);
}

#[tokio::test]
async fn active_subscription_bypasses_limit() {
    let llm = Arc::new(MockLlm::replying("x"));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;
    exhaust(&state, &account, 50).await;

    let now = OffsetDateTime::now_utc();
    let mut sub = Subscription::pending(account.id, &account.email, Plan::Premium, BillingCycle::Monthly, now);
    sub.transition(SubscriptionStatus::Active, now).unwrap();
    state.stores.subscriptions.put(&sub).await.unwrap();

    let resp = ask(&state, &account, request("premium question")).await.unwrap();
    assert_eq!(resp.remaining_messages, None);
    assert!(!resp.max_limit_reached);
}

#[tokio::test]
async fn llm_failure_does_not_count_or_append() {
    let llm = Arc::new(MockLlm::failing());
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;

    let err = ask(&state, &account, request("hello")).await.unwrap_err();
    assert!(matches!(err, AskError::Llm(_)));

    let used = state
        .stores
        .usage
        .get(account.id, &usage::current_month())
        .await
        .unwrap()
        .message_count;
    assert_eq!(used, 0);
    assert!(
        state
            .stores
            .chat_logs
            .get(&session_id_for(&account))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn missing_llm_is_unavailable() {
    let state = test_helpers::test_app_state();
    let (account, _) = test_helpers::seed_account(&state, "dana@x.io").await;
    let err = ask(&state, &account, request("hello")).await.unwrap_err();
    assert!(matches!(err, AskError::LlmUnavailable));
}
