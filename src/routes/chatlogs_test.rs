use super::*;
use crate::state::test_helpers::{ADMIN_EMAIL, seed_account, test_app_state};
use time::OffsetDateTime;
use tutor::Message;

async fn auth_for(state: &AppState, email: &str) -> AuthUser {
    let (account, token) = seed_account(state, email).await;
    AuthUser { account, token }
}

async fn seed_log(state: &AppState, session_id: &str) {
    let now = OffsetDateTime::now_utc();
    let mut conversation = Conversation::new(session_id, "owner", now);
    conversation.append([Message::user("hi"), Message::assistant("ahlan")], now);
    state.stores.chat_logs.upsert(&conversation).await.unwrap();
}

#[test]
fn chatlog_errors_map_to_status() {
    assert_eq!(chatlog_error_to_status(&ChatLogError::InvalidDate("x".into())), StatusCode::BAD_REQUEST);
    assert_eq!(chatlog_error_to_status(&ChatLogError::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(chatlog_error_to_status(&ChatLogError::Forbidden), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_reads_and_deletes_own_log() {
    let state = test_app_state();
    let own = tutor::resolve_identity(Some("dana@x.io"));
    seed_log(&state, &own).await;

    let auth = auth_for(&state, "dana@x.io").await;
    let Json(conversation) = get_chat_log(State(state.clone()), auth, Path(own.clone())).await.unwrap();
    assert_eq!(conversation.messages.len(), 2);

    let auth = auth_for(&state, "dana@x.io").await;
    let Json(body) = delete_chat_log(State(state.clone()), auth, Path(own.clone())).await.unwrap();
    assert_eq!(body["success"], true);

    let auth = auth_for(&state, "dana@x.io").await;
    assert_eq!(get_chat_log(State(state), auth, Path(own)).await.err(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn strangers_are_forbidden_but_admins_are_not() {
    let state = test_app_state();
    seed_log(&state, "u_other").await;

    let stranger = auth_for(&state, "dana@x.io").await;
    assert_eq!(
        get_chat_log(State(state.clone()), stranger, Path("u_other".into())).await.err(),
        Some(StatusCode::FORBIDDEN)
    );

    let admin = auth_for(&state, ADMIN_EMAIL).await;
    assert!(get_chat_log(State(state.clone()), admin, Path("u_other".into())).await.is_ok());

    let admin = auth_for(&state, ADMIN_EMAIL).await;
    assert_eq!(
        delete_chat_log(State(state), admin, Path("u_missing".into())).await.err(),
        Some(StatusCode::NOT_FOUND)
    );
}

#[tokio::test]
async fn admin_lists_and_clears_logs() {
    let state = test_app_state();
    seed_log(&state, "u_a").await;
    seed_log(&state, "u_b").await;
    let (admin, _) = seed_account(&state, ADMIN_EMAIL).await;

    let Json(page) = list_chat_logs(State(state.clone()), AdminUser(admin.clone()), Query(ChatLogParams::default()))
        .await
        .unwrap();
    assert_eq!(page.chats.len(), 2);
    assert_eq!(page.total_pages, 1);

    let bad = ChatLogParams { date_from: Some("nope".into()), ..ChatLogParams::default() };
    assert_eq!(
        list_chat_logs(State(state.clone()), AdminUser(admin.clone()), Query(bad)).await.err(),
        Some(StatusCode::BAD_REQUEST)
    );

    let Json(body) = delete_all_chat_logs(State(state.clone()), AdminUser(admin.clone())).await.unwrap();
    assert_eq!(body["deleted"], 2);
    let Json(page) = list_chat_logs(State(state), AdminUser(admin), Query(ChatLogParams::default())).await.unwrap();
    assert!(page.chats.is_empty());
}
