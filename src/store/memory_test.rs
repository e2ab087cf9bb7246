use super::*;
use time::Duration;
use time::macros::datetime;

fn log(session: &str, owner: &str, email: &str, name: &str, created: OffsetDateTime) -> Conversation {
    let mut c = Conversation::new(session, owner, created);
    c.owner_email = email.to_owned();
    c.owner_name = name.to_owned();
    c
}

fn item(id: &str) -> MaterialItem {
    MaterialItem {
        id: id.to_owned(),
        hebrew_input: "שלום".to_owned(),
        arabic_response: "مرحبا".to_owned(),
        pronunciation: "marhaba".to_owned(),
    }
}

// =============================================================================
// accounts and login codes
// =============================================================================

#[tokio::test]
async fn upsert_account_keeps_first_name() {
    let store = MemoryStore::default();
    let first = store.upsert_account("a@x.io", "a").await.unwrap();
    let again = store.upsert_account("a@x.io", "other").await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(again.name, "a");
}

#[tokio::test]
async fn session_expiry_is_honored() {
    let store = MemoryStore::default();
    let account = store.upsert_account("a@x.io", "a").await.unwrap();
    let now = OffsetDateTime::now_utc();
    store
        .insert_session("tok", account.id, now + Duration::hours(1))
        .await
        .unwrap();

    let found = store.account_for_session("tok", now).await.unwrap();
    assert_eq!(found.map(|a| a.id), Some(account.id));
    assert!(
        store
            .account_for_session("tok", now + Duration::hours(2))
            .await
            .unwrap()
            .is_none()
    );

    store.delete_session("tok").await.unwrap();
    assert!(store.account_for_session("tok", now).await.unwrap().is_none());
}

#[tokio::test]
async fn login_code_is_single_use() {
    let store = MemoryStore::default();
    let now = OffsetDateTime::now_utc();
    store
        .replace_login_code("a@x.io", "h1", now + Duration::minutes(15))
        .await
        .unwrap();
    assert!(store.check_login_code("a@x.io", "h1", now, 5).await.unwrap());
    assert!(!store.check_login_code("a@x.io", "h1", now, 5).await.unwrap());
}

#[tokio::test]
async fn replaced_login_code_invalidates_previous() {
    let store = MemoryStore::default();
    let now = OffsetDateTime::now_utc();
    let later = now + Duration::minutes(15);
    store.replace_login_code("a@x.io", "old", later).await.unwrap();
    store.replace_login_code("a@x.io", "new", later).await.unwrap();
    assert!(!store.check_login_code("a@x.io", "old", now, 5).await.unwrap());
    assert!(store.check_login_code("a@x.io", "new", now, 5).await.unwrap());
}

#[tokio::test]
async fn login_code_burns_after_max_attempts() {
    let store = MemoryStore::default();
    let now = OffsetDateTime::now_utc();
    store
        .replace_login_code("a@x.io", "good", now + Duration::minutes(15))
        .await
        .unwrap();
    for _ in 0..3 {
        assert!(!store.check_login_code("a@x.io", "bad", now, 3).await.unwrap());
    }
    assert!(!store.check_login_code("a@x.io", "good", now, 3).await.unwrap());
}

#[tokio::test]
async fn expired_login_code_fails() {
    let store = MemoryStore::default();
    let now = OffsetDateTime::now_utc();
    store.replace_login_code("a@x.io", "h", now).await.unwrap();
    assert!(!store.check_login_code("a@x.io", "h", now, 5).await.unwrap());
}

// =============================================================================
// chat logs
// =============================================================================

fn seeded() -> Vec<Conversation> {
    vec![
        log("s1", "u_1", "dana@x.io", "Dana", datetime!(2024-03-01 10:00 UTC)),
        log("s2", "u_2", "omar@x.io", "Omar", datetime!(2024-03-05 10:00 UTC)),
        log("s3", "u_1", "dana@x.io", "Dana", datetime!(2024-03-10 10:00 UTC)),
    ]
}

#[test]
fn filter_orders_newest_first() {
    let logs = seeded();
    let page = filter_chat_logs(&logs, &ChatLogFilter::default());
    let ids: Vec<_> = page.chats.iter().map(|c| c.session_id.as_str()).collect();
    assert_eq!(ids, ["s3", "s2", "s1"]);
    assert_eq!(page.total_pages, 1);
}

#[test]
fn filter_search_is_case_insensitive() {
    let logs = seeded();
    let filter = ChatLogFilter { search_term: Some("OMAR".into()), ..ChatLogFilter::default() };
    let page = filter_chat_logs(&logs, &filter);
    assert_eq!(page.chats.len(), 1);
    assert_eq!(page.chats[0].session_id, "s2");
}

#[test]
fn filter_by_owner_and_email() {
    let logs = seeded();
    let by_owner = ChatLogFilter { owner_id: Some("U_1".into()), ..ChatLogFilter::default() };
    assert_eq!(filter_chat_logs(&logs, &by_owner).chats.len(), 2);
    let by_email = ChatLogFilter { owner_email: Some("OMAR@".into()), ..ChatLogFilter::default() };
    assert_eq!(filter_chat_logs(&logs, &by_email).chats.len(), 1);
}

#[test]
fn filter_date_range() {
    let logs = seeded();
    let filter = ChatLogFilter {
        created_from: Some(datetime!(2024-03-02 00:00 UTC)),
        created_to: Some(datetime!(2024-03-05 10:00 UTC)),
        ..ChatLogFilter::default()
    };
    let page = filter_chat_logs(&logs, &filter);
    assert_eq!(page.chats.len(), 1);
    assert_eq!(page.chats[0].session_id, "s2");
}

#[test]
fn filter_paginates() {
    let logs = seeded();
    let filter = ChatLogFilter { page: 2, page_size: 2, ..ChatLogFilter::default() };
    let page = filter_chat_logs(&logs, &filter);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.chats.len(), 1);
    assert_eq!(page.chats[0].session_id, "s1");
}

#[test]
fn total_pages_of_empty_is_zero() {
    assert_eq!(total_pages(0, 20), 0);
    assert_eq!(total_pages(20, 20), 1);
    assert_eq!(total_pages(21, 20), 2);
}

#[tokio::test]
async fn chat_log_crud() {
    let store = MemoryStore::default();
    for c in seeded() {
        store.upsert(&c).await.unwrap();
    }
    assert!(ChatLogStore::get(&store, "s1").await.unwrap().is_some());
    assert!(store.delete("s1").await.unwrap());
    assert!(!store.delete("s1").await.unwrap());
    assert_eq!(store.delete_all().await.unwrap(), 2);
    assert_eq!(store.list(&ChatLogFilter::default()).await.unwrap().total_pages, 0);
}

// =============================================================================
// materials, usage, subscriptions
// =============================================================================

#[tokio::test]
async fn materials_prefix_lookup() {
    let store = MemoryStore::default();
    let written = store
        .upsert_many(&[
            item("beginner_week_03_b"),
            item("beginner_week_03_a"),
            item("beginner_week_04_a"),
            item("advanced_week_03_a"),
        ])
        .await
        .unwrap();
    assert_eq!(written, 4);

    let found = store.by_prefix("beginner_week_03").await.unwrap();
    let ids: Vec<_> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["beginner_week_03_a", "beginner_week_03_b"]);
}

#[tokio::test]
async fn usage_counts_per_month() {
    let store = MemoryStore::default();
    let owner = Uuid::new_v4();
    assert_eq!(UsageStore::get(&store, owner, "2024-03").await.unwrap().message_count, 0);
    assert_eq!(store.increment(owner, "2024-03").await.unwrap(), 1);
    assert_eq!(store.increment(owner, "2024-03").await.unwrap(), 2);
    assert_eq!(store.increment(owner, "2024-04").await.unwrap(), 1);

    store.set_premium(owner, "2024-03", true).await.unwrap();
    let usage = UsageStore::get(&store, owner, "2024-03").await.unwrap();
    assert!(usage.premium);
    assert_eq!(usage.message_count, 2);
}

#[tokio::test]
async fn due_for_expiry_selects_lapsed_records() {
    use tutor::subscription::{BillingCycle, Plan};

    let store = MemoryStore::default();
    let start = datetime!(2024-01-01 00:00 UTC);
    let lapsed = Subscription::pending(Uuid::new_v4(), "a@x.io", Plan::Premium, BillingCycle::Monthly, start);
    let current = Subscription::pending(
        Uuid::new_v4(),
        "b@x.io",
        Plan::Premium,
        BillingCycle::Yearly,
        start,
    );
    store.put(&lapsed).await.unwrap();
    store.put(&current).await.unwrap();

    let due = store
        .due_for_expiry(datetime!(2024-03-01 00:00 UTC))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].owner_id, lapsed.owner_id);
}
