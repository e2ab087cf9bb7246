use super::*;
use time::macros::datetime;
use uuid::Uuid;

fn account(email: &str) -> Account {
    Account { id: Uuid::new_v4(), email: email.to_owned(), name: "n".into(), created_at: OffsetDateTime::now_utc() }
}

#[test]
fn defaults_apply() {
    let filter = ChatLogParams::default().into_filter().unwrap();
    assert_eq!(filter, ChatLogFilter::default());
}

#[test]
fn page_and_size_are_clamped() {
    let params = ChatLogParams { page: Some(0), page_size: Some(5000), ..ChatLogParams::default() };
    let filter = params.into_filter().unwrap();
    assert_eq!(filter.page, 1);
    assert_eq!(filter.page_size, MAX_PAGE_SIZE);
}

#[test]
fn blank_strings_are_dropped() {
    let params = ChatLogParams {
        search_term: Some("  ".into()),
        user_email: Some(" dana@x.io ".into()),
        ..ChatLogParams::default()
    };
    let filter = params.into_filter().unwrap();
    assert_eq!(filter.search_term, None);
    assert_eq!(filter.owner_email.as_deref(), Some("dana@x.io"));
}

#[test]
fn bare_dates_cover_whole_days() {
    let params = ChatLogParams {
        date_from: Some("2024-03-01".into()),
        date_to: Some("2024-03-02".into()),
        ..ChatLogParams::default()
    };
    let filter = params.into_filter().unwrap();
    assert_eq!(filter.created_from, Some(datetime!(2024-03-01 00:00 UTC)));
    let to = filter.created_to.unwrap();
    assert!(to > datetime!(2024-03-02 23:59:59 UTC));
    assert!(to < datetime!(2024-03-03 00:00 UTC));
}

#[test]
fn rfc3339_dates_are_exact() {
    let params = ChatLogParams { date_from: Some("2024-03-01T10:30:00Z".into()), ..ChatLogParams::default() };
    let filter = params.into_filter().unwrap();
    assert_eq!(filter.created_from, Some(datetime!(2024-03-01 10:30 UTC)));
}

#[test]
fn bad_date_is_an_error() {
    let params = ChatLogParams { date_to: Some("yesterday".into()), ..ChatLogParams::default() };
    assert_eq!(params.into_filter(), Err(ChatLogError::InvalidDate("yesterday".into())));
}

#[test]
fn owner_and_admin_may_read_single_log() {
    let dana = account("dana@x.io");
    let own = tutor::resolve_identity(Some("dana@x.io"));
    assert!(authorize_single(&dana, &own, false).is_ok());
    assert_eq!(authorize_single(&dana, "u_someone_else", false), Err(ChatLogError::Forbidden));
    assert!(authorize_single(&dana, "u_someone_else", true).is_ok());
}
