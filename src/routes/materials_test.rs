use super::*;
use crate::state::test_helpers::{ADMIN_EMAIL, seed_account, test_app_state};
use tutor::materials::ValidationError;
use tutor::{ProficiencyLevel, Week};

#[test]
fn validation_errors_are_listed() {
    let err = MaterialsError::Invalid(ValidationError::Invalid(vec!["a".into(), "b".into()]));
    let (status, Json(body)) = materials_error_to_response(&err);
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], json!(["a", "b"]));
}

#[tokio::test]
async fn admin_upload_then_learner_lookup() {
    let state = test_app_state();
    let (admin, _) = seed_account(&state, ADMIN_EMAIL).await;
    let body = json!([{
        "id": "intermediate_week_04_greeting",
        "hebrew_input": "בוקר טוב",
        "arabic_response": "صباح الخير",
        "pronunciation": "sabah al-khair",
    }]);
    let Json(written) = upload_materials(State(state.clone()), AdminUser(admin), Json(body)).await.unwrap();
    assert_eq!(written["written"], 1);

    let (account, token) = seed_account(&state, "dana@x.io").await;
    let params = LessonParams { level: ProficiencyLevel::Intermediate, week: Week::new(4).unwrap() };
    let Json(items) = lesson_materials(State(state), AuthUser { account, token }, Query(params)).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].pronunciation, "sabah al-khair");
}

#[tokio::test]
async fn non_array_upload_is_rejected() {
    let state = test_app_state();
    let (admin, _) = seed_account(&state, ADMIN_EMAIL).await;
    let (status, Json(body)) = upload_materials(State(state), AdminUser(admin), Json(json!({ "id": "x" })))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0], "Invalid JSON format: Expected an array of items");
}
