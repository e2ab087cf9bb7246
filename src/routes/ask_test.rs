use super::*;
use crate::llm::types::LlmError;
use crate::store::StoreError;

#[test]
fn ask_errors_map_to_status() {
    assert_eq!(ask_error_to_status(&AskError::EmptyQuestion), StatusCode::BAD_REQUEST);
    assert_eq!(ask_error_to_status(&AskError::QuotaExceeded), StatusCode::FORBIDDEN);
    assert_eq!(ask_error_to_status(&AskError::LlmUnavailable), StatusCode::SERVICE_UNAVAILABLE);
    let llm = AskError::Llm(LlmError::Upstream { status: 500, body: String::new() });
    assert_eq!(ask_error_to_status(&llm), StatusCode::BAD_GATEWAY);
    let store = AskError::Store(StoreError::Corrupt("x".into()));
    assert_eq!(ask_error_to_status(&store), StatusCode::INTERNAL_SERVER_ERROR);
}
