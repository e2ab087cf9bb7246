use super::*;

#[test]
fn success_statuses_pass() {
    assert!(check_status(200, "").is_ok());
    assert!(check_status(202, "").is_ok());
}

#[test]
fn unauthorized_maps_to_unauthorized() {
    assert!(matches!(check_status(401, "x"), Err(GatewayError::Unauthorized)));
}

#[test]
fn forbidden_maps_to_quota() {
    assert!(matches!(check_status(403, "x"), Err(GatewayError::QuotaExceeded)));
}

#[test]
fn other_statuses_keep_body() {
    match check_status(502, "upstream down") {
        Err(GatewayError::Status { status, body }) => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn base_url_trailing_slash_trimmed() {
    let api = ApiClient::new("http://localhost:3000/", Some("tok".into())).unwrap();
    assert_eq!(api.url("/api/ask"), "http://localhost:3000/api/ask");
    assert_eq!(api.token(), Some("tok"));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let api = ApiClient::new("http://127.0.0.1:9", None).unwrap();
    let err = api.get_json::<Value>("/healthz").await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "{err:?}");
}
