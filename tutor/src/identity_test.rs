use super::*;

#[test]
fn absent_and_blank_are_guest() {
    assert_eq!(resolve_identity(None), GUEST_IDENTITY);
    assert_eq!(resolve_identity(Some("")), GUEST_IDENTITY);
    assert_eq!(resolve_identity(Some("   ")), GUEST_IDENTITY);
}

#[test]
fn same_input_same_identity() {
    let a = resolve_identity(Some("dana@example.com"));
    let b = resolve_identity(Some("dana@example.com"));
    assert_eq!(a, b);
}

#[test]
fn email_case_and_whitespace_are_ignored() {
    assert_eq!(
        resolve_identity(Some("  Dana@Example.COM ")),
        resolve_identity(Some("dana@example.com"))
    );
}

#[test]
fn non_ascii_names_are_key_safe() {
    for name in ["ليث", "נועה", "Zoë", "محمد علي"] {
        let id = resolve_identity(Some(name));
        assert!(id.starts_with("u_"));
        assert!(
            id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "{id}"
        );
        assert_eq!(decode_identity(&id).as_deref(), Some(name.trim()));
    }
}

#[test]
fn distinct_inputs_do_not_collide() {
    let ids: std::collections::HashSet<String> = ["ليث", "ليثا", "נועה", "guest", "Guest", "a", "b"]
        .iter()
        .map(|s| resolve_identity(Some(s)))
        .collect();
    assert_eq!(ids.len(), 7);
}

#[test]
fn literal_guest_name_is_not_the_guest_identity() {
    assert_ne!(resolve_identity(Some("guest")), GUEST_IDENTITY);
}

#[test]
fn decode_rejects_foreign_values() {
    assert_eq!(decode_identity(GUEST_IDENTITY), None);
    assert_eq!(decode_identity("u_!!!"), None);
}
