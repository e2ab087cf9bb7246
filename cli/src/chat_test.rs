use super::*;
use tutor::FailureKind;

#[test]
fn parses_text_and_commands() {
    assert_eq!(parse_input("  marhaba "), ReplInput::Say("marhaba".into()));
    assert_eq!(parse_input(""), ReplInput::Empty);
    assert_eq!(parse_input("/NEW"), ReplInput::New);
    assert_eq!(parse_input("/q"), ReplInput::Quit);
    assert_eq!(parse_input("/status"), ReplInput::Status);
    assert_eq!(parse_input("/dance"), ReplInput::Unknown("dance".into()));
}

#[test]
fn messages_are_prefixed_by_author() {
    assert_eq!(format_message(&Message::user("hi")), "you> hi");
    assert_eq!(format_message(&Message::assistant("ahlan")), "laith> ahlan");
}

#[test]
fn reply_is_shown_only_for_answered_sends() {
    let messages = vec![Message::user("hi"), Message::assistant("ahlan")];
    assert_eq!(reply_after(SendOutcome::Replied, &messages).map(|m| m.body.as_str()), Some("ahlan"));
    assert!(reply_after(SendOutcome::Failed(FailureKind::Generic), &messages).is_some());
    assert!(reply_after(SendOutcome::Blocked, &messages).is_none());
    assert!(reply_after(SendOutcome::Superseded, &messages).is_none());

    let only_user = vec![Message::user("hi")];
    assert!(reply_after(SendOutcome::Replied, &only_user).is_none());
}
