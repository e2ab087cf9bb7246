use super::*;

#[test]
fn hebrew_welcome_interpolates_name() {
    let prefs = Preferences::named("נועה");
    assert_eq!(
        welcome_message(&prefs),
        "שלום נועה! אני העוזר שלך ללימוד השפה הערבית. איך אני יכול לעזור לך היום?"
    );
}

#[test]
fn arabic_and_english_templates() {
    let mut prefs = Preferences::named("Omar");
    prefs.language = LanguageMode::Arabic;
    assert!(welcome_message(&prefs).starts_with("مرحباً Omar!"));
    prefs.language = LanguageMode::EnglishTransliteration;
    assert_eq!(
        welcome_message(&prefs),
        "Hello Omar! I'm your assistant for learning Arabic. How can I help you today?"
    );
}

#[test]
fn auth_diagnostic_asks_for_login() {
    let text = diagnostic_message(FailureKind::Authentication, LanguageMode::Hebrew);
    assert!(text.contains("logging in again"));
}

#[test]
fn quota_diagnostic_is_the_limit_message() {
    assert_eq!(
        diagnostic_message(FailureKind::Quota, LanguageMode::Hebrew),
        limit_message(LanguageMode::Hebrew)
    );
}

#[test]
fn remaining_hint_pluralizes() {
    assert!(remaining_hint(1).starts_with("You have 1 message left"));
    assert!(remaining_hint(3).starts_with("You have 3 messages left"));
}
