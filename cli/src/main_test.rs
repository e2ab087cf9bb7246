use super::*;
use clap::CommandFactory;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn prefs_set_parses_typed_choices() {
    let cli = Cli::try_parse_from(["lisan", "prefs", "set", "--level", "advanced", "--week", "3", "--language", "hebrew"])
        .unwrap();
    let Command::Prefs(PrefsCommand { command: PrefsSubcommand::Set { level, week, language, .. } }) = cli.command else {
        panic!("expected prefs set");
    };
    assert_eq!(level, Some(ProficiencyLevel::Advanced));
    assert_eq!(week.map(Week::number), Some(3));
    assert_eq!(language, Some(LanguageMode::Hebrew));
}

#[test]
fn unknown_choice_is_rejected() {
    assert!(Cli::try_parse_from(["lisan", "prefs", "set", "--level", "wizard"]).is_err());
}

#[test]
fn logs_query_skips_blank_values() {
    let query = logs_query(&[
        ("page", Some("2".into())),
        ("searchTerm", Some("  ".into())),
        ("userEmail", Some("dana@x.io".into())),
        ("dateFrom", None),
    ]);
    assert_eq!(query, "?page=2&userEmail=dana%40x.io");
    assert_eq!(logs_query(&[("page", None)]), "");
}

#[test]
fn components_are_percent_encoded() {
    assert_eq!(encode_component("a b/c"), "a%20b%2Fc");
    assert_eq!(encode_component("u_abc-1.2~"), "u_abc-1.2~");
}

#[test]
fn validation_errors_become_a_list() {
    let err = CliError::from(ValidationError::Invalid(vec!["one".into(), "two".into()]));
    assert_eq!(err.to_string(), "materials rejected:\n  one\n  two");
}
