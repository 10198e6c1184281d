//! Parsing and prompt building for note extraction. No model calls.

use chrono::Utc;
use coach_rs::error::Error;
use coach_rs::model::{ConversationEntry, Role};
use coach_rs::tasks::extract::{
    NOTE_CATEGORIES, extraction_prompt, parse_notes, render_transcript,
};

#[test]
fn parses_bare_json() {
    let raw = r#"{"notes": [{"category": "fitness_goal", "key": "weight_loss",
        "value": "10 pounds in 3 months", "confidence": 0.8, "source": "user_stated"}]}"#;
    let notes = parse_notes(raw).unwrap();

    assert_eq!(notes.len(), 1);
    let n = &notes[0];
    assert_eq!(n.category, "fitness_goal");
    assert_eq!(n.key, "weight_loss");
    assert_eq!(n.value, "10 pounds in 3 months");
    assert_eq!(n.confidence, 0.8);
    assert_eq!(n.source, "user_stated");
}

#[test]
fn parses_json_inside_code_fence() {
    let raw = "Here you go:\n```json\n{\"notes\": [{\"key\": \"vegan\", \"value\": \"yes\"}]}\n```\nThanks";
    let notes = parse_notes(raw).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].key, "vegan");
}

#[test]
fn parses_json_inside_plain_fence() {
    let raw = "```\n{\"notes\": []}\n```";
    assert!(parse_notes(raw).unwrap().is_empty());
}

#[test]
fn missing_fields_get_defaults() {
    let notes = parse_notes(r#"{"notes": [{}]}"#).unwrap();
    let n = &notes[0];
    assert_eq!(n.category, "other");
    assert_eq!(n.key, "unknown");
    assert_eq!(n.value, "");
    assert_eq!(n.confidence, 0.5);
    assert_eq!(n.source, "inferred");
}

#[test]
fn non_string_values_are_stringified_and_confidence_clamped() {
    let raw = r#"{"notes": [{"key": "age", "value": 34, "confidence": 7}, "junk", 3]}"#;
    let notes = parse_notes(raw).unwrap();

    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].value, "34");
    assert_eq!(notes[0].confidence, 1.0);
}

#[test]
fn reply_without_notes_list_yields_nothing() {
    assert!(parse_notes(r#"{"facts": []}"#).unwrap().is_empty());
    assert!(parse_notes(r#"{"notes": "none"}"#).unwrap().is_empty());
}

#[test]
fn invalid_json_is_an_extraction_error() {
    let err = parse_notes("I could not find anything useful.").unwrap_err();
    assert!(matches!(err, Error::Extraction(_)), "got {err:?}");
}

#[test]
fn transcript_ends_with_latest_exchange() {
    let history = vec![
        ConversationEntry {
            role: Role::User,
            content: "hi".to_string(),
            timestamp: Utc::now(),
        },
        ConversationEntry {
            role: Role::Assistant,
            content: "hello".to_string(),
            timestamp: Utc::now(),
        },
    ];
    let transcript = render_transcript(&history, "I run 5k", "Nice pace!");

    assert_eq!(
        transcript,
        "USER: hi\nASSISTANT: hello\nUSER: I run 5k\nASSISTANT: Nice pace!"
    );
}

#[test]
fn prompt_lists_categories_and_transcript() {
    let prompt = extraction_prompt("USER: I'm vegan");
    for category in NOTE_CATEGORIES {
        assert!(prompt.contains(&format!("- {category}")), "missing {category}");
    }
    assert!(prompt.ends_with("USER: I'm vegan"));
    assert!(prompt.contains(r#"{"notes": ["#));
}
