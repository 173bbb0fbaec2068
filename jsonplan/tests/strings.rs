use jsonplan::{JsonErrorKind, Malformed, Reflect, from_str, to_string};
use jsonplan_testhelpers::test;

#[derive(Debug, Default, PartialEq, Reflect)]
struct Note {
    text: String,
    raw: Vec<u8>,
}

fn text_of(json: &str) -> String {
    from_str::<Note>(json).unwrap().text
}

#[test]
fn escapes_roundtrip_byte_for_byte() {
    let json = r#"{"text":"a\"b\\c\nd","raw":""}"#;
    let note: Note = from_str(json).unwrap();
    assert_eq!(note.text, "a\"b\\c\nd");
    assert_eq!(to_string(&note).unwrap(), json);
}

#[test]
fn every_short_escape_decodes() {
    assert_eq!(
        text_of(r#"{"text":"\"\\\/\b\f\n\r\t"}"#),
        "\"\\/\u{8}\u{c}\n\r\t"
    );
}

#[test]
fn control_characters_are_escaped_on_output() {
    let note = Note {
        text: "\u{1}\u{1f}\u{8}\u{c}".into(),
        raw: vec![],
    };
    assert_eq!(
        to_string(&note).unwrap(),
        r#"{"text":"\u0001\u001f\b\f","raw":""}"#
    );
}

#[test]
fn unicode_passes_through_and_unescapes() {
    let note = Note {
        text: "héllo 🦀".into(),
        raw: vec![],
    };
    let json = to_string(&note).unwrap();
    assert_eq!(json, "{\"text\":\"héllo 🦀\",\"raw\":\"\"}");

    assert_eq!(text_of(r#"{"text":"h\u00e9llo"}"#), "héllo");
    assert_eq!(text_of(r#"{"text":"\ud83e\udd80"}"#), "🦀");
    assert_eq!(text_of(r#"{"text":"\u00e9\u00C9"}"#), "éÉ");
}

#[test]
fn bad_escapes_are_rejected() {
    for (json, reason) in [
        (r#"{"text":"\x"}"#, Malformed::InvalidEscape),
        (r#"{"text":"\u12"}"#, Malformed::InvalidUnicodeEscape),
        (r#"{"text":"\ud83e"}"#, Malformed::InvalidUnicodeEscape),
        (r#"{"text":"\udd80"}"#, Malformed::InvalidUnicodeEscape),
    ] {
        let err = from_str::<Note>(json).unwrap_err();
        assert_eq!(err.kind, JsonErrorKind::MalformedInput(reason), "{json}");
        assert_eq!(err.offset, Some(9), "{json}");
    }
}

#[test]
fn unterminated_strings_are_rejected() {
    let err = from_str::<Note>(r#"{"text":"abc"#).unwrap_err();
    assert!(matches!(
        err.kind,
        JsonErrorKind::MalformedInput(Malformed::UnexpectedEof { .. })
    ));
}

#[test]
fn escaped_keys_match_fields() {
    let note: Note = from_str(r#"{"t\u0065xt":"found"}"#).unwrap();
    assert_eq!(note.text, "found");
}

#[test]
fn strings_reuse_their_buffer() {
    let mut note = Note {
        text: String::with_capacity(64),
        raw: vec![],
    };
    let cap = note.text.capacity();
    jsonplan::from_slice_into(br#"{"text":"short"}"#, &mut note).unwrap();
    assert_eq!(note.text, "short");
    assert_eq!(note.text.capacity(), cap);
}

#[test]
fn byte_blobs_are_base64() {
    let note = Note {
        text: String::new(),
        raw: (0u8..=5).collect(),
    };
    let json = to_string(&note).unwrap();
    assert_eq!(json, r#"{"text":"","raw":"AAECAwQF"}"#);
    assert_eq!(from_str::<Note>(&json).unwrap(), note);

    let err = from_str::<Note>(r#"{"raw":"not base64!"}"#).unwrap_err();
    assert_eq!(
        err.kind,
        JsonErrorKind::MalformedInput(Malformed::InvalidBase64)
    );
    assert_eq!(err.offset, Some(7));
}
