use serde_json::json;

use crate::error::{DecompileError, ErrorKind};
use crate::from_json::MAX_DEPTH;
use crate::statement::Statement;
use crate::tokenizer::{Token, Tokenizer};
use crate::{decompile_story, dump_tokens, Driver};

// ── Shared fixtures ─────────────────────────────────────────────────

/// A small story touching every section kind: globals, top-level content,
/// a knot with a stitch holding a conditional, and a function.
fn adventure() -> serde_json::Value {
    json!({
        "inkVersion": 21,
        "root": [
            [
                "ev", {"f()": "setup"}, "/ev", "pop",
                {"->": "intro"},
                ["done", {"#f": 5, "#n": "g-0"}],
                null
            ],
            "done",
            {
                "intro": [
                    "ev", {"VAR?": "visits"}, 1, "+", "/ev", {"VAR=": "visits", "re": true},
                    {"->": "intro.hall"},
                    {"hall": [
                        "ev", {"VAR?": "visits"}, 2, ">=", "/ev",
                        [{"->": ".^.b", "c": true},
                         {"b": ["ev", true, "/ev", {"VAR=": "bored", "re": true},
                                {"->": ".^.^.^.6"}, null]}],
                        "nop", "done",
                        {"#f": 1}
                    ]}
                ],
                "setup": [
                    "ev", 0, "/ev", {"VAR=": "visits", "re": true},
                    "ev", "void", "/ev", "~ret",
                    null
                ],
                "global decl": [
                    "ev", 0, {"VAR=": "visits"}, false, {"VAR=": "bored"}, "/ev", "end",
                    null
                ]
            }
        ],
        "listDefs": {}
    })
}

const ADVENTURE_SCRIPT: &str = "VAR visits = 0\nVAR bored = false\n\n\
~ setup()\n\n\
=== intro ===\n~ visits = visits + 1\n\n\n\
= hall\n- visits >= 2\n    ~ bored = true\n\n\n\
=== function setup ===\n~ visits = 0\n\n";

fn top_level(content: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "inkVersion": 21,
        "root": [content, "done", null]
    }))
    .unwrap()
}

// ── End-to-end decompilation ────────────────────────────────────────

#[test]
fn test_decompile_adventure() {
    let bytes = serde_json::to_vec(&adventure()).unwrap();
    assert_eq!(decompile_story(&bytes).unwrap(), ADVENTURE_SCRIPT);
}

#[test]
fn test_pretty_printed_with_bom() {
    let mut bytes = b"\xEF\xBB\xBF".to_vec();
    bytes.extend(serde_json::to_vec_pretty(&adventure()).unwrap());
    assert_eq!(decompile_story(&bytes).unwrap(), ADVENTURE_SCRIPT);
}

#[test]
fn test_story_tree_shape() {
    let bytes = serde_json::to_vec(&adventure()).unwrap();
    let document = crate::from_json::parse_document(&bytes).unwrap();
    let story = Driver::new().build_story(&document).unwrap();

    assert_eq!(story.globals.len(), 2);
    assert_eq!(story.main.len(), 1);
    let sections = story.sections.statements();
    assert_eq!(sections.len(), 2);
    match &sections[0] {
        Statement::Knot(knot) => {
            assert_eq!(knot.name(), "intro");
            assert_eq!(knot.stitches().len(), 1);
            assert_eq!(knot.stitches()[0].name(), "hall");
        }
        other => panic!("expected knot, got {:?}", other),
    }
    assert!(
        matches!(&sections[1], Statement::Function(f) if f.name() == "setup"),
        "expected function setup, got {:?}",
        sections[1]
    );
}

#[test]
fn test_expressions_in_top_level_content() {
    let bytes = top_level(json!([
        "ev", {"CNT?": "intro"}, 0, "==", "/ev", {"temp=": "fresh"},
        "ev", 3, "_", "/ev", {"temp=": "neg"},
        "ev", {"VAR?": "a"}, {"VAR?": "b"}, "+", 2, "*", "/ev", {"temp=": "c"},
        "ev", {"^->": "intro.hall"}, "/ev", {"VAR=": "target", "re": true},
        "ev", {"VAR?": "c"}, "FLOOR", "turns", "MIN", "/ev", "pop",
        "done",
        null
    ]));
    assert_eq!(
        decompile_story(&bytes).unwrap(),
        "~ temp fresh = intro == 0\n\
         ~ temp neg = -3\n\
         ~ temp c = (a + b) * 2\n\
         ~ target = -> intro.hall\n\
         ~ MIN(FLOOR(c), TURNS())\n\n"
    );
}

#[test]
fn test_unsupported_version_still_decompiles() {
    let mut story = adventure();
    story["inkVersion"] = json!(10);
    let bytes = serde_json::to_vec(&story).unwrap();
    assert_eq!(decompile_story(&bytes).unwrap(), ADVENTURE_SCRIPT);
}

#[test]
fn test_driver_reuse_gives_same_output() {
    let bytes = serde_json::to_vec(&adventure()).unwrap();
    let mut driver = Driver::new();
    let first = driver.decompile(&bytes).unwrap();
    let second = driver.decompile(&bytes).unwrap();
    assert_eq!(first, second);
    assert_eq!(driver.globals().len(), 2);
}

// ── Error reporting ─────────────────────────────────────────────────

#[test]
fn test_error_double_comma_on_second_line() {
    let err = decompile_story(b"{\"inkVersion\": 21,\n \"root\": [1,,2]}").unwrap_err();
    match err {
        DecompileError::Lex { kind, position } => {
            assert_eq!(kind, ErrorKind::UnexpectedComma);
            assert_eq!(position.line, 1);
        }
        other => panic!("expected lex error, got {:?}", other),
    }
}

#[test]
fn test_error_truncated_story() {
    let err = decompile_story(b"{\"inkVersion\": 21, \"root\": [").unwrap_err();
    assert!(
        matches!(
            err,
            DecompileError::Lex {
                kind: ErrorKind::PrematureEndOfInput,
                ..
            }
        ),
        "got {:?}",
        err
    );
}

#[test]
fn test_error_root_is_not_an_object() {
    assert_eq!(decompile_story(b"[1, 2]"), Err(DecompileError::MissingRoot));
}

#[test]
fn test_error_unterminated_string() {
    let err = decompile_story(b"{\"root\": [\"done").unwrap_err();
    assert!(err.to_string().ends_with("Unterminated string"), "got {}", err);
}

#[test]
fn test_error_nesting_too_deep() {
    let mut input = String::from(r#"{"inkVersion": 21, "root": "#);
    input.push_str(&"[".repeat(100_000));
    input.push_str(&"]".repeat(100_000));
    input.push('}');
    match decompile_story(input.as_bytes()).unwrap_err() {
        DecompileError::NestingTooDeep { limit, position } => {
            assert_eq!(limit, MAX_DEPTH);
            assert_eq!(position.line, 0);
        }
        other => panic!("expected nesting error, got {:?}", other),
    }
}

#[test]
fn test_error_missing_comma() {
    let err = decompile_story(br#"{"inkVersion": 21 "root": [["done", null], "done", null]}"#)
        .unwrap_err();
    assert!(
        matches!(err, DecompileError::UnexpectedToken { .. }),
        "got {:?}",
        err
    );
}

// ── Token listing ───────────────────────────────────────────────────

#[test]
fn test_dump_tokens_skips_bom() {
    let mut listing = String::new();
    assert!(dump_tokens(b"\xEF\xBB\xBF{\"a\": [1, 2.5]}", &mut listing));
    assert_eq!(
        listing,
        "ObjectStart\t{\n\
         FieldName\t\"a\"\n\
         ArrayStart\t[\n\
         Integer\t1\t1\t1\n\
         Float\t2.5\t2\t2.5\n\
         ArrayEnd\t]\n\
         ObjectEnd\t}\n"
    );
}

#[test]
fn test_dump_tokens_of_bom_story_matches_plain() {
    let plain = serde_json::to_vec(&adventure()).unwrap();
    let mut with_bom = b"\xEF\xBB\xBF".to_vec();
    with_bom.extend_from_slice(&plain);

    let mut expected = String::new();
    assert!(dump_tokens(&plain, &mut expected));
    let mut listing = String::new();
    assert!(dump_tokens(&with_bom, &mut listing));
    assert_eq!(listing, expected);
}

#[test]
fn test_dump_tokens_stops_at_error() {
    let mut listing = String::new();
    assert!(!dump_tokens(b"[1,,2]", &mut listing));
    assert_eq!(
        listing,
        "ArrayStart\t[\nInteger\t1\t1\t1\nError\tUnexpected comma\n"
    );
}

// ── Tokenizer over generated stories ────────────────────────────────

#[test]
fn test_tokens_of_generated_story_balance() {
    let bytes = serde_json::to_vec_pretty(&adventure()).unwrap();
    let mut tokens = Tokenizer::new(&bytes);
    let mut depth = 0i32;
    let mut strings = 0;
    loop {
        match tokens.next() {
            Token::ObjectStart | Token::ArrayStart => depth += 1,
            Token::ObjectEnd | Token::ArrayEnd => depth -= 1,
            Token::String(raw) | Token::FieldName(raw) => {
                assert_eq!(raw.first(), Some(&b'"'));
                assert_eq!(raw.last(), Some(&b'"'));
                strings += 1;
            }
            Token::Error(kind) => panic!("unexpected lex error {:?}", kind),
            Token::End => break,
            _ => {}
        }
        assert!(depth >= 0);
    }
    assert_eq!(depth, 0);
    assert!(strings > 0);
    assert_eq!(tokens.current(), Token::End);
}
