use alloc::string::ToString;

use super::*;

fn started() -> Parser<'static> {
    let mut parser = Parser::new(ParserOptions {
        panic_on_error: false,
        ..Default::default()
    });
    parser.start(Storage::system());
    parser
}

#[test]
fn tokens_within_a_chunk_skip_the_scratch_buffer() {
    let mut parser = started();
    parser.write(br#"{"key": "value", "n": -12.5e3, "#).unwrap();
    assert!(parser.scratch.is_empty());
    assert_eq!(parser.expect, Expect::PropertyName);
}

#[test]
fn straddling_tokens_are_carried_over() {
    let mut parser = started();
    parser.write(br#"["ab\u00"#).unwrap();
    assert_eq!(parser.scratch, br#"ab\u00"#);
    assert!(matches!(
        parser.token,
        Token::String(StringScan {
            escape: Escape::Unicode(_),
            is_key: false
        })
    ));
    parser.write(br#"e9", 12"#).unwrap();
    assert_eq!(parser.scratch, b"12");
    parser.finish(b"3]").unwrap();
    assert!(parser.scratch.is_empty());
    assert_eq!(parser.release().unwrap().to_string(), r#"["abé",123]"#);
}

#[test]
fn phases() {
    let mut parser = Parser::default();
    assert_eq!(parser.phase, Phase::Initial);
    parser.start_default();
    assert_eq!(parser.phase, Phase::Ready);
    parser.write(b"[").unwrap();
    assert_eq!(parser.phase, Phase::InProgress);
    assert_eq!(parser.depth(), 1);
    parser.write(b"]").unwrap();
    assert_eq!(parser.phase, Phase::Done);
    parser.release().unwrap();
    assert_eq!(parser.phase, Phase::Released);
    assert!(parser.default_resource.is_none());
}

#[test]
fn root_numbers_complete_only_at_the_end() {
    let mut parser = started();
    parser.write(b"42").unwrap();
    assert!(!parser.is_done());
    parser.finish(b"").unwrap();
    assert_eq!(parser.release().unwrap(), Value::Int64(42));
}

#[test]
fn reserve_hint_sizes_the_first_block() {
    let long = "x".repeat(60_000);
    let doc = alloc::format!(r#"["{long}", "{long}"]"#);

    let mut parser = Parser::default();
    parser.reserve(100_000);
    parser.start_default();
    parser.finish(doc.as_bytes()).unwrap();
    let resource = parser.default_resource.clone().unwrap();
    assert_eq!(resource.block_count(), 1);
    // Too late: the resource has allocated already.
    parser.reserve(1 << 20);
    assert_eq!(resource.block_count(), 1);

    let mut parser = Parser::default();
    parser.start_default();
    parser.finish(doc.as_bytes()).unwrap();
    let resource = parser.default_resource.clone().unwrap();
    assert!(resource.block_count() > 1);
}

#[test]
fn reserve_is_ignored_with_an_external_resource() {
    let mut parser = started();
    parser.reserve(1 << 20);
    assert_eq!(parser.reserve, 0);
}

#[test]
fn errors_report_where_they_happen() {
    let mut parser = started();
    parser.write(b"{\n  \"a\": tru").unwrap();
    let err = parser.write(b"x}").unwrap_err();
    assert_eq!(
        err,
        ParserError::Syntax {
            kind: SyntaxError::UnexpectedCharacter(b'x'),
            position: Position {
                offset: 12,
                line: 2,
                column: 11,
            },
        }
    );
    assert_eq!(parser.phase, Phase::Failed);
}

#[test]
#[should_panic(expected = "trailing comma")]
fn panic_on_error_panics_at_detection() {
    let mut parser = Parser::new(ParserOptions {
        panic_on_error: true,
        ..Default::default()
    });
    parser.start(Storage::system());
    let _ = parser.write(b"[1,]");
}
