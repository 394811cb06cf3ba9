use alloc::{string::ToString, vec::Vec};

use rstest::rstest;

use super::utils::{grind, parse_chunks};
use crate::{Storage, SyntaxError, Value, parse};

#[test]
fn nul_survives_escaped_and_raw() {
    let value = grind(r#""Hello\u0000World""#);
    let s = value.as_str().unwrap();
    assert_eq!(s.len(), 11);
    assert_eq!(s.as_bytes()[5], 0);
    assert_eq!(s, "Hello\0World");

    let raw = parse(b"\"Hello\0World\"").unwrap();
    assert_eq!(raw, value);
    assert_eq!(raw.to_string(), r#""Hello\u0000World""#);
}

#[test]
fn nul_in_keys() {
    let value = grind(r#"{"a\u0000b":"\u0000"}"#);
    let object = value.as_object().unwrap();
    assert_eq!(object.get("a\0b").and_then(Value::as_str), Some("\0"));
    assert_eq!(object.get("a"), None);
}

#[rstest]
#[case(r#""\uD834\uDD1E""#, "\u{1D11E}")]
#[case(r#""\ud834\udd1e""#, "\u{1D11E}")]
#[case(r#""\uD83D\uDE00!""#, "\u{1F600}!")]
#[case(r#""\uD800\uDC00""#, "\u{10000}")]
#[case(r#""\uDBFF\uDFFF""#, "\u{10FFFF}")]
#[case(r#""\u00e9\u4E2D""#, "é中")]
#[case(r#""\uFFFF""#, "\u{FFFF}")]
#[case(r#""a\uD834\uDD1Eb\uD834\uDD1Ec""#, "a\u{1D11E}b\u{1D11E}c")]
fn escapes_decode_to_utf8(#[case] json: &str, #[case] expected: &str) {
    assert_eq!(grind(json).as_str(), Some(expected));
}

#[test]
fn surrogate_pair_bytes() {
    let value = grind(r#""\uD834\uDD1E""#);
    assert_eq!(value.as_str().unwrap().as_bytes(), [0xF0, 0x9D, 0x84, 0x9E]);
}

#[test]
fn raw_multibyte_split_anywhere() {
    let json = "[\"é中𝄞\",{\"ключ\":\"значение\"}]";
    let whole = parse(json).unwrap();
    let bytes = json.as_bytes();
    for i in 1..bytes.len() {
        for j in i..bytes.len() {
            let chunks = [&bytes[..i], &bytes[i..j], &bytes[j..]];
            assert_eq!(
                parse_chunks(&chunks, Storage::system()).unwrap(),
                whole,
                "split at {i}, {j}"
            );
        }
    }
}

#[test]
fn escape_split_byte_by_byte() {
    let json = br#""x\uD834\uDD1Ey\n""#;
    let chunks: Vec<&[u8]> = json.chunks(1).collect();
    let value = parse_chunks(&chunks, Storage::system()).unwrap();
    assert_eq!(value.as_str(), Some("x\u{1D11E}y\n"));
}

#[rstest]
#[case(r#""\uD834""#, 0xD834)]
#[case(r#""\uD834 ""#, 0xD834)]
#[case(r#""\uD834\n""#, 0xD834)]
#[case(r#""\uD834\uD834""#, 0xD834)]
#[case(r#""\uDD1E""#, 0xDD1E)]
#[case(r#""\uDD1E\uD834""#, 0xDD1E)]
fn lone_surrogates(#[case] json: &str, #[case] unit: u16) {
    let err = parse(json).unwrap_err();
    assert_eq!(err.syntax(), Some(SyntaxError::UnpairedSurrogate(unit)));
}

#[test]
fn escaped_output_round_trips() {
    let value = grind(r#"["\u0001\u001f","\u2028\u2029","\"\\/"]"#);
    assert_eq!(
        value.to_string(),
        r#"["\u0001\u001F","\u2028\u2029","\"\\/"]"#
    );
}
