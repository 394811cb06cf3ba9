//! Decoding of string bodies into resource-backed strings.

use super::escape_buffer::hex_value;
use crate::{
    error::{Failure, SyntaxError},
    resource::Storage,
    storage::StorageVec,
    value::JsonString,
};

/// Decodes the bytes between a string's quotes.
///
/// Expands the two-character escapes and `\uXXXX`, joining a high surrogate
/// with the `\u` low surrogate that must follow it. Raw bytes, NUL included,
/// are copied as they are. The result is checked to be UTF-8.
pub(crate) fn unescape<'r>(raw: &[u8], storage: &Storage<'r>) -> Result<JsonString<'r>, Failure> {
    // Every escape decodes to fewer bytes than it occupies.
    let mut out = StorageVec::with_capacity(raw.len(), storage.clone())?;
    let mut rest = raw;
    loop {
        let plain = rest.iter().position(|&b| b == b'\\').unwrap_or(rest.len());
        out.extend_from_slice(&rest[..plain])?;
        rest = &rest[plain..];
        let Some((_, escape)) = rest.split_first() else {
            break;
        };
        let (&letter, tail) = escape
            .split_first()
            .ok_or(SyntaxError::UnexpectedEndOfInput)?;
        rest = tail;
        let byte = match letter {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                let c = decode_unicode(&mut rest)?;
                let mut utf8 = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes())?;
                continue;
            }
            other => return Err(SyntaxError::InvalidEscape(other).into()),
        };
        out.push(byte)?;
    }
    JsonString::from_utf8(out).map_err(|_| SyntaxError::InvalidUtf8.into())
}

/// Decodes the escape after `\u`, consuming a trailing low surrogate when
/// the first unit is a high one.
fn decode_unicode(rest: &mut &[u8]) -> Result<char, SyntaxError> {
    let unit = read_unit(rest)?;
    let scalar = match unit {
        0xD800..=0xDBFF => {
            let Some(tail) = rest.strip_prefix(b"\\u") else {
                return Err(SyntaxError::UnpairedSurrogate(unit));
            };
            *rest = tail;
            let low = read_unit(rest)?;
            if !(0xDC00..=0xDFFF).contains(&low) {
                return Err(SyntaxError::UnpairedSurrogate(unit));
            }
            0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
        }
        0xDC00..=0xDFFF => return Err(SyntaxError::UnpairedSurrogate(unit)),
        _ => u32::from(unit),
    };
    char::from_u32(scalar).ok_or(SyntaxError::UnpairedSurrogate(unit))
}

fn read_unit(rest: &mut &[u8]) -> Result<u16, SyntaxError> {
    let (digits, tail) = rest
        .split_first_chunk::<4>()
        .ok_or(SyntaxError::UnexpectedEndOfInput)?;
    let mut unit = 0u16;
    for &b in digits {
        let digit = hex_value(b).ok_or(SyntaxError::InvalidHexDigit(b))?;
        unit = (unit << 4) | u16::from(digit);
    }
    *rest = tail;
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &[u8]) -> Result<JsonString<'static>, Failure> {
        unescape(raw, &Storage::system())
    }

    #[test]
    fn short_escapes() {
        let s = decode(br#"a\"b\\c\/d\b\f\n\r\t"#).unwrap();
        assert_eq!(s.as_bytes(), b"a\"b\\c/d\x08\x0c\n\r\t");
    }

    #[test]
    fn surrogate_pair_becomes_four_bytes() {
        let s = decode(br"\uD834\uDD1E").unwrap();
        assert_eq!(s.as_bytes(), [0xF0, 0x9D, 0x84, 0x9E]);
    }

    #[test]
    fn nul_is_preserved() {
        let s = decode(br"Hello\u0000World").unwrap();
        assert_eq!(s.len(), 11);
        assert_eq!(s.as_bytes()[5], 0);
        let raw = decode(b"a\0b").unwrap();
        assert_eq!(raw.as_bytes(), b"a\0b");
    }

    #[test]
    fn lone_surrogates_fail() {
        let unpaired =
            |unit: u16| -> Result<(), Failure> { Err(SyntaxError::UnpairedSurrogate(unit).into()) };
        assert_eq!(decode(br"\uD800").map(|_| ()), unpaired(0xD800));
        assert_eq!(decode(br"\uD800x").map(|_| ()), unpaired(0xD800));
        assert_eq!(decode(br"\uD800A").map(|_| ()), unpaired(0xD800));
        assert_eq!(decode(br"\uD800\u0041").map(|_| ()), unpaired(0xD800));
        assert_eq!(decode(br"\uDC00").map(|_| ()), unpaired(0xDC00));
    }

    #[test]
    fn bad_escapes_fail() {
        assert_eq!(
            decode(br"\x").map(|_| ()),
            Err(Failure::Syntax(SyntaxError::InvalidEscape(b'x')))
        );
        assert_eq!(
            decode(br"\u12G4").map(|_| ()),
            Err(Failure::Syntax(SyntaxError::InvalidHexDigit(b'G')))
        );
        assert_eq!(
            decode(b"\xff").map(|_| ()),
            Err(Failure::Syntax(SyntaxError::InvalidUtf8))
        );
    }
}
