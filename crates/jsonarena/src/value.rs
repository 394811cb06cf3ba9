//! JSON value types.
//!
//! This module defines the [`Value`] enum, which represents any valid JSON
//! value, together with the resource-backed [`JsonString`], [`Array`] and
//! [`Object`] containers. Every container keeps a [`Storage`] handle, so a
//! tree keeps the memory resource it was built in alive.
//!
//! `Display` renders compact JSON that parses back into an equal tree.
use alloc::vec::Vec;
use core::{
    fmt::{self, Write},
    mem,
    ops::Deref,
    slice,
    str::Utf8Error,
};

use bstr::BStr;

use crate::{
    resource::{AllocError, Storage},
    storage::StorageVec,
};

/// A UTF-8 string stored in a memory resource.
///
/// May contain embedded NUL characters; the length is always explicit.
pub struct JsonString<'r> {
    bytes: StorageVec<'r, u8>,
}

impl<'r> JsonString<'r> {
    /// Copies `text` into `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the resource cannot provide the bytes.
    pub fn copy_from_str(text: &str, storage: Storage<'r>) -> Result<Self, AllocError> {
        let mut bytes = StorageVec::with_capacity(text.len(), storage)?;
        bytes.extend_from_slice(text.as_bytes())?;
        Ok(Self { bytes })
    }

    pub(crate) fn from_utf8(bytes: StorageVec<'r, u8>) -> Result<Self, Utf8Error> {
        core::str::from_utf8(bytes.as_slice())?;
        Ok(Self { bytes })
    }

    /// The string contents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: every constructor checks or copies valid UTF-8.
        unsafe { core::str::from_utf8_unchecked(self.bytes.as_slice()) }
    }

    /// The raw UTF-8 bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// The resource holding the bytes.
    #[must_use]
    pub fn storage(&self) -> &Storage<'r> {
        self.bytes.storage()
    }
}

impl Deref for JsonString<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for JsonString<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<str> for JsonString<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for JsonString<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for JsonString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(BStr::new(self.as_bytes()), f)
    }
}

impl fmt::Display for JsonString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered sequence of values.
pub struct Array<'r> {
    items: StorageVec<'r, Value<'r>>,
}

impl<'r> Array<'r> {
    /// An empty array that will allocate from `storage`.
    #[must_use]
    pub fn new_in(storage: Storage<'r>) -> Self {
        Self {
            items: StorageVec::new(storage),
        }
    }

    /// Appends `value`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the array cannot grow; `value` is dropped.
    pub fn push(&mut self, value: Value<'r>) -> Result<(), AllocError> {
        self.items.push(value)
    }

    /// The resource holding the elements.
    #[must_use]
    pub fn storage(&self) -> &Storage<'r> {
        self.items.storage()
    }
}

impl<'r> Deref for Array<'r> {
    type Target = [Value<'r>];

    fn deref(&self) -> &[Value<'r>] {
        self.items.as_slice()
    }
}

impl PartialEq for Array<'_> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Drop for Array<'_> {
    fn drop(&mut self) {
        let mut nested = Vec::new();
        while let Some(value) = self.items.pop() {
            defer_drop(value, &mut nested);
        }
        drain_nested(nested);
    }
}

impl fmt::Debug for Array<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An ordered list of `(key, value)` members.
///
/// Insertion order is kept and duplicate keys are retained; lookups by key
/// return the first match.
pub struct Object<'r> {
    entries: StorageVec<'r, (JsonString<'r>, Value<'r>)>,
}

impl<'r> Object<'r> {
    /// An empty object that will allocate from `storage`.
    #[must_use]
    pub fn new_in(storage: Storage<'r>) -> Self {
        Self {
            entries: StorageVec::new(storage),
        }
    }

    /// Appends a member, even when `key` is already present.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] when the object cannot grow.
    pub fn push(&mut self, key: JsonString<'r>, value: Value<'r>) -> Result<(), AllocError> {
        self.entries.push((key, value))
    }

    /// The value of the first member named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value<'r>> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Every value stored under `key`, in document order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Value<'r>> + 'a {
        self.iter().filter(move |(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Members in document order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&JsonString<'r>, &Value<'r>)> + '_ {
        self.entries.as_slice().iter().map(|(k, v)| (k, v))
    }

    /// Keys in document order, duplicates included.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(k, _)| k.as_str())
    }

    /// Number of members, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the object has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    /// The resource holding the members.
    #[must_use]
    pub fn storage(&self) -> &Storage<'r> {
        self.entries.storage()
    }
}

impl PartialEq for Object<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.as_slice() == other.entries.as_slice()
    }
}

impl Drop for Object<'_> {
    fn drop(&mut self) {
        let mut nested = Vec::new();
        while let Some((_, value)) = self.entries.pop() {
            defer_drop(value, &mut nested);
        }
        drain_nested(nested);
    }
}

/// Queues non-empty containers on `nested`; everything else drops here.
///
/// Containers are emptied one level at a time from a heap stack, so freeing
/// a tree never recurses however deep it is.
fn defer_drop<'r>(value: Value<'r>, nested: &mut Vec<Value<'r>>) {
    let has_children = match &value {
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => false,
    };
    if has_children {
        nested.push(value);
    }
}

fn drain_nested(mut nested: Vec<Value<'_>>) {
    while let Some(mut value) = nested.pop() {
        match &mut value {
            Value::Array(a) => {
                while let Some(child) = a.items.pop() {
                    defer_drop(child, &mut nested);
                }
            }
            Value::Object(o) => {
                while let Some((_, child)) = o.entries.pop() {
                    defer_drop(child, &mut nested);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A JSON value as defined by [RFC 8259].
///
/// Integers that fit are kept exactly: [`Int64`](Value::Int64) for anything
/// in `i64` range, [`UInt64`](Value::UInt64) for larger non-negative values,
/// [`Double`](Value::Double) for everything else.
///
/// # Examples
///
/// ```
/// use jsonarena::{Value, parse};
///
/// let v = parse(r#"{"key":"value","n":[1,-2,3.5]}"#).unwrap();
/// let object = v.as_object().unwrap();
/// assert_eq!(object.get("key").and_then(Value::as_str), Some("value"));
/// assert_eq!(v.to_string(), r#"{"key":"value","n":[1,-2,3.5]}"#);
/// ```
///
/// [RFC 8259]: https://datatracker.ietf.org/doc/html/rfc8259
#[derive(Debug, PartialEq, Default)]
#[allow(missing_docs)]
pub enum Value<'r> {
    #[default]
    Null,
    Bool(bool),
    /// Any integer in `i64` range, including `-0`.
    Int64(i64),
    /// Integers above `i64::MAX` up to `u64::MAX`.
    UInt64(u64),
    /// Numbers with a fraction or exponent, and integers beyond `u64`.
    Double(f64),
    String(JsonString<'r>),
    Array(Array<'r>),
    Object(Object<'r>),
}

/// A classified JSON number.
#[derive(Debug, Clone, Copy, PartialEq)]
#[expect(missing_docs)]
pub enum Number {
    Int64(i64),
    UInt64(u64),
    Double(f64),
}

impl From<Number> for Value<'_> {
    fn from(n: Number) -> Self {
        match n {
            Number::Int64(v) => Self::Int64(v),
            Number::UInt64(v) => Self::UInt64(v),
            Number::Double(v) => Self::Double(v),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl<'r> From<JsonString<'r>> for Value<'r> {
    fn from(v: JsonString<'r>) -> Self {
        Self::String(v)
    }
}

impl<'r> From<Array<'r>> for Value<'r> {
    fn from(v: Array<'r>) -> Self {
        Self::Array(v)
    }
}

impl<'r> From<Object<'r>> for Value<'r> {
    fn from(v: Object<'r>) -> Self {
        Self::Object(v)
    }
}

impl<'r> Value<'r> {
    /// Returns `true` if the value is [`Null`](Value::Null).
    ///
    /// ```
    /// use jsonarena::Value;
    ///
    /// assert!(Value::Null.is_null());
    /// assert!(!Value::Bool(false).is_null());
    /// ```
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for any of the three numeric variants.
    #[must_use]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int64(_) | Self::UInt64(_) | Self::Double(_))
    }

    /// The boolean, if this is a [`Bool`](Value::Bool).
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is an [`Int64`](Value::Int64).
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as a `u64`, from either integer variant when it fits.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int64(n) => u64::try_from(*n).ok(),
            Self::UInt64(n) => Some(*n),
            _ => None,
        }
    }

    /// The value as an `f64`; integers are converted, possibly losing
    /// precision.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(n) => Some(*n as f64),
            Self::UInt64(n) => Some(*n as f64),
            Self::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// The string contents, if this is a [`String`](Value::String).
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The elements, if this is an [`Array`](Value::Array).
    #[must_use]
    pub fn as_array(&self) -> Option<&Array<'r>> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The members, if this is an [`Object`](Value::Object).
    #[must_use]
    pub fn as_object(&self) -> Option<&Object<'r>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// Writes `src` as the body of a JSON string literal.
///
/// Quotes, backslashes, control characters and the Unicode line separators
/// are escaped; everything else is copied verbatim.
pub(crate) fn write_escaped_string<W: Write>(src: &str, f: &mut W) -> fmt::Result {
    let mut start = 0;
    for (i, c) in src.char_indices() {
        let short = match c {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            '\u{8}' => "\\b",
            '\u{c}' => "\\f",
            // Pre-2019 JSON parsers choke on raw line separators.
            '\u{2028}' | '\u{2029}' => "",
            c if c.is_control() => "",
            _ => continue,
        };
        f.write_str(&src[start..i])?;
        if short.is_empty() {
            write!(f, "\\u{:04X}", c as u32)?;
        } else {
            f.write_str(short)?;
        }
        start = i + c.len_utf8();
    }
    f.write_str(&src[start..])
}

fn write_double<W: Write>(n: f64, f: &mut W) -> fmt::Result {
    if n.is_finite() {
        // `Debug` is the shortest round-tripping form and always carries a
        // `.` or an exponent, so the text parses back as a double.
        write!(f, "{n:?}")
    } else {
        f.write_str("null")
    }
}

/// A container whose remaining children are still to be written.
enum Open<'a, 'r> {
    Array(slice::Iter<'a, Value<'r>>, bool),
    Object(slice::Iter<'a, (JsonString<'r>, Value<'r>)>, bool),
}

/// Writes a scalar in full, or the opening bracket of a container and
/// pushes it on `open`.
fn write_head<'a, 'r, W: Write>(
    value: &'a Value<'r>,
    open: &mut Vec<Open<'a, 'r>>,
    f: &mut W,
) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        Value::Int64(n) => write!(f, "{n}"),
        Value::UInt64(n) => write!(f, "{n}"),
        Value::Double(n) => write_double(*n, f),
        Value::String(s) => {
            f.write_char('"')?;
            write_escaped_string(s, f)?;
            f.write_char('"')
        }
        Value::Array(arr) => {
            open.push(Open::Array(arr.iter(), true));
            f.write_char('[')
        }
        Value::Object(map) => {
            open.push(Open::Object(map.entries.as_slice().iter(), true));
            f.write_char('{')
        }
    }
}

// Nesting is tracked on the heap so deep trees render without recursion.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut open = Vec::new();
        write_head(self, &mut open, f)?;
        while let Some(top) = open.last_mut() {
            let next = match top {
                Open::Array(items, first) => {
                    let Some(v) = items.next() else {
                        open.pop();
                        f.write_char(']')?;
                        continue;
                    };
                    if !mem::take(first) {
                        f.write_char(',')?;
                    }
                    v
                }
                Open::Object(members, first) => {
                    let Some((k, v)) = members.next() else {
                        open.pop();
                        f.write_char('}')?;
                        continue;
                    };
                    if !mem::take(first) {
                        f.write_char(',')?;
                    }
                    f.write_char('"')?;
                    write_escaped_string(k, f)?;
                    f.write_str("\":")?;
                    v
                }
            };
            write_head(next, &mut open, f)?;
        }
        Ok(())
    }
}

// Enable serde support for tests and when the optional `serde` feature is
// activated by downstream crates.
#[cfg(any(test, feature = "serde"))]
impl serde::Serialize for Value<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int64(n) => serializer.serialize_i64(*n),
            Value::UInt64(n) => serializer.serialize_u64(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k.as_str(), v)?;
                }
                out.end()
            }
        }
    }
}
