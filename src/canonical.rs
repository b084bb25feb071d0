//! Canonical JSON used for every hash and signature in the ledger.
//!
//! Objects are emitted with keys in lexicographic order, `", "` between items,
//! `": "` between a key and its value, and everything outside printable ASCII
//! escaped as lowercase `\uXXXX` (surrogate pairs above the BMP). This is the
//! byte layout of a sorted-key, ASCII-only JSON dump, so digests computed here
//! agree with other implementations that sign the same structure.

use crate::error::ChainError;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io;

#[derive(Debug, Clone, Copy, Default)]
struct SortedAsciiFormatter;

impl Formatter for SortedAsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        // serde_json has already escaped quotes, backslashes and control
        // characters; DEL and non-ASCII still need escaping here.
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                let mut buf = [0u8; 1];
                writer.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Serializes `value` canonically. Going through `serde_json::Value` sorts
/// object keys, since its map is ordered by key.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, ChainError> {
    let value = serde_json::to_value(value)?;
    let mut out = Vec::with_capacity(128);
    let mut serializer = Serializer::with_formatter(&mut out, SortedAsciiFormatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

pub fn to_canonical_string<T: Serialize + ?Sized>(value: &T) -> Result<String, ChainError> {
    let bytes = to_canonical_vec(value)?;
    String::from_utf8(bytes).map_err(|e| ChainError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_with_spaced_separators() {
        let value = json!({"value": 5, "sender": "A", "nonce": 1, "list": [1, 2, 3]});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"list": [1, 2, 3], "nonce": 1, "sender": "A", "value": 5}"#
        );
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let value = json!({"b": {"z": null, "a": true}, "a": []});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"a": [], "b": {"a": true, "z": null}}"#
        );
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let value = json!({"memo": "caf\u{e9} \u{1F600}\u{7f}"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"memo": "caf\u00e9 \ud83d\ude00\u007f"}"#
        );
    }

    #[test]
    fn test_control_characters_use_short_escapes() {
        let value = json!({"memo": "line\n\"quoted\"\ttab\\"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"memo": "line\n\"quoted\"\ttab\\"}"#
        );
    }
}
