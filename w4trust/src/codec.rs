// Canonical JSON encoding for handshake messages and session records.
//
// Output layout:
//   {"k": v, "k2": [a, b]}
// i.e. `", "` between items, `": "` after keys, struct field order as
// declared, byte fields as lowercase hex, and every character outside
// printable ASCII (0x20..=0x7e) escaped as lowercase `\uXXXX` (UTF-16 pairs
// above the BMP). Signatures and transcript hashes cover these exact bytes.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::Formatter;

use crate::error::{Result, W4TrustError};

/// `serde_json` formatter producing the canonical layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
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
        if fragment.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                let mut buf = [0u8; 4];
                writer.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
            } else {
                for unit in ch.encode_utf16(&mut units).iter() {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Serialize `value` into canonical bytes.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    value
        .serialize(&mut ser)
        .map_err(|e| W4TrustError::Codec(e.to_string()))?;
    Ok(out)
}

/// Parse wire bytes produced by any conformant encoder.
pub fn from_wire_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| W4TrustError::MalformedMessage(e.to_string()))
}

/// Serde adapter encoding byte containers (`[u8; N]`, `Vec<u8>`) as lowercase hex.
pub mod hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(value.as_ref()))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected byte length {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Sample {
        name: String,
        items: Vec<String>,
        #[serde(with = "hex_bytes")]
        key: [u8; 4],
        #[serde(with = "hex_bytes")]
        blob: Vec<u8>,
        seq: u64,
    }

    fn sample(name: &str) -> Sample {
        Sample {
            name: name.into(),
            items: vec!["a".into(), "b".into()],
            key: [0xde, 0xad, 0xbe, 0xef],
            blob: vec![],
            seq: 7,
        }
    }

    #[test]
    fn canonical_layout_uses_spaced_separators() {
        let bytes = to_canonical_vec(&sample("alice")).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"name": "alice", "items": ["a", "b"], "key": "deadbeef", "blob": "", "seq": 7}"#
        );
    }

    #[test]
    fn empty_collections_have_no_inner_space() {
        let empty: Vec<String> = vec![];
        assert_eq!(to_canonical_vec(&empty).unwrap(), b"[]");
    }

    #[test]
    fn non_ascii_is_escaped_lowercase() {
        let bytes = to_canonical_vec("caf\u{e9} \u{1F600}\u{7f}").unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#""caf\u00e9 \ud83d\ude00\u007f""#
        );
    }

    #[test]
    fn control_characters_use_short_escapes() {
        let bytes = to_canonical_vec("a\"b\\c\nd\u{1}").unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), r#""a\"b\\c\nd\u0001""#);
    }

    #[test]
    fn wire_bytes_parse_back() {
        let original = sample("bob");
        let bytes = to_canonical_vec(&original).unwrap();
        let parsed: Sample = from_wire_bytes(&bytes).unwrap();
        assert_eq!(parsed, original);
        // Compact encoders are accepted too.
        let compact = serde_json::to_vec(&original).unwrap();
        assert_eq!(from_wire_bytes::<Sample>(&compact).unwrap(), original);
    }

    #[test]
    fn wrong_length_hex_rejected() {
        let bad = br#"{"name": "x", "items": [], "key": "dead", "blob": "", "seq": 1}"#;
        assert!(from_wire_bytes::<Sample>(bad).is_err());
        let not_hex = br#"{"name": "x", "items": [], "key": "zzzzzzzz", "blob": "", "seq": 1}"#;
        assert!(from_wire_bytes::<Sample>(not_hex).is_err());
    }
}
