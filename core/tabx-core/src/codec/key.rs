//! Order-preserving key part encoding.
//!
//! The byte-lexicographic order of encoded keys equals the field-wise order
//! of the decoded values, so prefix and range scans over the store return rows
//! in declared key order.
//!
//! | kind   | encoding                                           |
//! |--------|----------------------------------------------------|
//! | bool   | `0x00` / `0x01`                                    |
//! | u32/u64| big-endian                                         |
//! | i32/i64| big-endian with the sign bit flipped               |
//! | string | bytes, `0x00` escaped as `0x00 0xFF`, then `0x00 0x01` |
//! | bytes  | same as string                                     |

use crate::error::{TabxError, TabxResult};
use crate::record::{FieldSpec, KeyKind, KeyPart};

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Key-space id of the primary key within a table.
pub const PRIMARY_KEY_ID: u32 = 0;
/// Key-space id reserved for the sequence counter (index store only).
pub const SEQUENCE_ID: u32 = u32::MAX;
/// Length of `[table id][key-space id]`.
pub const PREFIX_LEN: usize = 8;

/// `[table id][key-space id]`, both big-endian.
pub fn table_prefix(table_id: u32, space_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PREFIX_LEN + 16);
    buf.extend_from_slice(&table_id.to_be_bytes());
    buf.extend_from_slice(&space_id.to_be_bytes());
    buf
}

/// Split a raw key into `(table id, key-space id, rest)`.
pub fn split_prefix(key: &[u8]) -> TabxResult<(u32, u32, &[u8])> {
    if key.len() < PREFIX_LEN {
        return Err(TabxError::Decoding(format!(
            "key of {} bytes is shorter than the {} byte table prefix",
            key.len(),
            PREFIX_LEN
        )));
    }
    let table_id = u32::from_be_bytes([key[0], key[1], key[2], key[3]]);
    let space_id = u32::from_be_bytes([key[4], key[5], key[6], key[7]]);
    Ok((table_id, space_id, &key[PREFIX_LEN..]))
}

pub fn encode_part(buf: &mut Vec<u8>, part: &KeyPart) {
    match part {
        KeyPart::Bool(v) => buf.push(u8::from(*v)),
        KeyPart::U32(v) => buf.extend_from_slice(&v.to_be_bytes()),
        KeyPart::U64(v) => buf.extend_from_slice(&v.to_be_bytes()),
        KeyPart::I32(v) => buf.extend_from_slice(&((*v as u32) ^ (1 << 31)).to_be_bytes()),
        KeyPart::I64(v) => buf.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes()),
        KeyPart::String(v) => encode_escaped(buf, v.as_bytes()),
        KeyPart::Bytes(v) => encode_escaped(buf, v),
    }
}

fn encode_escaped(buf: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        buf.push(b);
        if b == ESCAPE {
            buf.push(ESCAPED_NUL);
        }
    }
    buf.push(ESCAPE);
    buf.push(TERMINATOR);
}

/// Encode `parts`, checking them against `fields`.
pub fn encode_parts(buf: &mut Vec<u8>, fields: &[FieldSpec], parts: &[KeyPart]) -> TabxResult<()> {
    if parts.len() > fields.len() {
        return Err(TabxError::Encoding(format!(
            "got {} key values for {} fields",
            parts.len(),
            fields.len()
        )));
    }
    for (field, part) in fields.iter().zip(parts) {
        if field.kind != part.kind() {
            return Err(TabxError::Encoding(format!(
                "key field '{}' expects {:?}, got {:?}",
                field.name,
                field.kind,
                part.kind()
            )));
        }
        encode_part(buf, part);
    }
    Ok(())
}

/// Decode one part of `kind`; returns the part and the bytes consumed.
pub fn decode_part(bytes: &[u8], kind: KeyKind) -> TabxResult<(KeyPart, usize)> {
    match kind {
        KeyKind::Bool => match bytes.first() {
            Some(0) => Ok((KeyPart::Bool(false), 1)),
            Some(1) => Ok((KeyPart::Bool(true), 1)),
            Some(b) => Err(TabxError::Decoding(format!("invalid bool byte 0x{b:02x}"))),
            None => Err(short("bool")),
        },
        KeyKind::U32 => {
            let raw = fixed::<4>(bytes, "u32")?;
            Ok((KeyPart::U32(u32::from_be_bytes(raw)), 4))
        }
        KeyKind::U64 => {
            let raw = fixed::<8>(bytes, "u64")?;
            Ok((KeyPart::U64(u64::from_be_bytes(raw)), 8))
        }
        KeyKind::I32 => {
            let raw = fixed::<4>(bytes, "i32")?;
            Ok((KeyPart::I32((u32::from_be_bytes(raw) ^ (1 << 31)) as i32), 4))
        }
        KeyKind::I64 => {
            let raw = fixed::<8>(bytes, "i64")?;
            Ok((KeyPart::I64((u64::from_be_bytes(raw) ^ (1 << 63)) as i64), 8))
        }
        KeyKind::String => {
            let (raw, used) = decode_escaped(bytes)?;
            let s = String::from_utf8(raw)
                .map_err(|e| TabxError::Decoding(format!("string key part: {e}")))?;
            Ok((KeyPart::String(s), used))
        }
        KeyKind::Bytes => {
            let (raw, used) = decode_escaped(bytes)?;
            Ok((KeyPart::Bytes(raw), used))
        }
    }
}

/// Decode exactly `fields.len()` parts from the front of `bytes`.
pub fn decode_parts(bytes: &[u8], fields: &[FieldSpec]) -> TabxResult<(Vec<KeyPart>, usize)> {
    let mut parts = Vec::with_capacity(fields.len());
    let mut offset = 0;
    for field in fields {
        let (part, used) = decode_part(&bytes[offset..], field.kind)
            .map_err(|e| TabxError::Decoding(format!("field '{}': {}", field.name, e)))?;
        parts.push(part);
        offset += used;
    }
    Ok((parts, offset))
}

/// Decode `fields` and require the buffer to be fully consumed.
pub fn decode_parts_exact(bytes: &[u8], fields: &[FieldSpec]) -> TabxResult<Vec<KeyPart>> {
    let (parts, used) = decode_parts(bytes, fields)?;
    if used != bytes.len() {
        return Err(TabxError::Decoding(format!(
            "{} trailing bytes after key",
            bytes.len() - used
        )));
    }
    Ok(parts)
}

fn decode_escaped(bytes: &[u8]) -> TabxResult<(Vec<u8>, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != ESCAPE {
            out.push(b);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(&TERMINATOR) => return Ok((out, i + 2)),
            Some(&ESCAPED_NUL) => {
                out.push(ESCAPE);
                i += 2;
            }
            Some(other) => {
                return Err(TabxError::Decoding(format!(
                    "invalid escape sequence 0x00 0x{other:02x}"
                )));
            }
            None => break,
        }
    }
    Err(short("terminated string"))
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> TabxResult<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| short(what))
}

fn short(what: &str) -> TabxError {
    TabxError::Decoding(format!("buffer too short for {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encoded(part: &KeyPart) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_part(&mut buf, part);
        buf
    }

    #[test]
    fn prefix_layout() {
        let prefix = table_prefix(1, PRIMARY_KEY_ID);
        assert_eq!(prefix, vec![0, 0, 0, 1, 0, 0, 0, 0]);
        let (table, space, rest) = split_prefix(&[0, 0, 0, 2, 255, 255, 255, 255, 9]).unwrap();
        assert_eq!((table, space, rest), (2, SEQUENCE_ID, &[9u8][..]));
    }

    #[test]
    fn short_prefix_fails() {
        assert!(matches!(split_prefix(&[0, 1]), Err(TabxError::Decoding(_))));
    }

    #[test]
    fn signed_order() {
        assert!(encoded(&KeyPart::I64(-5)) < encoded(&KeyPart::I64(-1)));
        assert!(encoded(&KeyPart::I64(-1)) < encoded(&KeyPart::I64(0)));
        assert!(encoded(&KeyPart::I32(i32::MIN)) < encoded(&KeyPart::I32(i32::MAX)));
    }

    #[test]
    fn string_with_nul_round_trips() {
        let part = KeyPart::String("a\0b".to_string());
        let bytes = encoded(&part);
        assert_eq!(bytes, vec![b'a', 0, 0xFF, b'b', 0, 1]);
        let (decoded, used) = decode_part(&bytes, KeyKind::String).unwrap();
        assert_eq!(decoded, part);
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(decode_part(b"abc", KeyKind::String).is_err());
        assert!(decode_part(&[b'a', 0], KeyKind::Bytes).is_err());
        assert!(decode_part(&[0, 7], KeyKind::Bytes).is_err());
    }

    #[test]
    fn short_integer_fails() {
        assert!(matches!(
            decode_part(&[0, 0, 1], KeyKind::U32),
            Err(TabxError::Decoding(_))
        ));
        assert!(decode_part(&[], KeyKind::Bool).is_err());
        assert!(decode_part(&[2], KeyKind::Bool).is_err());
    }

    #[test]
    fn composite_key_with_trailing_bytes_fails() {
        static FIELDS: [FieldSpec; 1] = [FieldSpec {
            name: "id",
            kind: KeyKind::U64,
        }];
        let mut buf = Vec::new();
        encode_parts(&mut buf, &FIELDS, &[KeyPart::U64(3)]).unwrap();
        assert_eq!(decode_parts_exact(&buf, &FIELDS).unwrap(), vec![KeyPart::U64(3)]);
        buf.push(0);
        assert!(decode_parts_exact(&buf, &FIELDS).is_err());
    }

    #[test]
    fn mistyped_part_is_an_encoding_error() {
        static FIELDS: [FieldSpec; 1] = [FieldSpec {
            name: "id",
            kind: KeyKind::U64,
        }];
        let mut buf = Vec::new();
        let err = encode_parts(&mut buf, &FIELDS, &[KeyPart::from("x")]).unwrap_err();
        assert!(matches!(err, TabxError::Encoding(_)));
    }

    proptest! {
        #[test]
        fn string_order_preserved(a in ".*", b in ".*") {
            let ea = encoded(&KeyPart::String(a.clone()));
            let eb = encoded(&KeyPart::String(b.clone()));
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), ea.cmp(&eb));
        }

        #[test]
        fn bytes_order_preserved(a in proptest::collection::vec(any::<u8>(), 0..16),
                                 b in proptest::collection::vec(any::<u8>(), 0..16)) {
            let ea = encoded(&KeyPart::Bytes(a.clone()));
            let eb = encoded(&KeyPart::Bytes(b.clone()));
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn i64_order_preserved(a in any::<i64>(), b in any::<i64>()) {
            let ea = encoded(&KeyPart::I64(a));
            let eb = encoded(&KeyPart::I64(b));
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn composite_order_preserved(a in (any::<u32>(), ".{0,4}"), b in (any::<u32>(), ".{0,4}")) {
            static FIELDS: [FieldSpec; 2] = [
                FieldSpec { name: "n", kind: KeyKind::U32 },
                FieldSpec { name: "s", kind: KeyKind::String },
            ];
            let mut ea = Vec::new();
            encode_parts(&mut ea, &FIELDS, &[KeyPart::U32(a.0), KeyPart::String(a.1.clone())]).unwrap();
            let mut eb = Vec::new();
            encode_parts(&mut eb, &FIELDS, &[KeyPart::U32(b.0), KeyPart::String(b.1.clone())]).unwrap();
            let expected = a.0.cmp(&b.0).then(a.1.as_bytes().cmp(b.1.as_bytes()));
            prop_assert_eq!(expected, ea.cmp(&eb));
            prop_assert_eq!(
                decode_parts_exact(&ea, &FIELDS).unwrap(),
                vec![KeyPart::U32(a.0), KeyPart::String(a.1)]
            );
        }
    }
}
