//! Record codec.
//!
//! Every record is framed by a leading size field and carries a key, a
//! value, a type tag, and an optional SHA-1 digest of the value:
//!
//! ```text
//! | total_size (4) | key_len (4) | key | value_len (4) | value |
//! | type_len (4) | type | checksum (0 or 20) |
//! ```
//!
//! All integers are little-endian unsigned 32-bit. `total_size` includes its
//! own four bytes and is authoritative for framing; checksum presence is
//! inferred by comparing consumed bytes against it. The digest is computed
//! over the value bytes only and is skipped for empty values.

use crate::error::{CoreError, CoreResult};
use sha1::{Digest, Sha1};
use std::fmt;

/// Size of the SHA-1 digest trailing a record, when present.
pub const CHECKSUM_SIZE: usize = 20;

/// Size of each length field in the frame.
const LENGTH_FIELD_SIZE: usize = 4;

/// Smallest legal frame: the size field plus three empty length-prefixed
/// fields. Real records are larger since keys and type tags are non-empty.
pub(crate) const MIN_FRAME_SIZE: usize = 4 * LENGTH_FIELD_SIZE;

/// The type of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A UTF-8 string.
    String,
    /// A 64-bit signed integer, stored as 8 little-endian bytes.
    Int64,
}

impl ValueType {
    /// Returns the on-disk tag for this type.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
        }
    }

    /// Parses an on-disk tag back into a type.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "int64" => Some(Self::Int64),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single typed key-value record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    key: String,
    value: Vec<u8>,
    value_type: ValueType,
    checksum: Option<[u8; CHECKSUM_SIZE]>,
}

impl Record {
    /// Creates a string-typed record, computing the value checksum.
    #[must_use]
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into().into_bytes();
        Self {
            key: key.into(),
            checksum: compute_checksum(&value),
            value,
            value_type: ValueType::String,
        }
    }

    /// Creates an int64-typed record, computing the value checksum.
    ///
    /// The value is stored as exactly 8 little-endian bytes.
    #[must_use]
    pub fn int64(key: impl Into<String>, value: i64) -> Self {
        let value = value.to_le_bytes().to_vec();
        Self {
            key: key.into(),
            checksum: compute_checksum(&value),
            value,
            value_type: ValueType::Int64,
        }
    }

    /// Returns the record key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the raw value bytes.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consumes the record, returning the value bytes.
    #[must_use]
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Returns the value type.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the framed size of this record on disk.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        MIN_FRAME_SIZE
            + self.key.len()
            + self.value.len()
            + self.value_type.tag().len()
            + self.checksum.map_or(0, |_| CHECKSUM_SIZE)
    }

    /// Encodes the record into its framed byte form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let total = self.encoded_len();
        let mut buf = Vec::with_capacity(total);

        buf.extend_from_slice(&(total as u32).to_le_bytes());

        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());

        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);

        let tag = self.value_type.tag();
        buf.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        buf.extend_from_slice(tag.as_bytes());

        if let Some(checksum) = &self.checksum {
            buf.extend_from_slice(checksum);
        }

        buf
    }

    /// Decodes a record from exactly one framed buffer.
    ///
    /// The buffer must hold the complete frame, `total_size` bytes long.
    /// When a checksum is present it is verified against the value bytes.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSegment` if the frame is malformed (bad lengths, an
    /// unknown type tag, a non-UTF-8 key, an empty key, or an int64 value
    /// that is not 8 bytes), and `ChecksumMismatch` if the stored digest
    /// does not match the value.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(CoreError::corrupt_segment("record shorter than minimal frame"));
        }

        let mut offset = 0;
        let total = read_u32(data, &mut offset)? as usize;
        if total != data.len() {
            return Err(CoreError::corrupt_segment(format!(
                "frame size {total} disagrees with buffer length {}",
                data.len()
            )));
        }

        let key_len = read_u32(data, &mut offset)? as usize;
        let key_bytes = read_bytes(data, &mut offset, key_len)?;
        let key = std::str::from_utf8(key_bytes)
            .map_err(|_| CoreError::corrupt_segment("record key is not valid UTF-8"))?
            .to_string();
        if key.is_empty() {
            return Err(CoreError::corrupt_segment("record key is empty"));
        }

        let value_len = read_u32(data, &mut offset)? as usize;
        let value = read_bytes(data, &mut offset, value_len)?.to_vec();

        let tag_len = read_u32(data, &mut offset)? as usize;
        let tag_bytes = read_bytes(data, &mut offset, tag_len)?;
        let tag = std::str::from_utf8(tag_bytes)
            .map_err(|_| CoreError::corrupt_segment("record type tag is not valid UTF-8"))?;
        let value_type = ValueType::from_tag(tag)
            .ok_or_else(|| CoreError::corrupt_segment(format!("unknown value type: {tag:?}")))?;

        if value_type == ValueType::Int64 && value.len() != 8 {
            return Err(CoreError::corrupt_segment(format!(
                "int64 value must be 8 bytes, got {}",
                value.len()
            )));
        }

        let checksum = match data.len() - offset {
            0 => None,
            CHECKSUM_SIZE => {
                let mut stored = [0u8; CHECKSUM_SIZE];
                stored.copy_from_slice(&data[offset..]);

                let computed: [u8; CHECKSUM_SIZE] = Sha1::digest(&value).into();
                if computed != stored {
                    return Err(CoreError::ChecksumMismatch {
                        expected: hex(&stored),
                        actual: hex(&computed),
                    });
                }
                Some(stored)
            }
            trailing => {
                return Err(CoreError::corrupt_segment(format!(
                    "{trailing} trailing bytes after type tag, expected 0 or {CHECKSUM_SIZE}"
                )));
            }
        };

        Ok(Self {
            key,
            value,
            value_type,
            checksum,
        })
    }
}

/// Computes the SHA-1 digest of a value, or `None` for empty values.
fn compute_checksum(value: &[u8]) -> Option<[u8; CHECKSUM_SIZE]> {
    if value.is_empty() {
        return None;
    }
    Some(Sha1::digest(value).into())
}

fn read_u32(data: &[u8], offset: &mut usize) -> CoreResult<u32> {
    let bytes = read_bytes(data, offset, LENGTH_FIELD_SIZE)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_bytes<'a>(data: &'a [u8], offset: &mut usize, len: usize) -> CoreResult<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| CoreError::corrupt_segment("record frame truncated"))?;
    let bytes = &data[*offset..end];
    *offset = end;
    Ok(bytes)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_record_roundtrip() {
        let record = Record::string("k1", "v1");

        let encoded = record.encode();
        let decoded = Record::decode(&encoded).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.key(), "k1");
        assert_eq!(decoded.value(), b"v1");
        assert_eq!(decoded.value_type(), ValueType::String);
    }

    #[test]
    fn int64_record_roundtrip() {
        for value in [i64::MIN, -1, 0, 1, i64::MAX, 9_876_543_210_123] {
            let record = Record::int64("x", value);

            let encoded = record.encode();
            let decoded = Record::decode(&encoded).unwrap();

            assert_eq!(decoded, record);
            assert_eq!(decoded.value().len(), 8);
        }
    }

    #[test]
    fn encoded_len_matches_encoding() {
        let record = Record::string("key", "value");
        assert_eq!(record.encoded_len(), record.encode().len());

        let record = Record::int64("key", 7);
        assert_eq!(record.encoded_len(), record.encode().len());
    }

    #[test]
    fn checksum_follows_value() {
        let record = Record::string("k", "v");
        let encoded = record.encode();

        // 4 (size) + 4+1 (key) + 4+1 (value) + 4+6 (type) + 20 (sha-1)
        assert_eq!(encoded.len(), 44);

        let expected: [u8; CHECKSUM_SIZE] = Sha1::digest(b"v").into();
        assert_eq!(&encoded[24..], &expected);
    }

    #[test]
    fn empty_value_has_no_checksum() {
        let record = Record::string("k", "");
        let encoded = record.encode();

        // 4 (size) + 4+1 (key) + 4+0 (value) + 4+6 (type)
        assert_eq!(encoded.len(), 23);

        let decoded = Record::decode(&encoded).unwrap();
        assert_eq!(decoded.value(), b"");
    }

    #[test]
    fn flipped_value_byte_fails_checksum() {
        let record = Record::string("k", "payload");
        let mut encoded = record.encode();

        // Corrupt one value byte; the frame stays structurally valid.
        encoded[13] ^= 0xFF;

        let result = Record::decode(&encoded);
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let result = Record::decode(&[0u8; 8]);
        assert!(matches!(result, Err(CoreError::CorruptSegment { .. })));
    }

    #[test]
    fn decode_rejects_size_disagreement() {
        let mut encoded = Record::string("k", "v").encode();
        encoded.push(0);

        let result = Record::decode(&encoded);
        assert!(matches!(result, Err(CoreError::CorruptSegment { .. })));
    }

    #[test]
    fn decode_rejects_unknown_type_tag() {
        // Hand-build a frame with a bogus tag.
        let key = b"k";
        let value = b"v";
        let tag = b"float32";
        let total = 16 + key.len() + value.len() + tag.len();

        let mut buf = Vec::new();
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key);
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);
        buf.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        buf.extend_from_slice(tag);

        let result = Record::decode(&buf);
        assert!(matches!(result, Err(CoreError::CorruptSegment { .. })));
    }

    #[test]
    fn decode_rejects_lying_key_length() {
        let mut encoded = Record::string("key", "value").encode();
        // Claim the key runs past the end of the frame.
        encoded[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

        let result = Record::decode(&encoded);
        assert!(matches!(result, Err(CoreError::CorruptSegment { .. })));
    }

    #[test]
    fn decode_rejects_empty_key() {
        let value = b"v";
        let tag = b"string";
        let total = 16 + value.len() + tag.len();

        let mut buf = Vec::new();
        buf.extend_from_slice(&(total as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(value);
        buf.extend_from_slice(&(tag.len() as u32).to_le_bytes());
        buf.extend_from_slice(tag);

        let result = Record::decode(&buf);
        assert!(matches!(result, Err(CoreError::CorruptSegment { .. })));
    }

    #[test]
    fn value_type_tags() {
        assert_eq!(ValueType::String.tag(), "string");
        assert_eq!(ValueType::Int64.tag(), "int64");
        assert_eq!(ValueType::from_tag("string"), Some(ValueType::String));
        assert_eq!(ValueType::from_tag("int64"), Some(ValueType::Int64));
        assert_eq!(ValueType::from_tag("bytes"), None);
    }
}
