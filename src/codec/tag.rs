//! The recursive tag tree (component C3).
//!
//! A [`Tag`] is a typed, named value with an ordered list of child tags. Tags
//! serialize and parse against a byte stream in one of two count/length
//! encodings selected by the enclosing packet's UTF8_NUMBERS flag (see
//! [`crate::codec::varint`]).

use std::io::{Cursor, Read};

use crate::codec::varint;
use crate::error::{EcError, EcResult};

/// Wire type IDs for tag values (`spec.md` §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagType {
    Custom = 0x01,
    U8 = 0x02,
    U16 = 0x03,
    U32 = 0x04,
    U64 = 0x05,
    String = 0x06,
    Double = 0x07,
    Ipv4 = 0x08,
    Hash16 = 0x09,
}

impl TagType {
    fn from_u8(b: u8) -> EcResult<Self> {
        match b {
            0x01 => Ok(TagType::Custom),
            0x02 => Ok(TagType::U8),
            0x03 => Ok(TagType::U16),
            0x04 => Ok(TagType::U32),
            0x05 => Ok(TagType::U64),
            0x06 => Ok(TagType::String),
            0x07 => Ok(TagType::Double),
            0x08 => Ok(TagType::Ipv4),
            0x09 => Ok(TagType::Hash16),
            other => Err(EcError::decoding(format!(
                "unsupported tag type: 0x{other:02x}"
            ))),
        }
    }
}

/// The typed value carried by a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Custom(Vec<u8>),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    /// Logically UTF-8; stored as raw bytes since aMule does not guarantee
    /// valid UTF-8 in every field (file names in particular).
    String(Vec<u8>),
    Double(f64),
    /// Reserved by aMule but never emitted by the daemon as of this writing
    /// (`spec.md` §9 open question). Parses as a 4-byte opaque address so an
    /// unexpected occurrence does not poison the stream.
    Ipv4([u8; 4]),
    /// 128-bit hash, presented to callers as 32 lowercase hex characters.
    Hash16(String),
}

impl TagValue {
    pub fn tag_type(&self) -> TagType {
        match self {
            TagValue::Custom(_) => TagType::Custom,
            TagValue::U8(_) => TagType::U8,
            TagValue::U16(_) => TagType::U16,
            TagValue::U32(_) => TagType::U32,
            TagValue::U64(_) => TagType::U64,
            TagValue::String(_) => TagType::String,
            TagValue::Double(_) => TagType::Double,
            TagValue::Ipv4(_) => TagType::Ipv4,
            TagValue::Hash16(_) => TagType::Hash16,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            TagValue::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            TagValue::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            TagValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            TagValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_hash16(&self) -> Option<&str> {
        match self {
            TagValue::Hash16(hex) => Some(hex),
            _ => None,
        }
    }

    fn pack(&self) -> EcResult<Vec<u8>> {
        Ok(match self {
            TagValue::Custom(bytes) => bytes.clone(),
            TagValue::U8(v) => vec![*v],
            TagValue::U16(v) => v.to_be_bytes().to_vec(),
            TagValue::U32(v) => v.to_be_bytes().to_vec(),
            TagValue::U64(v) => v.to_be_bytes().to_vec(),
            TagValue::String(bytes) => {
                let mut out = bytes.clone();
                out.push(0x00);
                out
            }
            TagValue::Double(v) => v.to_be_bytes().to_vec(),
            TagValue::Ipv4(addr) => addr.to_vec(),
            TagValue::Hash16(hex) => hash16_to_bytes(hex)?,
        })
    }
}

fn hash16_to_bytes(hex: &str) -> EcResult<Vec<u8>> {
    if hex.len() != 32 {
        return Err(EcError::decoding(format!(
            "hash16 value must be 32 hex chars, got {}",
            hex.len()
        )));
    }
    hex::decode(hex).map_err(|e| EcError::decoding(format!("invalid hash16 hex: {e}")))
}

/// A named, typed value with an ordered list of children (`spec.md` §3.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: u16,
    pub value: TagValue,
    pub children: Vec<Tag>,
}

impl Tag {
    pub fn new(name: u16, value: TagValue) -> Self {
        Tag {
            name,
            value,
            children: Vec::new(),
        }
    }

    pub fn with_children(name: u16, value: TagValue, children: Vec<Tag>) -> Self {
        Tag {
            name,
            value,
            children,
        }
    }

    pub fn tag_type(&self) -> TagType {
        self.value.tag_type()
    }

    /// First child tag with the given name, if any. Duplicates (eg. repeated
    /// `PARTFILE_SOURCE_NAMES` children) are not enumerated by this helper.
    pub fn first_child(&self, name: u16) -> Option<&Tag> {
        self.children.iter().find(|t| t.name == name)
    }

    /// All children with the given name, in wire order.
    pub fn children_named(&self, name: u16) -> impl Iterator<Item = &Tag> {
        self.children.iter().filter(move |t| t.name == name)
    }

    /// Compact human-readable summary, used for trace logging and the CLI's
    /// `--dump-packets` flag (`SPEC_FULL.md` §4.9).
    pub fn describe(&self) -> String {
        format!(
            "Tag {{ name: 0x{:04x}, type: {:?}, value: {:?}, children: {} }}",
            self.name,
            self.tag_type(),
            self.value,
            self.children.len()
        )
    }

    pub fn write(&self, buf: &mut Vec<u8>, utf8: bool) -> EcResult<()> {
        let own_value = self.value.pack()?;

        let mut children_bytes = Vec::new();
        for child in &self.children {
            child.write(&mut children_bytes, utf8)?;
        }

        // body_length covers the children's own encoded bytes and this tag's
        // value, but not the child-count field written right after it — see
        // `ectag.py`'s `get_data()`, which computes `taglen` before
        // prepending the count.
        let body_length = children_bytes.len() as u32 + own_value.len() as u32;
        let has_children = !self.children.is_empty();
        let name_with_bit = ((self.name as u32) << 1) | (has_children as u32);

        write_count16(buf, name_with_bit, utf8);
        buf.push(self.tag_type() as u8);
        write_count32(buf, body_length, utf8);
        if has_children {
            write_count16(buf, self.children.len() as u32, utf8);
        }
        buf.extend_from_slice(&children_bytes);
        buf.extend_from_slice(&own_value);
        Ok(())
    }

    pub fn parse(cursor: &mut Cursor<&[u8]>, utf8: bool) -> EcResult<Tag> {
        let name_with_bit = read_count16(cursor, utf8)?;
        let has_children = name_with_bit & 1 == 1;
        let name = (name_with_bit >> 1) as u16;

        let mut type_byte = [0u8; 1];
        cursor.read_exact(&mut type_byte)?;
        let tag_type = TagType::from_u8(type_byte[0])?;

        let body_length = read_count32(cursor, utf8)?;

        let mut children = Vec::new();
        let mut children_len = 0u32;
        if has_children {
            let child_count = read_count16(cursor, utf8)?;
            let children_start = cursor.position();
            for _ in 0..child_count {
                children.push(Tag::parse(cursor, utf8)?);
            }
            children_len = (cursor.position() - children_start) as u32;
        }

        let value_len = body_length
            .checked_sub(children_len)
            .ok_or_else(|| EcError::decoding("tag body_length shorter than its children"))?;

        let value = parse_value(cursor, tag_type, value_len)?;

        log::trace!(
            "parsed tag name=0x{name:04x} type={tag_type:?} children={} value_len={value_len}",
            children.len()
        );

        Ok(Tag {
            name,
            value,
            children,
        })
    }
}

/// Write a tag name / child-count field: u16 big-endian in fixed-width mode,
/// a UTF-8 number when the enclosing packet has UTF8_NUMBERS set.
pub(crate) fn write_count16(buf: &mut Vec<u8>, n: u32, utf8: bool) {
    if utf8 {
        buf.extend_from_slice(&varint::encode(n));
    } else {
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    }
}

/// Write a body_length field: u32 big-endian in fixed-width mode, a UTF-8
/// number otherwise (`spec.md` §4.2).
pub(crate) fn write_count32(buf: &mut Vec<u8>, n: u32, utf8: bool) {
    if utf8 {
        buf.extend_from_slice(&varint::encode(n));
    } else {
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

pub(crate) fn read_count16(cursor: &mut Cursor<&[u8]>, utf8: bool) -> EcResult<u32> {
    if utf8 {
        varint::read_from(cursor)
    } else {
        let mut b = [0u8; 2];
        cursor.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b) as u32)
    }
}

pub(crate) fn read_count32(cursor: &mut Cursor<&[u8]>, utf8: bool) -> EcResult<u32> {
    if utf8 {
        varint::read_from(cursor)
    } else {
        let mut b = [0u8; 4];
        cursor.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }
}

fn parse_value(cursor: &mut Cursor<&[u8]>, tag_type: TagType, value_len: u32) -> EcResult<TagValue> {
    match tag_type {
        TagType::Custom => {
            let mut bytes = vec![0u8; value_len as usize];
            cursor.read_exact(&mut bytes)?;
            Ok(TagValue::Custom(bytes))
        }
        TagType::U8 => {
            expect_len(value_len, 1)?;
            let mut b = [0u8; 1];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::U8(b[0]))
        }
        TagType::U16 => {
            expect_len(value_len, 2)?;
            let mut b = [0u8; 2];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::U16(u16::from_be_bytes(b)))
        }
        TagType::U32 => {
            expect_len(value_len, 4)?;
            let mut b = [0u8; 4];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::U32(u32::from_be_bytes(b)))
        }
        TagType::U64 => {
            expect_len(value_len, 8)?;
            let mut b = [0u8; 8];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::U64(u64::from_be_bytes(b)))
        }
        TagType::String => {
            let mut bytes = Vec::new();
            let mut byte = [0u8; 1];
            loop {
                cursor.read_exact(&mut byte)?;
                if byte[0] == 0x00 {
                    break;
                }
                bytes.push(byte[0]);
            }
            if bytes.len() as u32 + 1 != value_len {
                return Err(EcError::decoding(
                    "string tag length did not match its declared body_length",
                ));
            }
            Ok(TagValue::String(bytes))
        }
        TagType::Double => {
            expect_len(value_len, 8)?;
            let mut b = [0u8; 8];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::Double(f64::from_be_bytes(b)))
        }
        TagType::Ipv4 => {
            expect_len(value_len, 4)?;
            let mut b = [0u8; 4];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::Ipv4(b))
        }
        TagType::Hash16 => {
            expect_len(value_len, 16)?;
            let mut b = [0u8; 16];
            cursor.read_exact(&mut b)?;
            Ok(TagValue::Hash16(hex::encode(b)))
        }
    }
}

fn expect_len(actual: u32, expected: u32) -> EcResult<()> {
    if actual != expected {
        return Err(EcError::decoding(format!(
            "tag value length mismatch: expected {expected}, got {actual}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tag: &Tag, utf8: bool) -> Tag {
        let mut buf = Vec::new();
        tag.write(&mut buf, utf8).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        let parsed = Tag::parse(&mut cursor, utf8).unwrap();
        assert_eq!(cursor.position() as usize, buf.len());
        parsed
    }

    #[test]
    fn scalar_types_round_trip_both_encodings() {
        let tags = vec![
            Tag::new(1, TagValue::U8(0xAB)),
            Tag::new(2, TagValue::U16(0xABCD)),
            Tag::new(3, TagValue::U32(0xDEADBEEF)),
            Tag::new(4, TagValue::U64(0x0123456789ABCDEF)),
            Tag::new(5, TagValue::String(b"hello world".to_vec())),
            Tag::new(6, TagValue::Double(3.5)),
            Tag::new(
                7,
                TagValue::Hash16("d41d8cd98f00b204e9800998ecf8427e".to_string()),
            ),
            Tag::new(8, TagValue::Custom(vec![1, 2, 3, 4, 5])),
        ];
        for tag in &tags {
            for utf8 in [false, true] {
                assert_eq!(roundtrip(tag, utf8), *tag);
            }
        }
    }

    #[test]
    fn s3_fixed_width_u32_tag() {
        let tag = Tag::new(0x0005, TagValue::U32(0xDEADBEEF));
        let mut buf = Vec::new();
        tag.write(&mut buf, false).unwrap();
        assert_eq!(
            buf,
            vec![0x00, 0x0A, 0x04, 0x00, 0x00, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]
        );
    }

    #[test]
    fn s5_tag_with_subtags_preserves_child_order() {
        let tag = Tag::with_children(
            0x0701,
            TagValue::U8(0),
            vec![
                Tag::new(0x0702, TagValue::String(b"abc".to_vec())),
                Tag::new(0x0703, TagValue::U32(1000)),
            ],
        );
        let parsed = roundtrip(&tag, false);
        assert_eq!(parsed.children.len(), 2);
        assert_eq!(parsed.children[0].name, 0x0702);
        assert_eq!(parsed.children[1].name, 0x0703);
        assert_eq!(parsed.children[0].value.as_str(), Some("abc"));
        assert_eq!(parsed.children[1].value.as_u32(), Some(1000));
    }

    #[test]
    fn s5_body_length_excludes_the_child_count_field() {
        // SEARCH_TYPE=0x0701 u8 with children SEARCH_NAME ("abc") and
        // SEARCH_MIN_SIZE (1000). body_length = 22 (both children's full
        // encoded bytes) + 1 (own u8 value) = 23, per spec.md scenario S5 —
        // the child-count field that follows body_length on the wire does
        // not count towards it.
        let tag = Tag::with_children(
            0x0701,
            TagValue::U8(0),
            vec![
                Tag::new(0x0702, TagValue::String(b"abc".to_vec())),
                Tag::new(0x0703, TagValue::U32(1000)),
            ],
        );
        let mut buf = Vec::new();
        tag.write(&mut buf, false).unwrap();

        assert_eq!(
            buf,
            vec![
                0x0E, 0x03, // name_with_bit = (0x0701 << 1) | 1
                0x02, // type: U8
                0x00, 0x00, 0x00, 0x17, // body_length = 23
                0x00, 0x02, // child_count = 2
                0x0E, 0x04, 0x06, 0x00, 0x00, 0x00, 0x04, 0x61, 0x62, 0x63, 0x00, // SEARCH_NAME
                0x0E, 0x06, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x03, 0xE8, // SEARCH_MIN_SIZE
                0x00, // own value: U8(0)
            ]
        );
    }

    #[test]
    fn s6_hash16_packs_to_sixteen_bytes() {
        let hex = "d41d8cd98f00b204e9800998ecf8427e";
        let tag = Tag::new(1, TagValue::Hash16(hex.to_string()));
        let packed = tag.value.pack().unwrap();
        assert_eq!(
            packed,
            vec![
                0xD4, 0x1D, 0x8C, 0xD9, 0x8F, 0x00, 0xB2, 0x04, 0xE9, 0x80, 0x09, 0x98, 0xEC,
                0xF8, 0x42, 0x7E
            ]
        );
    }

    #[test]
    fn p7_string_null_terminator() {
        let tag = Tag::new(1, TagValue::String(b"abc".to_vec()));
        let packed = tag.value.pack().unwrap();
        assert_eq!(packed.len(), 4);
        assert_eq!(*packed.last().unwrap(), 0x00);
    }

    #[test]
    fn unknown_tag_type_fails_to_parse() {
        // name=0x0000 (no children), type=0xFF (invalid), body_length irrelevant.
        let bytes = [0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(Tag::parse(&mut cursor, false).is_err());
    }

    #[test]
    fn duplicate_child_names_are_all_preserved() {
        let tag = Tag::with_children(
            1,
            TagValue::U8(0),
            vec![
                Tag::new(2, TagValue::String(b"a".to_vec())),
                Tag::new(2, TagValue::String(b"b".to_vec())),
            ],
        );
        let parsed = roundtrip(&tag, true);
        assert_eq!(parsed.children_named(2).count(), 2);
        assert_eq!(parsed.first_child(2).unwrap().value.as_str(), Some("a"));
    }

    #[test]
    fn describe_mentions_name_and_child_count() {
        let tag = Tag::with_children(
            0x0701,
            TagValue::U8(0),
            vec![Tag::new(0x0702, TagValue::String(b"abc".to_vec()))],
        );
        let s = tag.describe();
        assert!(s.contains("0x0701"));
        assert!(s.contains("children: 1"));
    }

    #[test]
    fn ipv4_tag_parses_as_opaque_four_bytes() {
        let tag = Tag::new(1, TagValue::Ipv4([127, 0, 0, 1]));
        let parsed = roundtrip(&tag, false);
        assert_eq!(parsed.value, TagValue::Ipv4([127, 0, 0, 1]));
    }
}
