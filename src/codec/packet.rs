//! The framed packet codec (component C4).
//!
//! Layout: an 8-byte header (flags word + body length), followed by a body
//! of `opcode + tag_count + tags` that is optionally zlib-compressed as a
//! whole. See `spec.md` §4.3 for the exact byte layout, including the
//! flags/accept_flags byte-order quirk preserved here verbatim.

use std::io::{Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::codec::tag::{read_count16, write_count16, Tag};
use crate::error::{EcError, EcResult};

pub const FLAG_BLANK: u8 = 0x20;
pub const FLAG_ZLIB: u8 = 0x01;
pub const FLAG_UTF8_NUMBERS: u8 = 0x02;
pub const FLAG_HAS_ID: u8 = 0x04;
pub const FLAG_ACCEPTS: u8 = 0x10;
pub const FLAG_EXTENSION: u8 = 0x80;

/// A complete EC request or response.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub flags: u8,
    pub accept_flags: u8,
    pub opcode: u8,
    pub tags: Vec<Tag>,
}

impl Packet {
    /// A new outgoing packet. `flags` always carries BLANK at minimum.
    pub fn new(opcode: u8) -> Self {
        Packet {
            flags: FLAG_BLANK,
            accept_flags: FLAG_BLANK,
            opcode,
            tags: Vec::new(),
        }
    }

    pub fn set_flag(&mut self, flag: u8) -> &mut Self {
        self.flags |= flag;
        self
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    pub fn set_accept_flag(&mut self, flag: u8) -> &mut Self {
        self.accept_flags |= flag;
        self
    }

    pub fn push_tag(&mut self, tag: Tag) -> &mut Self {
        self.tags.push(tag);
        self
    }

    /// First top-level tag with the given name, if any.
    pub fn first_tag(&self, name: u16) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn tags_named(&self, name: u16) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(move |t| t.name == name)
    }

    /// Serialize this packet to its wire representation.
    pub fn to_bytes(&self) -> EcResult<Vec<u8>> {
        let utf8 = self.has_flag(FLAG_UTF8_NUMBERS);

        let mut body = Vec::new();
        body.push(self.opcode);
        write_count16(&mut body, self.tags.len() as u32, utf8);
        for tag in &self.tags {
            tag.write(&mut body, utf8)?;
        }

        let body = if self.has_flag(FLAG_ZLIB) {
            zlib_compress(&body)?
        } else {
            body
        };

        let mut header = Vec::with_capacity(8 + body.len());
        if self.accept_flags != FLAG_BLANK {
            let flags = self.flags | FLAG_ACCEPTS;
            header.extend_from_slice(&[0x00, 0x00, flags, self.accept_flags]);
        } else {
            header.extend_from_slice(&[0x00, 0x00, 0x00, self.flags]);
        }
        header.extend_from_slice(&(body.len() as u32).to_be_bytes());
        header.extend_from_slice(&body);

        log::debug!(
            "sending packet opcode=0x{:02x} tags={} bytes={}",
            self.opcode,
            self.tags.len(),
            body.len()
        );

        Ok(header)
    }

    /// Read and parse a complete packet from `r`. A short read, a bad zlib
    /// payload, an unknown tag type, or trailing bytes after the declared
    /// body length are all connection-fatal (`spec.md` §4.3 "Failure
    /// modes") — the caller should not attempt to keep using the stream.
    pub fn read_from<R: Read>(r: &mut R) -> EcResult<Packet> {
        let mut header = [0u8; 8];
        r.read_exact(&mut header)?;

        let flags_word = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let flags = (flags_word & 0xFF) as u8;
        let accept_flags = if flags & FLAG_ACCEPTS != 0 {
            ((flags_word & 0xFF00) >> 8) as u8
        } else {
            FLAG_BLANK
        };
        let body_length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

        let mut raw_body = vec![0u8; body_length];
        r.read_exact(&mut raw_body)?;

        let body = if flags & FLAG_ZLIB != 0 {
            zlib_decompress(&raw_body)?
        } else {
            raw_body
        };

        let utf8 = flags & FLAG_UTF8_NUMBERS != 0;
        let mut cursor = Cursor::new(body.as_slice());

        let mut opcode_byte = [0u8; 1];
        cursor.read_exact(&mut opcode_byte)?;
        let opcode = opcode_byte[0];

        let tag_count = read_count16(&mut cursor, utf8)?;
        let mut tags = Vec::with_capacity(tag_count as usize);
        for _ in 0..tag_count {
            tags.push(Tag::parse(&mut cursor, utf8)?);
        }

        if cursor.position() as usize != body.len() {
            return Err(EcError::decoding(
                "trailing bytes after declared packet body length",
            ));
        }

        log::debug!(
            "received packet opcode=0x{opcode:02x} tags={} bytes={body_length}",
            tags.len()
        );

        Ok(Packet {
            flags,
            accept_flags,
            opcode,
            tags,
        })
    }

    /// Compact human-readable summary, used for trace logging and the CLI's
    /// `--dump-packets` flag (`SPEC_FULL.md` §4.9).
    pub fn describe(&self) -> String {
        format!(
            "Packet {{ flags: 0x{:02x}, accept_flags: 0x{:02x}, opcode: 0x{:02x}, tags: {} }}",
            self.flags,
            self.accept_flags,
            self.opcode,
            self.tags.len()
        )
    }
}

fn zlib_compress(data: &[u8]) -> EcResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish().map_err(EcError::from)
}

fn zlib_decompress(data: &[u8]) -> EcResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EcError::decoding(format!("zlib inflate failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tag::TagValue;

    #[test]
    fn s2_empty_noop_packet() {
        let packet = Packet::new(0x01);
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn s3_stat_req_with_one_tag() {
        let mut packet = Packet::new(0x0A);
        packet.push_tag(Tag::new(0x0005, TagValue::U32(0xDEADBEEF)));
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![
                0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x0E, 0x0A, 0x00, 0x01, 0x00, 0x0A,
                0x04, 0x00, 0x00, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF,
            ]
        );
    }

    fn roundtrip(packet: &Packet) -> Packet {
        let bytes = packet.to_bytes().unwrap();
        let mut cursor = Cursor::new(bytes.as_slice());
        let parsed = Packet::read_from(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, bytes.len());
        parsed
    }

    fn normalize_flags(mut p: Packet) -> Packet {
        if p.accept_flags != FLAG_BLANK {
            p.flags |= FLAG_ACCEPTS;
        }
        p
    }

    #[test]
    fn p3_packet_round_trip_without_zlib() {
        let mut packet = Packet::new(0x0A);
        packet.push_tag(Tag::new(1, TagValue::U8(1)));
        packet.push_tag(Tag::with_children(
            2,
            TagValue::String(b"query".to_vec()),
            vec![Tag::new(3, TagValue::U32(42))],
        ));
        let parsed = roundtrip(&packet);
        assert_eq!(parsed, normalize_flags(packet));
    }

    #[test]
    fn p4_packet_round_trip_with_zlib() {
        let mut packet = Packet::new(0x1F);
        packet.set_flag(FLAG_ZLIB);
        for i in 0..20u32 {
            packet.push_tag(Tag::new(1, TagValue::U32(i)));
        }
        let parsed = roundtrip(&packet);
        assert_eq!(parsed, normalize_flags(packet));
    }

    #[test]
    fn p6_header_body_length_matches_wire_bytes() {
        let mut packet = Packet::new(0x0A);
        packet.push_tag(Tag::new(1, TagValue::U64(0xFF)));
        let bytes = packet.to_bytes().unwrap();
        let declared = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(declared, bytes.len() - 8);
    }

    #[test]
    fn accepts_flag_round_trips_through_accept_flags_byte() {
        let mut packet = Packet::new(0x01);
        packet.set_accept_flag(FLAG_ZLIB | FLAG_UTF8_NUMBERS);
        let parsed = roundtrip(&packet);
        assert!(parsed.has_flag(FLAG_ACCEPTS));
        assert_eq!(parsed.accept_flags, FLAG_ZLIB | FLAG_UTF8_NUMBERS);
    }

    #[test]
    fn utf8_numbers_flag_changes_count_encoding_but_round_trips() {
        let mut packet = Packet::new(0x26);
        packet.set_flag(FLAG_UTF8_NUMBERS);
        for i in 0..300u32 {
            packet.push_tag(Tag::new((i % 0x7FFF) as u16, TagValue::U8(1)));
        }
        let parsed = roundtrip(&packet);
        assert_eq!(parsed.tags.len(), 300);
    }

    #[test]
    fn truncated_header_is_an_io_error() {
        let mut cursor = Cursor::new(&[0u8, 1, 2][..]);
        assert!(Packet::read_from(&mut cursor).is_err());
    }

    #[test]
    fn trailing_bytes_after_body_are_a_framing_error() {
        let packet = Packet::new(0x01);
        let mut bytes = packet.to_bytes().unwrap();
        // Claim one more body byte than actually follows is malformed in the
        // other direction; instead, inflate body_length while keeping the
        // extra byte out of frame to exercise the trailing-bytes check.
        let declared_len = bytes.len() - 8 + 1;
        bytes[4..8].copy_from_slice(&(declared_len as u32).to_be_bytes());
        bytes.push(0xFF);
        let mut cursor = Cursor::new(bytes.as_slice());
        let result = Packet::read_from(&mut cursor);
        // The extra 0xFF is consumed as part of body_length but doesn't
        // parse as a valid tag stream continuation, so this is an error one
        // way or another (decoding or trailing-bytes).
        assert!(result.is_err());
    }
}
