use amule_ec::codec::{Packet, Tag, TagType, TagValue};
use amule_ec::protocol::codes::{op, tag, CodeTable, KNOWN_VERSIONS};

#[test]
fn s1_varint_boundaries_round_trip_through_a_packet() {
    use amule_ec::codec::packet::FLAG_UTF8_NUMBERS;

    let mut packet = Packet::new(op::SEARCH_START);
    packet.set_flag(FLAG_UTF8_NUMBERS);
    for name in [0x7Fu16, 0x80, 0x7FF, 0x800] {
        packet.push_tag(Tag::new(name, TagValue::U8(1)));
    }

    let bytes = packet.to_bytes().unwrap();
    let mut cursor = std::io::Cursor::new(bytes.as_slice());
    let parsed = Packet::read_from(&mut cursor).unwrap();

    assert_eq!(parsed.tags.len(), 4);
    for (original, decoded) in packet.tags.iter().zip(parsed.tags.iter()) {
        assert_eq!(original.name, decoded.name);
    }
}

#[test]
fn s4_code_table_gates_salted_auth_opcodes_by_version() {
    for version in KNOWN_VERSIONS {
        let table = CodeTable::for_version(version).unwrap();
        if version >= 0x0203 {
            assert_eq!(table.auth_salt_opcode(), Some(op::AUTH_SALT));
        } else {
            assert_eq!(table.auth_salt_opcode(), None);
        }
    }
}

#[test]
fn s5_search_request_tag_tree_round_trips_with_children() {
    let mut packet = Packet::new(op::SEARCH_START);
    packet.push_tag(Tag::with_children(
        tag::SEARCHFILE,
        TagValue::U8(0),
        vec![
            Tag::new(tag::SEARCH_TYPE, TagValue::U8(0)),
            Tag::new(
                tag::SEARCH_NAME,
                TagValue::String(b"debian netinst".to_vec()),
            ),
            Tag::new(tag::SEARCH_MIN_SIZE, TagValue::U32(100_000)),
        ],
    ));

    let bytes = packet.to_bytes().unwrap();
    let mut cursor = std::io::Cursor::new(bytes.as_slice());
    let parsed = Packet::read_from(&mut cursor).unwrap();

    let search_tag = parsed.first_tag(tag::SEARCHFILE).unwrap();
    assert_eq!(search_tag.children.len(), 3);
    assert_eq!(
        search_tag
            .first_child(tag::SEARCH_NAME)
            .unwrap()
            .value
            .as_str(),
        Some("debian netinst")
    );
    assert_eq!(
        search_tag
            .first_child(tag::SEARCH_MIN_SIZE)
            .unwrap()
            .value
            .as_u32(),
        Some(100_000)
    );

    // body_length must equal the children's own encoded bytes plus the
    // parent's value, excluding the child_count field that follows it on
    // the wire (spec.md S5). SEARCH_TYPE (8) + SEARCH_NAME (22, 14-char
    // string + null) + SEARCH_MIN_SIZE (11) + own U8 value (1) = 42.
    let mut standalone = Vec::new();
    parsed
        .first_tag(tag::SEARCHFILE)
        .unwrap()
        .write(&mut standalone, false)
        .unwrap();
    let declared_body_length = u32::from_be_bytes([
        standalone[3],
        standalone[4],
        standalone[5],
        standalone[6],
    ]);
    assert_eq!(declared_body_length, 42);
}

#[test]
fn s6_partfile_hash_round_trips_as_hash16() {
    let hash = "d41d8cd98f00b204e9800998ecf8427e";
    let mut packet = Packet::new(op::GET_DLOAD_QUEUE);
    packet.push_tag(Tag::new(tag::PARTFILE, TagValue::Hash16(hash.to_string())));

    let bytes = packet.to_bytes().unwrap();
    let mut cursor = std::io::Cursor::new(bytes.as_slice());
    let parsed = Packet::read_from(&mut cursor).unwrap();

    let partfile = parsed.first_tag(tag::PARTFILE).unwrap();
    assert_eq!(partfile.tag_type(), TagType::Hash16);
    assert_eq!(partfile.value.as_hash16(), Some(hash));
}

#[test]
fn p8_zlib_compressed_packet_carries_the_same_tags_as_uncompressed() {
    use amule_ec::codec::packet::FLAG_ZLIB;

    let mut compressed = Packet::new(op::DLOAD_QUEUE);
    compressed.set_flag(FLAG_ZLIB);
    let mut plain = Packet::new(op::DLOAD_QUEUE);
    for i in 0..50u32 {
        compressed.push_tag(Tag::new(1, TagValue::U32(i)));
        plain.push_tag(Tag::new(1, TagValue::U32(i)));
    }

    let compressed_bytes = compressed.to_bytes().unwrap();
    let plain_bytes = plain.to_bytes().unwrap();
    assert!(compressed_bytes.len() < plain_bytes.len());

    let mut cursor = std::io::Cursor::new(compressed_bytes.as_slice());
    let parsed = Packet::read_from(&mut cursor).unwrap();
    assert_eq!(parsed.tags.len(), 50);
    for (i, t) in parsed.tags.iter().enumerate() {
        assert_eq!(t.value.as_u32(), Some(i as u32));
    }
}
