//! The authentication handshake (component C5).
//!
//! Tries each protocol version the client knows, oldest first. A version
//! below 0x0203 authenticates in one round trip with a plain password hash;
//! 0x0203 and above negotiate a per-connection salt first (`spec.md` §4.4,
//! scenario S4). On success the negotiated [`CodeTable`] is returned so the
//! caller never has to re-derive which version won.

use md5::{Digest, Md5};

use crate::codec::{Packet, Tag, TagValue};
use crate::error::{EcError, EcResult};
use crate::protocol::codes::{self, op, tag, CodeTable};

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Run the multi-version handshake over an already-connected stream.
pub fn authenticate<S: std::io::Read + std::io::Write>(
    stream: &mut S,
    password: &str,
    client_name: &str,
    client_version: &str,
) -> EcResult<CodeTable> {
    let mut last_failure = None;

    for version in codes::KNOWN_VERSIONS {
        let table = CodeTable::for_version(version)?;
        log::debug!("attempting handshake with protocol version 0x{version:04x}");

        match try_version(stream, &table, password, client_name, client_version) {
            Ok(()) => return Ok(table),
            Err(EcError::AuthFailed(reason)) => {
                log::debug!("protocol version 0x{version:04x} rejected: {reason}");
                last_failure = Some(reason);
            }
            Err(other) => return Err(other),
        }
    }

    Err(EcError::AuthFailed(last_failure.unwrap_or_else(|| {
        "server accepted none of this client's known protocol versions".to_string()
    })))
}

fn try_version<S: std::io::Read + std::io::Write>(
    stream: &mut S,
    table: &CodeTable,
    password: &str,
    client_name: &str,
    client_version: &str,
) -> EcResult<()> {
    let mut request = Packet::new(op::AUTH_REQ);
    request.push_tag(Tag::new(tag::PROTOCOL_VERSION, TagValue::U16(table.version)));
    request.push_tag(Tag::new(
        tag::CLIENT_NAME,
        TagValue::String(client_name.as_bytes().to_vec()),
    ));
    request.push_tag(Tag::new(
        tag::CLIENT_VERSION,
        TagValue::String(client_version.as_bytes().to_vec()),
    ));

    if table.auth_salt_opcode().is_none() {
        request.push_tag(Tag::new(
            tag::PASSWD_HASH,
            TagValue::Hash16(md5_hex(password.as_bytes())),
        ));
    }

    stream.write_all(&request.to_bytes()?)?;
    let response = Packet::read_from(stream)?;

    match response.opcode {
        op::AUTH_OK => Ok(()),
        op::AUTH_FAIL => Err(EcError::AuthFailed(auth_fail_reason(&response))),
        opcode if Some(opcode) == table.auth_salt_opcode() => {
            complete_salted_round(stream, table, password, &response)
        }
        // Any other opcode is treated the same as an explicit AUTH_FAIL: the
        // caller falls through to the next known protocol version rather
        // than aborting the whole handshake (`__init__.py`'s unconditional
        // `continue` on a non-matching response).
        other => Err(EcError::AuthFailed(format!(
            "unexpected opcode 0x{other:02x} during handshake"
        ))),
    }
}

fn complete_salted_round<S: std::io::Read + std::io::Write>(
    stream: &mut S,
    table: &CodeTable,
    password: &str,
    salt_response: &Packet,
) -> EcResult<()> {
    let salt_tag_name = table
        .passwd_salt_tag()
        .expect("complete_salted_round only called when the table has salted auth");

    let salt = salt_response
        .first_tag(salt_tag_name)
        .and_then(|t| t.value.as_u64())
        .ok_or_else(|| EcError::decoding("AUTH_SALT response missing PASSWD_SALT tag"))?;

    // The salt is hashed as the uppercase hex rendering of the u64, with no
    // leading zero padding and no "0x" prefix.
    let salt_hex = format!("{salt:X}");
    let s = md5_hex(salt_hex.as_bytes());
    let p = md5_hex(password.as_bytes());
    let h = md5_hex(format!("{p}{s}").as_bytes());

    let mut request = Packet::new(op::AUTH_PASSWD);
    request.push_tag(Tag::new(tag::PASSWD_HASH, TagValue::Hash16(h)));
    stream.write_all(&request.to_bytes()?)?;

    let response = Packet::read_from(stream)?;
    match response.opcode {
        op::AUTH_OK => Ok(()),
        op::AUTH_FAIL => Err(EcError::AuthFailed(auth_fail_reason(&response))),
        other => Err(EcError::AuthFailed(format!(
            "unexpected opcode 0x{other:02x} after salted password round"
        ))),
    }
}

fn auth_fail_reason(packet: &Packet) -> String {
    packet
        .first_tag(tag::STRING)
        .and_then(|t| t.value.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "no reason given".to_string())
}
