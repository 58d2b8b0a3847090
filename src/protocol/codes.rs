//! Version-parameterized code tables (component C1).
//!
//! The EC protocol is identified by a 16-bit version; most opcodes and tag
//! IDs have a stable numeric value across the versions this crate knows
//! about, but some only exist from protocol 0x0203 onward. Rather than
//! scattering `if version >= 0x0203` checks through the client facade, a
//! [`CodeTable`] is built once per negotiated version and the
//! version-gated members are exposed as `Option`s computed at construction
//! time (`spec.md` §9 design note).

use crate::error::{EcError, EcResult};

/// Protocol versions this client knows how to speak, in the order the
/// handshake engine tries them.
pub const KNOWN_VERSIONS: [u16; 2] = [0x0200, 0x0203];

/// The version at which salted-challenge authentication, per-tag extensions,
/// and the extra stats/partfile/client fields were introduced.
pub const SALTED_AUTH_VERSION: u16 = 0x0203;

/// Packet flags (`spec.md` §3.3); not version-dependent.
pub mod flag {
    pub const BLANK: u8 = 0x20;
    pub const ZLIB: u8 = 0x01;
    pub const UTF8_NUMBERS: u8 = 0x02;
    pub const HAS_ID: u8 = 0x04;
    pub const ACCEPTS: u8 = 0x10;
    pub const EXTENSION: u8 = 0x80;
}

/// Detail levels (`spec.md` §6.3).
pub mod detail {
    pub const CMD: u8 = 0x00;
    pub const WEB: u8 = 0x01;
    pub const FULL: u8 = 0x02;
    pub const UPDATE: u8 = 0x03;
    pub const INC_UPDATE: u8 = 0x04;
}

/// Partfile statuses (`EC_PS_*` in the original implementation).
pub mod partfile_status {
    pub const READY: u8 = 0;
    pub const EMPTY: u8 = 1;
    pub const WAITING_FOR_HASH: u8 = 2;
    pub const HASHING: u8 = 3;
    pub const ERROR: u8 = 4;
    pub const INSUFFICIENT: u8 = 5;
    pub const UNKNOWN: u8 = 6;
    pub const PAUSED: u8 = 7;
    pub const COMPLETING: u8 = 8;
    pub const COMPLETE: u8 = 9;
    pub const ALLOCATING: u8 = 10;
}

/// Partfile priorities (`EC_PR_*`).
pub mod partfile_priority {
    pub const VERY_LOW: u8 = 4;
    pub const LOW: u8 = 0;
    pub const NORMAL: u8 = 1;
    pub const HIGH: u8 = 2;
    pub const VERY_HIGH: u8 = 3;
    pub const AUTO: u8 = 5;
    pub const POWERSHARE: u8 = 6;
}

/// Opcodes present in every known protocol version.
pub mod op {
    pub const NOOP: u8 = 0x01;
    pub const AUTH_REQ: u8 = 0x02;
    pub const AUTH_FAIL: u8 = 0x03;
    pub const AUTH_OK: u8 = 0x04;
    pub const FAILED: u8 = 0x05;
    pub const STRINGS: u8 = 0x06;
    pub const MISC_DATA: u8 = 0x07;
    pub const SHUTDOWN: u8 = 0x08;
    pub const ADD_LINK: u8 = 0x09;
    pub const STAT_REQ: u8 = 0x0A;
    pub const GET_CONNSTATE: u8 = 0x0B;
    pub const STATS: u8 = 0x0C;
    pub const GET_DLOAD_QUEUE: u8 = 0x0D;
    pub const GET_ULOAD_QUEUE: u8 = 0x0E;
    pub const GET_WAIT_QUEUE: u8 = 0x0F;
    pub const GET_SHARED_FILES: u8 = 0x10;
    pub const SHARED_SET_PRIO: u8 = 0x11;
    pub const PARTFILE_REMOVE_NO_NEEDED: u8 = 0x12;
    pub const PARTFILE_REMOVE_FULL_QUEUE: u8 = 0x13;
    pub const PARTFILE_REMOVE_HIGH_QUEUE: u8 = 0x14;
    pub const PARTFILE_CLEANUP_SOURCES: u8 = 0x15;
    pub const PARTFILE_SWAP_A4AF_THIS: u8 = 0x16;
    pub const PARTFILE_SWAP_A4AF_THIS_AUTO: u8 = 0x17;
    pub const PARTFILE_SWAP_A4AF_OTHERS: u8 = 0x18;
    pub const PARTFILE_PAUSE: u8 = 0x19;
    pub const PARTFILE_RESUME: u8 = 0x1A;
    pub const PARTFILE_STOP: u8 = 0x1B;
    pub const PARTFILE_PRIO_SET: u8 = 0x1C;
    pub const PARTFILE_DELETE: u8 = 0x1D;
    pub const PARTFILE_SET_CAT: u8 = 0x1E;
    pub const DLOAD_QUEUE: u8 = 0x1F;
    pub const ULOAD_QUEUE: u8 = 0x20;
    pub const WAIT_QUEUE: u8 = 0x21;
    pub const SHARED_FILES: u8 = 0x22;
    pub const SHAREDFILES_RELOAD: u8 = 0x23;
    pub const SHAREDFILES_ADD_DIRECTORY: u8 = 0x24;
    pub const RENAME_FILE: u8 = 0x25;
    pub const SEARCH_START: u8 = 0x26;
    pub const SEARCH_STOP: u8 = 0x27;
    pub const SEARCH_RESULTS: u8 = 0x28;
    pub const SEARCH_PROGRESS: u8 = 0x29;
    pub const DOWNLOAD_SEARCH_RESULT: u8 = 0x2A;
    pub const IPFILTER_RELOAD: u8 = 0x2B;
    pub const GET_SERVER_LIST: u8 = 0x2C;
    pub const SERVER_LIST: u8 = 0x2D;
    pub const SERVER_DISCONNECT: u8 = 0x2E;
    pub const SERVER_CONNECT: u8 = 0x2F;
    pub const SERVER_REMOVE: u8 = 0x30;
    pub const SERVER_ADD: u8 = 0x31;
    pub const SERVER_UPDATE_FROM_URL: u8 = 0x32;
    pub const ADDLOGLINE: u8 = 0x33;
    pub const ADDDEBUGLOGLINE: u8 = 0x34;
    pub const GET_LOG: u8 = 0x35;
    pub const GET_DEBUGLOG: u8 = 0x36;
    pub const GET_SERVERINFO: u8 = 0x37;
    pub const LOG: u8 = 0x38;
    pub const DEBUGLOG: u8 = 0x39;
    pub const SERVERINFO: u8 = 0x3A;
    pub const RESET_LOG: u8 = 0x3B;
    pub const RESET_DEBUGLOG: u8 = 0x3C;
    pub const CLEAR_SERVERINFO: u8 = 0x3D;
    pub const GET_LAST_LOG_ENTRY: u8 = 0x3E;
    pub const GET_PREFERENCES: u8 = 0x3F;
    pub const SET_PREFERENCES: u8 = 0x40;
    pub const CREATE_CATEGORY: u8 = 0x41;
    pub const UPDATE_CATEGORY: u8 = 0x42;
    pub const DELETE_CATEGORY: u8 = 0x43;
    pub const GET_STATSGRAPHS: u8 = 0x44;
    pub const STATSGRAPHS: u8 = 0x45;
    pub const GET_STATSTREE: u8 = 0x46;
    pub const STATSTREE: u8 = 0x47;
    pub const KAD_START: u8 = 0x48;
    pub const KAD_STOP: u8 = 0x49;
    pub const CONNECT: u8 = 0x4A;
    pub const DISCONNECT: u8 = 0x4B;
    pub const GET_DLOAD_QUEUE_DETAIL: u8 = 0x4C;
    pub const KAD_UPDATE_FROM_URL: u8 = 0x4D;
    pub const KAD_BOOTSTRAP_FROM_IP: u8 = 0x4E;
    /// Only sent/accepted from protocol 0x0203 onward.
    pub const AUTH_SALT: u8 = 0x4F;
    /// Only sent/accepted from protocol 0x0203 onward.
    pub const AUTH_PASSWD: u8 = 0x50;
}

/// Tag names present in every known protocol version, plus the 0x0203
/// additions (each documented with the version it requires).
pub mod tag {
    pub const STRING: u16 = 0x0000;
    pub const PASSWD_HASH: u16 = 0x0001;
    pub const PROTOCOL_VERSION: u16 = 0x0002;
    pub const VERSION_ID: u16 = 0x0003;
    pub const DETAIL_LEVEL: u16 = 0x0004;
    pub const CONNSTATE: u16 = 0x0005;
    pub const ED2K_ID: u16 = 0x0006;
    pub const LOG_TO_STATUS: u16 = 0x0007;
    pub const BOOTSTRAP_IP: u16 = 0x0008;
    pub const BOOTSTRAP_PORT: u16 = 0x0009;
    pub const CLIENT_ID: u16 = 0x000A;
    /// Requires protocol >= 0x0203.
    pub const PASSWD_SALT: u16 = 0x000B;

    pub const CLIENT_NAME: u16 = 0x0100;
    pub const CLIENT_VERSION: u16 = 0x0101;
    pub const CLIENT_MOD: u16 = 0x0102;

    pub const STATS_UL_SPEED: u16 = 0x0200;
    pub const STATS_DL_SPEED: u16 = 0x0201;
    pub const STATS_UL_SPEED_LIMIT: u16 = 0x0202;
    pub const STATS_DL_SPEED_LIMIT: u16 = 0x0203;
    pub const STATS_UP_OVERHEAD: u16 = 0x0204;
    pub const STATS_DOWN_OVERHEAD: u16 = 0x0205;
    pub const STATS_TOTAL_SRC_COUNT: u16 = 0x0206;
    pub const STATS_BANNED_COUNT: u16 = 0x0207;
    pub const STATS_UL_QUEUE_LEN: u16 = 0x0208;
    pub const STATS_ED2K_USERS: u16 = 0x0209;
    pub const STATS_KAD_USERS: u16 = 0x020A;
    pub const STATS_ED2K_FILES: u16 = 0x020B;
    pub const STATS_KAD_FILES: u16 = 0x020C;
    /// Requires protocol >= 0x0203.
    pub const STATS_LOGGER_MESSAGE: u16 = 0x020D;
    pub const STATS_KAD_FIREWALLED_UDP: u16 = 0x020E;
    pub const STATS_KAD_INDEXED_SOURCES: u16 = 0x020F;
    pub const STATS_KAD_INDEXED_KEYWORDS: u16 = 0x0210;
    pub const STATS_KAD_INDEXED_NOTES: u16 = 0x0211;
    pub const STATS_KAD_INDEXED_LOAD: u16 = 0x0212;
    pub const STATS_KAD_IP_ADDRESS: u16 = 0x0213;
    pub const STATS_BUDDY_STATUS: u16 = 0x0214;
    pub const STATS_BUDDY_IP: u16 = 0x0215;
    pub const STATS_BUDDY_PORT: u16 = 0x0216;

    pub const PARTFILE: u16 = 0x0300;
    pub const PARTFILE_NAME: u16 = 0x0301;
    pub const PARTFILE_PARTMETID: u16 = 0x0302;
    pub const PARTFILE_SIZE_FULL: u16 = 0x0303;
    pub const PARTFILE_SIZE_XFER: u16 = 0x0304;
    pub const PARTFILE_SIZE_XFER_UP: u16 = 0x0305;
    pub const PARTFILE_SIZE_DONE: u16 = 0x0306;
    pub const PARTFILE_SPEED: u16 = 0x0307;
    pub const PARTFILE_STATUS: u16 = 0x0308;
    pub const PARTFILE_PRIO: u16 = 0x0309;
    pub const PARTFILE_SOURCE_COUNT: u16 = 0x030A;
    pub const PARTFILE_SOURCE_COUNT_A4AF: u16 = 0x030B;
    pub const PARTFILE_SOURCE_COUNT_NOT_CURRENT: u16 = 0x030C;
    pub const PARTFILE_SOURCE_COUNT_XFER: u16 = 0x030D;
    pub const PARTFILE_ED2K_LINK: u16 = 0x030E;
    pub const PARTFILE_CAT: u16 = 0x030F;
    pub const PARTFILE_LAST_RECV: u16 = 0x0310;
    pub const PARTFILE_LAST_SEEN_COMP: u16 = 0x0311;
    pub const PARTFILE_PART_STATUS: u16 = 0x0312;
    pub const PARTFILE_GAP_STATUS: u16 = 0x0313;
    pub const PARTFILE_REQ_STATUS: u16 = 0x0314;
    pub const PARTFILE_SOURCE_NAMES: u16 = 0x0315;
    pub const PARTFILE_COMMENTS: u16 = 0x0316;
    /// Requires protocol >= 0x0203.
    pub const PARTFILE_STOPPED: u16 = 0x0317;
    pub const PARTFILE_DOWNLOAD_ACTIVE: u16 = 0x0318;
    pub const PARTFILE_LOST_CORRUPTION: u16 = 0x0319;
    pub const PARTFILE_GAINED_COMPRESSION: u16 = 0x031A;
    pub const PARTFILE_SAVED_ICH: u16 = 0x031B;

    pub const SERVER_VERSION: u16 = 0x050B;
    pub const CATEGORY: u16 = 0x1101;

    pub const SEARCHFILE: u16 = 0x0700;
    pub const SEARCH_TYPE: u16 = 0x0701;
    pub const SEARCH_NAME: u16 = 0x0702;
    pub const SEARCH_MIN_SIZE: u16 = 0x0703;
    pub const SEARCH_MAX_SIZE: u16 = 0x0704;
    pub const SEARCH_FILE_TYPE: u16 = 0x0705;
    pub const SEARCH_EXTENSION: u16 = 0x0706;
    pub const SEARCH_AVAILABILITY: u16 = 0x0707;
    pub const SEARCH_STATUS: u16 = 0x0708;
}

/// A code table bound to one negotiated protocol version.
///
/// Most opcode/tag values are stable across versions; what differs is
/// whether a given opcode or tag is valid to send/expect at all. The table
/// exposes version-gated members as `Option`, computed once at
/// construction, so call sites never repeat a version check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeTable {
    pub version: u16,
}

impl CodeTable {
    pub fn for_version(version: u16) -> EcResult<Self> {
        if !KNOWN_VERSIONS.contains(&version) {
            return Err(EcError::Version(version));
        }
        Ok(CodeTable { version })
    }

    fn salted_auth(&self) -> bool {
        self.version >= SALTED_AUTH_VERSION
    }

    /// `Some(AUTH_SALT)` from protocol 0x0203 onward, `None` otherwise.
    pub fn auth_salt_opcode(&self) -> Option<u8> {
        self.salted_auth().then_some(op::AUTH_SALT)
    }

    /// `Some(AUTH_PASSWD)` from protocol 0x0203 onward, `None` otherwise.
    pub fn auth_passwd_opcode(&self) -> Option<u8> {
        self.salted_auth().then_some(op::AUTH_PASSWD)
    }

    /// `Some(PASSWD_SALT)` from protocol 0x0203 onward, `None` otherwise.
    pub fn passwd_salt_tag(&self) -> Option<u16> {
        self.salted_auth().then_some(tag::PASSWD_SALT)
    }

    /// Extra partfile fields introduced in protocol 0x0203.
    pub fn has_extended_partfile_fields(&self) -> bool {
        self.salted_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_version() {
        assert!(CodeTable::for_version(0x0105).is_err());
    }

    #[test]
    fn legacy_version_has_no_salted_auth() {
        let table = CodeTable::for_version(0x0200).unwrap();
        assert_eq!(table.auth_salt_opcode(), None);
        assert_eq!(table.auth_passwd_opcode(), None);
        assert_eq!(table.passwd_salt_tag(), None);
        assert!(!table.has_extended_partfile_fields());
    }

    #[test]
    fn current_version_has_salted_auth() {
        let table = CodeTable::for_version(0x0203).unwrap();
        assert_eq!(table.auth_salt_opcode(), Some(op::AUTH_SALT));
        assert_eq!(table.auth_passwd_opcode(), Some(op::AUTH_PASSWD));
        assert_eq!(table.passwd_salt_tag(), Some(tag::PASSWD_SALT));
        assert!(table.has_extended_partfile_fields());
    }
}
