//! Typed views over the tag trees returned by common EC responses.
//!
//! These are built with the two decoding patterns used throughout the
//! facade (`spec.md` §6, component C6): a *linear* decode, which reads a
//! fixed set of named top-level tags into struct fields, and a *list*
//! decode, which walks every top-level tag with a given name into one
//! record per occurrence, recursing into that tag's children for the
//! record's own fields.

use crate::codec::{Tag, TagValue};
use crate::protocol::codes::{tag, CodeTable};

/// Decoded `EC_OP_STATS` response (`get_server_status`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStatus {
    /// Read from `CONNSTATE`'s `CLIENT_ID` subtag, not a top-level tag
    /// (`__init__.py:261`'s `tag_map` nests it under `TAG_CONNSTATE`).
    pub client_id: Option<u32>,
    pub connstate: Option<u32>,
    pub ul_speed: Option<u32>,
    pub dl_speed: Option<u32>,
    pub ul_speed_limit: Option<u32>,
    pub dl_speed_limit: Option<u32>,
    pub ul_queue_len: Option<u32>,
    pub total_src_count: Option<u32>,
    pub ed2k_users: Option<u32>,
    pub kad_users: Option<u32>,
    pub ed2k_files: Option<u32>,
    pub kad_files: Option<u32>,
    pub kad_firewalled_udp: Option<u32>,
    pub kad_indexed_sources: Option<u32>,
    pub kad_indexed_keywords: Option<u32>,
    pub kad_indexed_notes: Option<u32>,
    pub kad_indexed_load: Option<u32>,
    pub kad_ip_address: Option<u32>,
    pub buddy_status: Option<u8>,
    pub buddy_ip: Option<u32>,
    pub buddy_port: Option<u16>,
}

impl ServerStatus {
    /// Linear decode: every field is a distinct, fixed top-level tag name,
    /// except `client_id`, which lives one level down under `CONNSTATE`.
    pub fn from_tags(tags: &[Tag]) -> Self {
        let find = |name: u16| tags.iter().find(|t| t.name == name);
        let connstate_tag = find(tag::CONNSTATE);
        ServerStatus {
            client_id: connstate_tag
                .and_then(|t| t.first_child(tag::CLIENT_ID))
                .and_then(|t| t.value.as_u32()),
            connstate: connstate_tag.and_then(|t| t.value.as_u32()),
            ul_speed: find(tag::STATS_UL_SPEED).and_then(|t| t.value.as_u32()),
            dl_speed: find(tag::STATS_DL_SPEED).and_then(|t| t.value.as_u32()),
            ul_speed_limit: find(tag::STATS_UL_SPEED_LIMIT).and_then(|t| t.value.as_u32()),
            dl_speed_limit: find(tag::STATS_DL_SPEED_LIMIT).and_then(|t| t.value.as_u32()),
            ul_queue_len: find(tag::STATS_UL_QUEUE_LEN).and_then(|t| t.value.as_u32()),
            total_src_count: find(tag::STATS_TOTAL_SRC_COUNT).and_then(|t| t.value.as_u32()),
            ed2k_users: find(tag::STATS_ED2K_USERS).and_then(|t| t.value.as_u32()),
            kad_users: find(tag::STATS_KAD_USERS).and_then(|t| t.value.as_u32()),
            ed2k_files: find(tag::STATS_ED2K_FILES).and_then(|t| t.value.as_u32()),
            kad_files: find(tag::STATS_KAD_FILES).and_then(|t| t.value.as_u32()),
            kad_firewalled_udp: find(tag::STATS_KAD_FIREWALLED_UDP).and_then(|t| t.value.as_u32()),
            kad_indexed_sources: find(tag::STATS_KAD_INDEXED_SOURCES).and_then(|t| t.value.as_u32()),
            kad_indexed_keywords: find(tag::STATS_KAD_INDEXED_KEYWORDS).and_then(|t| t.value.as_u32()),
            kad_indexed_notes: find(tag::STATS_KAD_INDEXED_NOTES).and_then(|t| t.value.as_u32()),
            kad_indexed_load: find(tag::STATS_KAD_INDEXED_LOAD).and_then(|t| t.value.as_u32()),
            kad_ip_address: find(tag::STATS_KAD_IP_ADDRESS).and_then(|t| t.value.as_u32()),
            buddy_status: find(tag::STATS_BUDDY_STATUS).and_then(|t| t.value.as_u8()),
            buddy_ip: find(tag::STATS_BUDDY_IP).and_then(|t| t.value.as_u32()),
            buddy_port: find(tag::STATS_BUDDY_PORT).and_then(|t| t.value.as_u16()),
        }
    }
}

/// One entry from a `EC_TAG_PARTFILE` list (download/upload/wait queues).
#[derive(Debug, Clone, PartialEq)]
pub struct PartFile {
    pub hash: String,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub size_xfer: Option<u64>,
    pub size_done: Option<u64>,
    pub speed: Option<u32>,
    pub status: Option<u8>,
    pub prio: Option<u8>,
    pub cat: Option<u32>,
    pub src_count: Option<u32>,
    pub src_count_a4af: Option<u32>,
    pub src_count_not_current: Option<u32>,
    pub src_count_xfer: Option<u32>,
    pub last_recv: Option<u32>,
    pub last_seen_comp: Option<u32>,
    pub partmetid: Option<u32>,
    pub ed2k_link: Option<String>,
    pub source_names: Vec<String>,
    /// Only populated for protocol >= 0x0203 (`CodeTable::has_extended_partfile_fields`).
    pub lost_corruption: Option<u64>,
    pub gained_compression: Option<u64>,
    pub saved_ich: Option<u64>,
    pub stopped: Option<u8>,
    pub download_active: Option<u8>,
}

impl PartFile {
    /// List decode: one `PartFile` per `EC_TAG_PARTFILE` tag, keyed by its
    /// own value (the file hash) with the rest of the fields carried as
    /// children. The five 0x0203-only fields are left `None` when `table`
    /// predates them, mirroring `CodeTable::has_extended_partfile_fields`.
    pub fn from_tag(t: &Tag, table: &CodeTable) -> Option<Self> {
        if t.name != tag::PARTFILE {
            return None;
        }
        let hash = t.value.as_hash16()?.to_string();
        let extended = table.has_extended_partfile_fields();
        Some(PartFile {
            hash,
            name: t
                .first_child(tag::PARTFILE_NAME)
                .and_then(|c| c.value.as_str())
                .map(str::to_string),
            size: t.first_child(tag::PARTFILE_SIZE_FULL).and_then(sized_value),
            size_xfer: t.first_child(tag::PARTFILE_SIZE_XFER).and_then(sized_value),
            size_done: t.first_child(tag::PARTFILE_SIZE_DONE).and_then(sized_value),
            speed: t.first_child(tag::PARTFILE_SPEED).and_then(|c| c.value.as_u32()),
            status: t.first_child(tag::PARTFILE_STATUS).and_then(|c| c.value.as_u8()),
            prio: t.first_child(tag::PARTFILE_PRIO).and_then(|c| c.value.as_u8()),
            cat: t.first_child(tag::PARTFILE_CAT).and_then(|c| c.value.as_u32()),
            src_count: t
                .first_child(tag::PARTFILE_SOURCE_COUNT)
                .and_then(|c| c.value.as_u32()),
            src_count_a4af: t
                .first_child(tag::PARTFILE_SOURCE_COUNT_A4AF)
                .and_then(|c| c.value.as_u32()),
            src_count_not_current: t
                .first_child(tag::PARTFILE_SOURCE_COUNT_NOT_CURRENT)
                .and_then(|c| c.value.as_u32()),
            src_count_xfer: t
                .first_child(tag::PARTFILE_SOURCE_COUNT_XFER)
                .and_then(|c| c.value.as_u32()),
            last_recv: t.first_child(tag::PARTFILE_LAST_RECV).and_then(|c| c.value.as_u32()),
            last_seen_comp: t
                .first_child(tag::PARTFILE_LAST_SEEN_COMP)
                .and_then(|c| c.value.as_u32()),
            partmetid: t
                .first_child(tag::PARTFILE_PARTMETID)
                .and_then(|c| c.value.as_u32()),
            ed2k_link: t
                .first_child(tag::PARTFILE_ED2K_LINK)
                .and_then(|c| c.value.as_str())
                .map(str::to_string),
            source_names: t
                .children_named(tag::PARTFILE_SOURCE_NAMES)
                .filter_map(|c| c.value.as_str())
                .map(str::to_string)
                .collect(),
            lost_corruption: extended
                .then(|| t.first_child(tag::PARTFILE_LOST_CORRUPTION))
                .flatten()
                .and_then(sized_value),
            gained_compression: extended
                .then(|| t.first_child(tag::PARTFILE_GAINED_COMPRESSION))
                .flatten()
                .and_then(sized_value),
            saved_ich: extended
                .then(|| t.first_child(tag::PARTFILE_SAVED_ICH))
                .flatten()
                .and_then(sized_value),
            stopped: extended
                .then(|| t.first_child(tag::PARTFILE_STOPPED))
                .flatten()
                .and_then(|c| c.value.as_u8()),
            download_active: extended
                .then(|| t.first_child(tag::PARTFILE_DOWNLOAD_ACTIVE))
                .flatten()
                .and_then(|c| c.value.as_u8()),
        })
    }

    pub fn list_from_tags(tags: &[Tag], table: &CodeTable) -> Vec<Self> {
        tags.iter()
            .filter_map(|t| PartFile::from_tag(t, table))
            .collect()
    }
}

/// aMule encodes file sizes as either U32 or U64 depending on magnitude;
/// accept either.
fn sized_value(t: &Tag) -> Option<u64> {
    match &t.value {
        TagValue::U32(v) => Some(*v as u64),
        TagValue::U64(v) => Some(*v),
        _ => None,
    }
}

/// One entry from a `EC_TAG_SEARCHFILE` list (`get_search_results`).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub hash: String,
    pub name: Option<String>,
    pub size: Option<u64>,
    pub src_count: Option<u32>,
    pub src_count_xfer: Option<u32>,
}

impl SearchResult {
    pub fn from_tag(t: &Tag) -> Option<Self> {
        if t.name != tag::SEARCHFILE {
            return None;
        }
        let hash = t.value.as_hash16()?.to_string();
        Some(SearchResult {
            hash,
            name: t
                .first_child(tag::PARTFILE_NAME)
                .and_then(|c| c.value.as_str())
                .map(str::to_string),
            size: t
                .first_child(tag::PARTFILE_SIZE_FULL)
                .and_then(sized_value),
            src_count: t
                .first_child(tag::PARTFILE_SOURCE_COUNT)
                .and_then(|c| c.value.as_u32()),
            src_count_xfer: t
                .first_child(tag::PARTFILE_SOURCE_COUNT_XFER)
                .and_then(|c| c.value.as_u32()),
        })
    }

    pub fn list_from_tags(tags: &[Tag]) -> Vec<Self> {
        tags.iter().filter_map(SearchResult::from_tag).collect()
    }
}

/// Parameters for `search_start` (`spec.md` §6.4).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub search_type: u8,
    pub name: String,
    pub min_size: Option<u32>,
    pub max_size: Option<u32>,
    pub file_type: Option<String>,
    pub extension: Option<String>,
    pub min_availability: Option<u32>,
}

impl SearchQuery {
    pub fn new(search_type: u8, name: impl Into<String>) -> Self {
        SearchQuery {
            search_type,
            name: name.into(),
            min_size: None,
            max_size: None,
            file_type: None,
            extension: None,
            min_availability: None,
        }
    }
}

/// Result of `search_start`: the daemon does not report a definite
/// "search accepted" signal, only an optional explanatory message
/// (`__init__.py`'s `search_start`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStartResult {
    pub ok: bool,
    pub message: Option<String>,
}
