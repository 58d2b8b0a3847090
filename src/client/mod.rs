//! The synchronous client facade (component C6).
//!
//! [`Client`] is the surface most callers use: it owns one
//! [`Connection`](connection::Connection) and turns each EC command into a
//! request packet plus a typed decode of the response, using the linear and
//! list decoders in [`types`].

pub mod connection;
pub mod types;

use crate::codec::{Packet, Tag, TagValue};
use crate::error::{EcError, EcResult};
use crate::protocol::codes::{detail, op, tag};

use connection::Connection;
pub use types::{PartFile, SearchQuery, SearchResult, SearchStartResult, ServerStatus};

/// Synchronous amule EC client. One request is ever in flight.
pub struct Client {
    conn: Connection,
    client_name: String,
    client_version: String,
}

impl Client {
    pub fn new(client_name: impl Into<String>, client_version: impl Into<String>) -> Self {
        Client {
            conn: Connection::new(),
            client_name: client_name.into(),
            client_version: client_version.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Print every request/response packet as it crosses the wire
    /// (`SPEC_FULL.md` §4.9, the CLI's `--dump-packets` flag).
    pub fn set_dump_packets(&mut self, enabled: bool) {
        self.conn.set_dump_packets(enabled);
    }

    pub fn connect<A: std::net::ToSocketAddrs>(&mut self, addr: A, password: &str) -> EcResult<()> {
        self.conn
            .connect(addr, password, &self.client_name, &self.client_version)
    }

    pub fn disconnect(&mut self) {
        self.conn.disconnect();
    }

    /// Raise `EC_OP_FAILED` responses as errors; every other opcode passes
    /// through unchanged. Centralizes the one failure mode every request
    /// can hit regardless of what it asked for.
    fn request(&mut self, packet: Packet) -> EcResult<Packet> {
        let response = self.conn.send(&packet)?;
        if response.opcode == op::FAILED {
            let reason = response
                .first_tag(tag::STRING)
                .and_then(|t| t.value.as_str())
                .unwrap_or("no reason given")
                .to_string();
            return Err(EcError::RequestFailed(reason));
        }
        Ok(response)
    }

    pub fn get_server_status(&mut self) -> EcResult<ServerStatus> {
        let mut request = Packet::new(op::STAT_REQ);
        request.push_tag(Tag::new(tag::DETAIL_LEVEL, TagValue::U8(detail::CMD)));
        let response = self.request(request)?;
        Ok(ServerStatus::from_tags(&response.tags))
    }

    /// Start a search. The daemon's response carries no generic
    /// success/failure opcode for this command; instead `ok` mirrors
    /// whether the response opcode was `EC_OP_FAILED` and `message` carries
    /// whatever explanatory string tag came with it (`__init__.py`'s
    /// `search_start`, via `_linear_decoder(resp, [OP_FAILED], ...)`). This
    /// response is read directly rather than through [`Client::request`],
    /// since `OP_FAILED` here is the decoder's own signal, not a hard error.
    pub fn search_start(&mut self, query: &SearchQuery) -> EcResult<SearchStartResult> {
        let mut children = vec![Tag::new(
            tag::SEARCH_NAME,
            TagValue::String(query.name.as_bytes().to_vec()),
        )];
        if let Some(min) = query.min_size {
            children.push(Tag::new(tag::SEARCH_MIN_SIZE, TagValue::U32(min)));
        }
        if let Some(max) = query.max_size {
            children.push(Tag::new(tag::SEARCH_MAX_SIZE, TagValue::U32(max)));
        }
        children.push(Tag::new(
            tag::SEARCH_FILE_TYPE,
            TagValue::String(query.file_type.clone().unwrap_or_default().into_bytes()),
        ));
        if let Some(ext) = &query.extension {
            children.push(Tag::new(
                tag::SEARCH_EXTENSION,
                TagValue::String(ext.as_bytes().to_vec()),
            ));
        }
        if let Some(avail) = query.min_availability {
            children.push(Tag::new(tag::SEARCH_AVAILABILITY, TagValue::U32(avail)));
        }

        let mut request = Packet::new(op::SEARCH_START);
        request.set_flag(crate::codec::packet::FLAG_UTF8_NUMBERS);
        request.push_tag(Tag::with_children(
            tag::SEARCH_TYPE,
            TagValue::U8(query.search_type),
            children,
        ));

        let response = self.conn.send(&request)?;
        Ok(SearchStartResult {
            ok: response.opcode == op::FAILED,
            message: response
                .first_tag(tag::STRING)
                .and_then(|t| t.value.as_str())
                .map(str::to_string),
        })
    }

    pub fn search_stop(&mut self) -> EcResult<()> {
        self.request(Packet::new(op::SEARCH_STOP))?;
        Ok(())
    }

    /// Percentage complete of the running search (0-100). aMule returns this
    /// as the value of the `SEARCH_STATUS` tag; always 0 for Kad searches.
    pub fn get_search_progress(&mut self) -> EcResult<u8> {
        let response = self.request(Packet::new(op::SEARCH_PROGRESS))?;
        response
            .first_tag(tag::SEARCH_STATUS)
            .and_then(|t| t.value.as_u8())
            .ok_or_else(|| EcError::decoding("SEARCH_PROGRESS response carried no SEARCH_STATUS tag"))
    }

    /// `update`: when true, the daemon only fills in new/changed results
    /// since the last fetch (`DETAIL_INC_UPDATE`); all hashes are still
    /// present in the response either way.
    pub fn get_search_results(&mut self, update: bool) -> EcResult<Vec<SearchResult>> {
        let mut request = Packet::new(op::SEARCH_RESULTS);
        if update {
            request.push_tag(Tag::new(tag::DETAIL_LEVEL, TagValue::U8(detail::INC_UPDATE)));
        }
        let response = self.request(request)?;
        Ok(SearchResult::list_from_tags(&response.tags))
    }

    /// The daemon never acknowledges this request either way; the return
    /// value is always `true` (`__init__.py`'s comment: "aMule response does
    /// not indicate success or failure (yet?)").
    pub fn download_search_results(&mut self, hashes: &[String], category: u8) -> EcResult<bool> {
        let mut request = Packet::new(op::DOWNLOAD_SEARCH_RESULT);
        for hash in hashes {
            request.push_tag(Tag::with_children(
                tag::SEARCHFILE,
                TagValue::Hash16(hash.clone()),
                vec![Tag::new(tag::CATEGORY, TagValue::U8(category))],
            ));
        }
        self.request(request)?;
        Ok(true)
    }

    pub fn download_ed2klinks(&mut self, links: &[String], category: u8) -> EcResult<bool> {
        let mut request = Packet::new(op::ADD_LINK);
        for link in links {
            request.push_tag(Tag::with_children(
                tag::STRING,
                TagValue::String(link.as_bytes().to_vec()),
                vec![Tag::new(tag::CATEGORY, TagValue::U8(category))],
            ));
        }
        let response = self.request(request)?;
        Ok(response.opcode == op::NOOP)
    }

    /// `detail`: use the `EC_OP_GET_DLOAD_QUEUE_DETAIL` opcode with full
    /// detail level. `update` (ignored when `detail` is set): only request
    /// changed fields since the last fetch.
    pub fn get_download_list(&mut self, detail_full: bool, update: bool) -> EcResult<Vec<PartFile>> {
        let mut request = if detail_full {
            let mut p = Packet::new(op::GET_DLOAD_QUEUE_DETAIL);
            p.push_tag(Tag::new(tag::DETAIL_LEVEL, TagValue::U8(detail::FULL)));
            p
        } else {
            Packet::new(op::GET_DLOAD_QUEUE)
        };
        if !detail_full && update {
            request.push_tag(Tag::new(tag::DETAIL_LEVEL, TagValue::U8(detail::INC_UPDATE)));
        }
        let response = self.request(request)?;
        let table = self.conn.code_table()?;
        Ok(PartFile::list_from_tags(&response.tags, table))
    }

    /// One packet, one `PARTFILE` tag per hash, an optional extra subtag
    /// (priority, category) on each. Success is `resp.opcode == OP_NOOP`
    /// (`__init__.py`'s `_partfile_cmd`).
    fn partfile_cmd(&mut self, opcode: u8, hashes: &[String], arg: Option<Tag>) -> EcResult<bool> {
        let mut request = Packet::new(opcode);
        for hash in hashes {
            let children = arg.clone().into_iter().collect();
            request.push_tag(Tag::with_children(
                tag::PARTFILE,
                TagValue::Hash16(hash.clone()),
                children,
            ));
        }
        let response = self.request(request)?;
        Ok(response.opcode == op::NOOP)
    }

    pub fn partfile_remove_noneed(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_REMOVE_NO_NEEDED, hashes, None)
    }

    pub fn partfile_remove_fullqueue(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_REMOVE_FULL_QUEUE, hashes, None)
    }

    pub fn partfile_remove_highqueue(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_REMOVE_HIGH_QUEUE, hashes, None)
    }

    pub fn partfile_cleanup_sources(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_CLEANUP_SOURCES, hashes, None)
    }

    pub fn partfile_swap_a4af_this(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_SWAP_A4AF_THIS, hashes, None)
    }

    pub fn partfile_swap_a4af_this_auto(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_SWAP_A4AF_THIS_AUTO, hashes, None)
    }

    pub fn partfile_swap_a4af_others(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_SWAP_A4AF_OTHERS, hashes, None)
    }

    pub fn partfile_pause(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_PAUSE, hashes, None)
    }

    pub fn partfile_resume(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_RESUME, hashes, None)
    }

    pub fn partfile_stop(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_STOP, hashes, None)
    }

    pub fn partfile_delete(&mut self, hashes: &[String]) -> EcResult<bool> {
        self.partfile_cmd(op::PARTFILE_DELETE, hashes, None)
    }

    pub fn partfile_set_priority(&mut self, hashes: &[String], prio: u8) -> EcResult<bool> {
        let arg = Tag::new(tag::PARTFILE_PRIO, TagValue::U8(prio));
        self.partfile_cmd(op::PARTFILE_PRIO_SET, hashes, Some(arg))
    }

    pub fn partfile_set_cat(&mut self, hashes: &[String], cat: u8) -> EcResult<bool> {
        let arg = Tag::new(tag::PARTFILE_CAT, TagValue::U8(cat));
        self.partfile_cmd(op::PARTFILE_SET_CAT, hashes, Some(arg))
    }
}
