//! TCP connection lifecycle for the EC client.
//!
//! The Python original represents "not connected" with a sentinel object
//! that raises `AttributeError` the moment any method is called on it. This
//! port makes that state explicit instead (`spec.md` §9 design note): every
//! operation that needs a live socket goes through [`Connection::send`],
//! which returns a typed [`EcError::Connection`] rather than panicking.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};

use crate::codec::Packet;
use crate::error::{EcError, EcResult};
use crate::protocol::codes::CodeTable;
use crate::protocol::handshake;

enum State {
    Disconnected,
    Connected { stream: TcpStream, table: CodeTable },
}

/// A single logical connection to an amuled EC listener.
///
/// Holds at most one TCP socket and speaks exactly one request/response
/// packet at a time; the EC protocol has no server-initiated push, so there
/// is nothing to multiplex.
pub struct Connection {
    state: State,
    dump_packets: bool,
}

impl Connection {
    pub fn new() -> Self {
        Connection {
            state: State::Disconnected,
            dump_packets: false,
        }
    }

    /// When enabled, every request and response packet is printed via
    /// [`Packet::describe`]/[`Tag::describe`] as it crosses the wire — the
    /// CLI's `--dump-packets` flag (`SPEC_FULL.md` §4.9).
    pub fn set_dump_packets(&mut self, enabled: bool) {
        self.dump_packets = enabled;
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected { .. })
    }

    /// The protocol version negotiated during the last successful
    /// [`connect`](Self::connect), if currently connected.
    pub fn code_table(&self) -> EcResult<&CodeTable> {
        match &self.state {
            State::Connected { table, .. } => Ok(table),
            State::Disconnected => Err(EcError::connection("not connected")),
        }
    }

    /// Resolve `addr`, try each candidate address in order, and authenticate
    /// over the first one that accepts a TCP connection. A connection
    /// refusal tries the next address; an authentication failure does not,
    /// since every address is the same daemon.
    pub fn connect<A: ToSocketAddrs>(
        &mut self,
        addr: A,
        password: &str,
        client_name: &str,
        client_version: &str,
    ) -> EcResult<()> {
        if self.is_connected() {
            return Err(EcError::connection("already connected"));
        }
        let mut last_io_err = None;
        for sock_addr in addr.to_socket_addrs()? {
            match TcpStream::connect(sock_addr) {
                Ok(mut stream) => {
                    stream.set_nodelay(true).ok();
                    log::info!("connected to {sock_addr}, starting handshake");
                    let table =
                        handshake::authenticate(&mut stream, password, client_name, client_version)?;
                    log::info!("authenticated, negotiated protocol 0x{:04x}", table.version);
                    self.state = State::Connected { stream, table };
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("connect to {sock_addr} failed: {e}");
                    last_io_err = Some(e);
                }
            }
        }
        Err(last_io_err.map(EcError::from).unwrap_or_else(|| {
            EcError::connection("address resolved to no candidates")
        }))
    }

    pub fn disconnect(&mut self) {
        if self.is_connected() {
            log::info!("disconnecting");
        }
        self.state = State::Disconnected;
    }

    /// Send a request and read back exactly one response packet. There is
    /// never more than one request in flight on a `Connection`.
    pub fn send(&mut self, packet: &Packet) -> EcResult<Packet> {
        if self.dump_packets {
            println!("--> {}", packet.describe());
            for tag in &packet.tags {
                println!("    {}", tag.describe());
            }
        }
        match &mut self.state {
            State::Connected { stream, .. } => {
                stream.write_all(&packet.to_bytes()?)?;
                let response = Packet::read_from(stream)?;
                if self.dump_packets {
                    println!("<-- {}", response.describe());
                    for tag in &response.tags {
                        println!("    {}", tag.describe());
                    }
                }
                Ok(response)
            }
            State::Disconnected => Err(EcError::connection(
                "cannot send a request while disconnected",
            )),
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_while_disconnected_is_a_connection_error() {
        let mut conn = Connection::new();
        let packet = Packet::new(0x01);
        let err = conn.send(&packet).unwrap_err();
        assert!(matches!(err, EcError::Connection(_)));
    }

    #[test]
    fn code_table_while_disconnected_is_a_connection_error() {
        let conn = Connection::new();
        assert!(conn.code_table().is_err());
    }

    #[test]
    fn fresh_connection_reports_not_connected() {
        assert!(!Connection::new().is_connected());
    }
}
