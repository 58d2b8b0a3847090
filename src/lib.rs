//! A synchronous client for aMule's External Connections (EC) protocol:
//! the framed, self-describing tag-tree wire format, the multi-version
//! authentication handshake, and a request/response facade over both.

pub mod client;
pub mod codec;
pub mod error;
pub mod protocol;

pub use client::Client;
pub use error::{EcError, EcResult};
