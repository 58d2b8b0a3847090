//! Protocol-level concerns that sit above the wire codec: version-parameterized
//! code tables and the authentication handshake.

pub mod codes;
pub mod handshake;

pub use codes::CodeTable;
