//! The self-describing EC wire format: variable-width integers, the
//! recursive tag tree, and the packet frame that carries them.

pub mod packet;
pub mod tag;
pub mod varint;

pub use packet::Packet;
pub use tag::{Tag, TagType, TagValue};
