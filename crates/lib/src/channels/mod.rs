//! Communication channel boundary (the messaging transport).
//!
//! `ChannelPort` is the seam to the real chat-network engine: open a tenant
//! connection (yielding a stream of login/message events), send replies, and
//! manage the persisted login artifacts that let a tenant skip the QR step.

mod artifacts;
mod memory;
mod port;

pub use artifacts::LoginArtifacts;
pub use memory::MemoryChannel;
pub use port::{ChannelEvent, ChannelMessage, ChannelPort};
