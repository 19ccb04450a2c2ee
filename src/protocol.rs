//! Implements the Minecraft protocol, revision 340 only.

pub const PROTOCOL_VERSION: i32 = 340; // 1.12.2
pub const GAME_VERSION: &str = "1.12.2";

pub mod chat;
pub mod decoder;
pub mod encoder;
pub mod metadata;
pub mod nbt;
pub mod packet;
pub mod slot;
pub mod vanilla_codec;

pub use decoder::{Decode, DecodeError, Decoder};
pub use encoder::{var_int_size, Encode, Encoder};

/// Limit to avoid out-of-memory DOS.
const BUFFER_LIMIT: usize = 1024 * 1024; // 1 MiB
