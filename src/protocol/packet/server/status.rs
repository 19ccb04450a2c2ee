use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    Response(Response),
    #[encoding(id = 0x01)]
    Pong(Pong),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Response {
    /// JSON status object.
    pub response: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Pong {
    pub payload: i64,
}
