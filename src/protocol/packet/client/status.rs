use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    Request(Request),
    #[encoding(id = 0x01)]
    Ping(Ping),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Request;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Ping {
    pub payload: i64,
}
