use crate::protocol::chat::ChatComponent;
use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    Disconnect(Disconnect),
    #[encoding(id = 0x01)]
    EncryptionRequest(EncryptionRequest),
    #[encoding(id = 0x02)]
    LoginSuccess(LoginSuccess),
    #[encoding(id = 0x03)]
    SetCompression(SetCompression),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Disconnect {
    pub reason: ChatComponent,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EncryptionRequest {
    pub server_id: String,
    /// DER-encoded RSA public key.
    #[encoding(length_prefix = "varint")]
    pub public_key: Vec<u8>,
    #[encoding(length_prefix = "varint")]
    pub verify_token: Vec<u8>,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginSuccess {
    /// Hyphenated or bare 32-hex UUID.
    pub uuid: String,
    pub username: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SetCompression {
    #[encoding(varint)]
    pub threshold: i32,
}
