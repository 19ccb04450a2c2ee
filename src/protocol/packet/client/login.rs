use minecraft_session_proxy_macros::{Decode, Encode};

#[derive(Debug, Clone, Encode, Decode, strum::AsRefStr)]
#[encoding(discriminant = "varint")]
pub enum Packet {
    #[encoding(id = 0x00)]
    LoginStart(LoginStart),
    #[encoding(id = 0x01)]
    EncryptionResponse(EncryptionResponse),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct LoginStart {
    pub username: String,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct EncryptionResponse {
    /// Shared secret, RSA-encrypted with the server's public key.
    #[encoding(length_prefix = "varint")]
    pub shared_secret: Vec<u8>,
    /// Verify token, RSA-encrypted with the server's public key.
    #[encoding(length_prefix = "varint")]
    pub verify_token: Vec<u8>,
}
