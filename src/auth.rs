//! Remote session authentication for the upstream leg, plus the token
//! refresh boundary owned by the external control plane.

use crate::profile::Profile;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::{future::Future, pin::Pin, sync::Arc};

const SESSION_JOIN_URL: &str = "https://sessionserver.mojang.com/session/minecraft/join";

/// Callback into the external layer that refreshes a profile's access
/// token before a connect attempt. Returns whether the token is usable.
pub type TokenRefresher =
    Arc<dyn Fn(Profile) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// A refresher that accepts every token as-is.
pub fn no_refresh() -> TokenRefresher {
    Arc::new(|_| Box::pin(async { true }))
}

/// Proves ownership of the account to the session service so the
/// upstream server's `hasJoined` check passes.
pub async fn join_session(
    access_token: &str,
    profile_id: &str,
    server_hash: &str,
) -> anyhow::Result<()> {
    let response = reqwest::Client::new()
        .post(SESSION_JOIN_URL)
        .json(&json!({
            "accessToken": access_token,
            "selectedProfile": profile_id,
            "serverId": server_hash,
        }))
        .send()
        .await?;
    if !response.status().is_success() {
        anyhow::bail!("session join rejected with status {}", response.status());
    }
    Ok(())
}

/// The server-id hash: SHA-1 over server id, shared secret and public
/// key, rendered as signed two's-complement hex the way the Java
/// edition does.
pub fn server_hash(server_id: &str, shared_secret: &[u8], public_key: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(shared_secret);
    hasher.update(public_key);
    let digest = hasher.finalize();
    two_complement_hex(&digest)
}

fn two_complement_hex(digest: &[u8]) -> String {
    let negative = digest[0] & 0x80 != 0;
    let mut bytes = digest.to_vec();
    if negative {
        // negate: invert and add one
        let mut carry = true;
        for byte in bytes.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (sum, overflow) = byte.overflowing_add(1);
                *byte = sum;
                carry = overflow;
            }
        }
    }
    let mut hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    while hex.len() > 1 && hex.starts_with('0') {
        hex.remove(0);
    }
    if negative {
        format!("-{hex}")
    } else {
        hex
    }
}

/// Normalises a login-success UUID to its bare 32-hex form.
pub fn normalize_uuid(uuid: &str) -> String {
    uuid.chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_lowercase()
}

/// Parses a bare or hyphenated UUID into its numeric form.
pub fn parse_uuid(uuid: &str) -> Option<u128> {
    u128::from_str_radix(&normalize_uuid(uuid), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_hash_matches_known_vectors() {
        assert_eq!(
            server_hash("Notch", &[], &[]),
            "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48"
        );
        assert_eq!(
            server_hash("jeb_", &[], &[]),
            "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1"
        );
        assert_eq!(
            server_hash("simon", &[], &[]),
            "88e16a1019277b15d58faf0541e11910eb756f6"
        );
    }

    #[test]
    fn uuid_normalisation() {
        assert_eq!(
            normalize_uuid("D6A33537-0444-45BE-B12B-AF138B1AB81F"),
            "d6a33537044445beb12baf138b1ab81f"
        );
        assert_eq!(
            normalize_uuid("d6a33537044445beb12baf138b1ab81f"),
            "d6a33537044445beb12baf138b1ab81f"
        );
        assert_eq!(
            parse_uuid("d6a33537-0444-45be-b12b-af138b1ab81f"),
            Some(0xd6a33537044445beb12baf138b1ab81f)
        );
    }
}
