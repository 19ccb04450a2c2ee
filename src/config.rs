//! Proxy configuration, loaded from a TOML file.

use crate::profile::Profile;
use serde::Deserialize;
use std::{net::SocketAddr, path::Path, path::PathBuf};

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upstream: UpstreamConfig,
    /// Address the downstream listener binds to.
    pub listen: SocketAddr,
    /// Name shown in the server list.
    pub server_name: String,
    pub dumps_dir: PathBuf,
    /// Profiles for the standalone binary; normally supplied by the
    /// control plane instead.
    pub profiles: Vec<Profile>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub host: String,
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "2b2t.org".to_owned(),
            port: 25565,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            listen: "0.0.0.0:25565".parse().expect("valid default address"),
            server_name: "2b2t Proxy".to_owned(),
            dumps_dir: PathBuf::from("dumps"),
            profiles: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: Config = toml::from_str(
            r#"
            server_name = "test proxy"

            [upstream]
            host = "localhost"
            "#,
        )
        .unwrap();
        assert_eq!(config.server_name, "test proxy");
        assert_eq!(config.upstream.host, "localhost");
        assert_eq!(config.upstream.port, 25565);
        assert_eq!(config.listen.port(), 25565);
    }
}
