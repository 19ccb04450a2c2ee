//! Profile records and their per-profile behaviour settings. Profiles
//! are owned by the external control plane; the core only reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// 32-hex-digit account id.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub settings: ProfileSettings,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSettings {
    pub auto_reconnect: AutoReconnect,
    pub auto_disconnect: AutoDisconnect,
    pub notify_players: NotifyPlayers,
    pub enable_packet_dumps: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoReconnect {
    pub enabled: bool,
    /// Delay before reopening the session, in milliseconds.
    pub delay: u64,
}

impl Default for AutoReconnect {
    fn default() -> Self {
        Self {
            enabled: false,
            delay: 30_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoDisconnect {
    pub enabled: bool,
    /// Keep the session alive while a client is attached.
    pub disable_while_playing: bool,
    pub health: f32,
}

impl Default for AutoDisconnect {
    fn default() -> Self {
        Self {
            enabled: false,
            disable_while_playing: true,
            health: 10.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyPlayers {
    pub enabled: bool,
    pub disable_while_playing: bool,
    pub ignore: HashSet<String>,
}

impl Default for NotifyPlayers {
    fn default() -> Self {
        Self {
            enabled: false,
            disable_while_playing: true,
            ignore: HashSet::new(),
        }
    }
}

/// Read access to the profile set. Implemented by the external layer;
/// the in-memory store below backs the standalone binary and tests.
pub trait ProfileStore: Send + Sync {
    fn all(&self) -> Vec<Profile>;

    fn by_name(&self, name: &str) -> Option<Profile> {
        self.all().into_iter().find(|profile| profile.name == name)
    }

    fn by_id_or_name(&self, key: &str) -> Option<Profile> {
        self.all()
            .into_iter()
            .find(|profile| profile.id == key || profile.name == key)
    }

    fn len(&self) -> usize {
        self.all().len()
    }
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<Vec<Profile>>,
}

impl InMemoryProfileStore {
    pub fn new(profiles: Vec<Profile>) -> Arc<Self> {
        Arc::new(Self {
            profiles: RwLock::new(profiles),
        })
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn all(&self) -> Vec<Profile> {
        self.profiles.read().expect("profile store poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_deserialize_with_defaults() {
        let profile: Profile = serde_json::from_str(
            r#"{
                "id": "d6a33537044445beb12baf138b1ab81f",
                "name": "player",
                "settings": {
                    "autoReconnect": {"enabled": true, "delay": 100},
                    "autoDisconnect": {"enabled": true, "health": 5.0}
                }
            }"#,
        )
        .unwrap();
        assert!(profile.settings.auto_reconnect.enabled);
        assert_eq!(profile.settings.auto_reconnect.delay, 100);
        assert!(profile.settings.auto_disconnect.disable_while_playing);
        assert_eq!(profile.settings.auto_disconnect.health, 5.0);
        assert!(!profile.settings.notify_players.enabled);
        assert!(!profile.settings.enable_packet_dumps);
    }

    #[test]
    fn store_lookup_by_id_or_name() {
        let store = InMemoryProfileStore::new(vec![Profile {
            id: "ab".repeat(16),
            name: "player".into(),
            access_token: String::new(),
            settings: ProfileSettings::default(),
        }]);
        assert!(store.by_name("player").is_some());
        assert!(store.by_name("other").is_none());
        assert!(store.by_id_or_name(&"ab".repeat(16)).is_some());
        assert!(store.by_id_or_name("player").is_some());
    }
}
