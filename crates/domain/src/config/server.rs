use serde::{Deserialize, Serialize};

/// Minimal HTTP surface config for the in-scope command/room-alias
/// endpoints (§6.3/§6.4). The transport layer itself is an external
/// collaborator; this only names where it binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_fallback_language")]
    pub fallback_language: String,
}

fn d_host() -> String {
    "0.0.0.0".to_owned()
}
fn d_port() -> u16 {
    7878
}
fn d_fallback_language() -> String {
    "en".to_owned()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            fallback_language: d_fallback_language(),
        }
    }
}

/// The valid `room_id` values session-id generation may use, and the set
/// returned by `GET /room_aliases`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomsConfig {
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl RoomsConfig {
    pub fn is_valid_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }
}
