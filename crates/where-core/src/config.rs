use serde::{Deserialize, Serialize};

/// Root configuration of the view-model layer (`config.toml`).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WhereConfig {
    /// Coordinator zome holding placements and sessions.
    pub where_zome: String,
    /// Coordinator zome holding catalog pieces.
    pub playset_zome: String,
    /// Coordinator zome of the global catalog instance.
    pub ludotheque_zome: String,
    /// Session created when a new play is constructed without names.
    pub default_session_name: String,
    pub presence: PresenceConfig,
}

impl Default for WhereConfig {
    fn default() -> Self {
        Self {
            where_zome: "where".to_string(),
            playset_zome: "where_playset".to_string(),
            ludotheque_zome: "ludotheque".to_string(),
            default_session_name: "global".to_string(),
            presence: PresenceConfig::default(),
        }
    }
}

/// Ages (in seconds since the last received signal) used to derive presence.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PresenceConfig {
    pub online_secs: i64,
    pub away_secs: i64,
    /// Window within which a peer counts as a current recipient of pushes.
    pub current_others_secs: i64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            online_secs: 30,
            away_secs: 300,
            current_others_secs: 300,
        }
    }
}
