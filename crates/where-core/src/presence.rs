//! Presence derived from received signals.
//!
//! The table is rebuilt from empty on every start; it is never persisted.

use crate::config::PresenceConfig;
use crate::ids::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Offline => "offline",
        };
        f.write_str(label)
    }
}

/// Current time in unix seconds.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Derives an agent's status. Self is always online; an agent never seen is offline.
pub fn presence_status(
    agent: &AgentId,
    me: &AgentId,
    last_seen: Option<i64>,
    now: i64,
    config: &PresenceConfig,
) -> PresenceStatus {
    if agent == me {
        return PresenceStatus::Online;
    }
    let Some(last_seen) = last_seen else {
        return PresenceStatus::Offline;
    };
    let age = now - last_seen;
    if age < config.online_secs {
        PresenceStatus::Online
    } else if age < config.away_secs {
        PresenceStatus::Away
    } else {
        PresenceStatus::Offline
    }
}

/// `agent -> last seen (unix seconds)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceTable {
    last_seen: HashMap<AgentId, i64>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, agent: AgentId, now: i64) {
        self.last_seen.insert(agent, now);
    }

    pub fn last_seen(&self, agent: &AgentId) -> Option<i64> {
        self.last_seen.get(agent).copied()
    }

    pub fn status(
        &self,
        agent: &AgentId,
        me: &AgentId,
        now: i64,
        config: &PresenceConfig,
    ) -> PresenceStatus {
        presence_status(agent, me, self.last_seen(agent), now, config)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentId> {
        self.last_seen.keys()
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}
