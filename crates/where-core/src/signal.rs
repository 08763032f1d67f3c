//! Messages peers push to each other.
//!
//! The set of message kinds is closed: adding one is a compile-time change to
//! every `match` over [`Message`].

use crate::ids::{AgentId, EntryId, LinkId, SessionId, SpaceId};
use crate::placement::{HereEntry, HereOutput, PlacementSessionEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum Message {
    Ping(AgentId),
    Pong(AgentId),
    NewHere(HereOutput),
    DeleteHere(SessionId, LinkId),
    /// Replaced link, new link, new entry.
    UpdateHere(LinkId, LinkId, HereEntry),
    NewSession(SessionId, PlacementSessionEntry),
    NewSpace(SpaceId),
    NewTemplate(EntryId),
    NewSvgMarker(EntryId),
    NewEmojiGroup(EntryId),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Ping(_) => "Ping",
            Message::Pong(_) => "Pong",
            Message::NewHere(_) => "NewHere",
            Message::DeleteHere(..) => "DeleteHere",
            Message::UpdateHere(..) => "UpdateHere",
            Message::NewSession(..) => "NewSession",
            Message::NewSpace(_) => "NewSpace",
            Message::NewTemplate(_) => "NewTemplate",
            Message::NewSvgMarker(_) => "NewSvgMarker",
            Message::NewEmojiGroup(_) => "NewEmojiGroup",
        }
    }

    pub fn is_pong(&self) -> bool {
        matches!(self, Message::Pong(_))
    }
}

/// Envelope of every pushed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    /// Space the message concerns, used by receivers to filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maybe_space_hash: Option<SpaceId>,
    pub from: AgentId,
    pub message: Message,
}

impl SignalPayload {
    pub fn new(maybe_space_hash: Option<SpaceId>, from: AgentId, message: Message) -> Self {
        Self {
            maybe_space_hash,
            from,
            message,
        }
    }

    pub fn ping(maybe_space_hash: Option<SpaceId>, me: &AgentId) -> Self {
        Self::new(maybe_space_hash, me.clone(), Message::Ping(me.clone()))
    }

    pub fn pong(maybe_space_hash: Option<SpaceId>, me: &AgentId) -> Self {
        Self::new(maybe_space_hash, me.clone(), Message::Pong(me.clone()))
    }
}
