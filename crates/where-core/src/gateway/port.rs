//! Collaborator ports.
//!
//! The view-models reach the backend only through these two traits. Storage,
//! validation and the encoding of calls on the wire belong to the
//! implementations.

use crate::error::Result;
use crate::ids::{AgentId, CellId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Request/response calls against one backend instance.
///
/// Implementations carry their own timeout; a timed-out call is an `Err`
/// like any other rejection. Nothing above this trait retries.
#[async_trait]
pub trait ZomeGateway: Send + Sync {
    /// Instance this gateway talks to.
    fn cell_id(&self) -> &CellId;

    /// Calls `function` of `zome` with a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`WhereError::Remote`](crate::WhereError::Remote) when the
    /// backend rejects the call or cannot be reached.
    async fn call(&self, zome: &str, function: &str, payload: Value) -> Result<Value>;
}

/// A push delivered to an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSignal {
    /// Instance the signal was delivered to.
    pub cell_id: CellId,
    pub zome_name: String,
    pub payload: Value,
}

/// Best-effort, unordered, possibly duplicated delivery of pushes between
/// the agents of one instance.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Registers the single handler of this instance. A later call replaces
    /// the previous registration.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AppSignal>;

    /// Fire-and-forget push to `recipients`. `Ok` means handed off, not delivered.
    async fn send(&self, zome: &str, payload: Value, recipients: &[AgentId]) -> Result<()>;
}
