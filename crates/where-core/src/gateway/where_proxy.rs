use super::port::ZomeGateway;
use super::proxy::ZomeProxy;
use crate::error::Result;
use crate::ids::{CellId, LinkId, SessionId, SpaceId};
use crate::placement::{
    AddHereInput, CreateNextSessionInput, HereOutput, PlacementSessionEntry, SpaceSessionsInput,
};
use std::sync::Arc;

/// Function names exported by the Where zome.
pub mod where_fn {
    pub const ADD_HERE: &str = "add_here";
    pub const DELETE_HERE: &str = "delete_here";
    pub const GET_HERES: &str = "get_heres";
    pub const HIDE_SPACE: &str = "hide_space";
    pub const UNHIDE_SPACE: &str = "unhide_space";
    pub const GET_HIDDEN_SPACES: &str = "get_hidden_spaces";
    pub const GET_SESSION_FROM_EH: &str = "get_session_from_eh";
    pub const GET_SPACE_SESSIONS: &str = "get_space_sessions";
    pub const CREATE_SESSIONS: &str = "create_sessions";
    pub const CREATE_NEXT_SESSION: &str = "create_next_session";
}

#[derive(Clone)]
pub struct WhereProxy {
    inner: ZomeProxy,
}

impl WhereProxy {
    pub fn new(gateway: Arc<dyn ZomeGateway>, zome_name: impl Into<String>) -> Self {
        Self {
            inner: ZomeProxy::new(gateway, zome_name),
        }
    }

    pub fn cell_id(&self) -> &CellId {
        self.inner.cell_id()
    }

    pub async fn add_here(&self, input: &AddHereInput) -> Result<LinkId> {
        self.inner.call(where_fn::ADD_HERE, input).await
    }

    pub async fn delete_here(&self, link_id: &LinkId) -> Result<()> {
        self.inner.call(where_fn::DELETE_HERE, link_id).await
    }

    pub async fn get_heres(&self, session_id: &SessionId) -> Result<Vec<HereOutput>> {
        self.inner.call(where_fn::GET_HERES, session_id).await
    }

    pub async fn hide_space(&self, space_id: &SpaceId) -> Result<()> {
        // The zome answers with the link hash, which nothing here needs.
        let _link: serde_json::Value = self.inner.call(where_fn::HIDE_SPACE, space_id).await?;
        Ok(())
    }

    pub async fn unhide_space(&self, space_id: &SpaceId) -> Result<()> {
        self.inner.call(where_fn::UNHIDE_SPACE, space_id).await
    }

    pub async fn get_hidden_spaces(&self) -> Result<Vec<SpaceId>> {
        self.inner.call(where_fn::GET_HIDDEN_SPACES, &()).await
    }

    pub async fn get_session_from_eh(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<PlacementSessionEntry>> {
        self.inner
            .call(where_fn::GET_SESSION_FROM_EH, session_id)
            .await
    }

    pub async fn get_space_sessions(&self, space_id: &SpaceId) -> Result<Vec<SessionId>> {
        self.inner.call(where_fn::GET_SPACE_SESSIONS, space_id).await
    }

    pub async fn create_sessions(&self, input: &SpaceSessionsInput) -> Result<Vec<SessionId>> {
        self.inner.call(where_fn::CREATE_SESSIONS, input).await
    }

    pub async fn create_next_session(
        &self,
        input: &CreateNextSessionInput,
    ) -> Result<(SessionId, u32)> {
        self.inner.call(where_fn::CREATE_NEXT_SESSION, input).await
    }
}
