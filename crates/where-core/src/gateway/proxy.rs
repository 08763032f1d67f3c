use super::port::ZomeGateway;
use crate::error::{Result, WhereError};
use crate::ids::CellId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Typed access to one zome through a [`ZomeGateway`].
#[derive(Clone)]
pub struct ZomeProxy {
    gateway: Arc<dyn ZomeGateway>,
    zome_name: String,
}

impl ZomeProxy {
    pub fn new(gateway: Arc<dyn ZomeGateway>, zome_name: impl Into<String>) -> Self {
        Self {
            gateway,
            zome_name: zome_name.into(),
        }
    }

    pub fn zome_name(&self) -> &str {
        &self.zome_name
    }

    pub fn cell_id(&self) -> &CellId {
        self.gateway.cell_id()
    }

    /// Serializes `input`, performs the call and decodes the response.
    pub async fn call<I, O>(&self, function: &str, input: &I) -> Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let payload = serde_json::to_value(input)?;
        tracing::debug!("[{}] calling {}", self.zome_name, function);
        let response = self.gateway.call(&self.zome_name, function, payload).await?;
        serde_json::from_value(response).map_err(|e| {
            WhereError::json(format!(
                "{}::{} returned an unexpected shape: {}",
                self.zome_name, function, e
            ))
        })
    }
}
