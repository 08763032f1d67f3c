//! View-model of the Ludotheque zome: the global catalog of playsets.

use crate::context::HappContext;
use crate::subscriber::{SubscriberRegistry, SubscriptionId};
use tokio::sync::RwLock;
use where_core::gateway::LudothequeProxy;
use where_core::playset::{LudothequePerspective, Playset};
use where_core::{CellId, EntryId, Result, WhereError};

pub struct LudothequeZvm {
    proxy: LudothequeProxy,
    perspective: RwLock<LudothequePerspective>,
    subscribers: SubscriberRegistry<LudothequePerspective>,
}

impl LudothequeZvm {
    pub fn new(ctx: &HappContext) -> Self {
        Self {
            proxy: LudothequeProxy::new(ctx.gateway.clone(), ctx.config.ludotheque_zome.clone()),
            perspective: RwLock::new(LudothequePerspective::default()),
            subscribers: SubscriberRegistry::new(),
        }
    }

    pub async fn perspective(&self) -> LudothequePerspective {
        self.perspective.read().await.clone()
    }

    pub async fn playset(&self, id: &EntryId) -> Option<Playset> {
        self.perspective.read().await.playsets.get(id).cloned()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LudothequePerspective) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    async fn notify_subscribers(&self) {
        let perspective = self.perspective.read().await;
        self.subscribers.notify(&perspective);
    }

    pub async fn probe_playsets(&self) -> Result<usize> {
        let playsets = self.proxy.get_all_playsets().await?;
        let count = playsets.len();
        {
            let mut perspective = self.perspective.write().await;
            for item in playsets {
                perspective.playsets.insert(item.hash, item.content);
            }
        }
        self.notify_subscribers().await;
        Ok(count)
    }

    pub async fn fetch_playset(&self, id: &EntryId) -> Result<Playset> {
        let playset = self
            .proxy
            .get_playset(id)
            .await?
            .ok_or_else(|| WhereError::not_found("Playset", id.as_str()))?;
        self.perspective
            .write()
            .await
            .playsets
            .insert(id.clone(), playset.clone());
        self.notify_subscribers().await;
        Ok(playset)
    }

    pub async fn publish_playset(&self, playset: Playset) -> Result<EntryId> {
        let id = self.proxy.create_playset(&playset).await?;
        tracing::info!("[LudothequeZvm] published playset '{}' as {}", playset.name, id);
        self.perspective
            .write()
            .await
            .playsets
            .insert(id.clone(), playset);
        self.notify_subscribers().await;
        Ok(id)
    }

    /// Copies a playset and all its pieces into `destination`. Returns the
    /// ids of the exported pieces there.
    pub async fn export_playset(
        &self,
        playset_id: &EntryId,
        destination: &CellId,
    ) -> Result<Vec<EntryId>> {
        self.proxy.export_playset(playset_id, destination).await
    }
}
