//! View-model of the Playset zome: the per-instance catalog of pieces.

use crate::context::HappContext;
use crate::subscriber::{SubscriberRegistry, SubscriptionId};
use tokio::sync::RwLock;
use where_core::gateway::PlaysetProxy;
use where_core::playset::{
    EmojiGroup, Inventory, PieceKind, PlaysetPerspective, SpaceMat, SvgMarker, Template,
    dematerialize_space, materialize_space,
};
use where_core::{CellId, EntryId, Result, SpaceId, WhereError};

/// Create-only cache of templates, svg markers, emoji groups and spaces.
pub struct PlaysetZvm {
    proxy: PlaysetProxy,
    perspective: RwLock<PlaysetPerspective>,
    subscribers: SubscriberRegistry<PlaysetPerspective>,
}

impl PlaysetZvm {
    pub fn new(ctx: &HappContext) -> Self {
        Self {
            proxy: PlaysetProxy::new(ctx.gateway.clone(), ctx.config.playset_zome.clone()),
            perspective: RwLock::new(PlaysetPerspective::default()),
            subscribers: SubscriberRegistry::new(),
        }
    }

    pub fn cell_id(&self) -> &CellId {
        self.proxy.cell_id()
    }

    pub async fn perspective(&self) -> PlaysetPerspective {
        self.perspective.read().await.clone()
    }

    pub async fn space(&self, id: &SpaceId) -> Option<SpaceMat> {
        self.perspective.read().await.spaces.get(id).cloned()
    }

    pub async fn template(&self, id: &EntryId) -> Option<Template> {
        self.perspective.read().await.templates.get(id).cloned()
    }

    pub async fn svg_marker(&self, id: &EntryId) -> Option<SvgMarker> {
        self.perspective.read().await.svg_markers.get(id).cloned()
    }

    pub async fn emoji_group(&self, id: &EntryId) -> Option<EmojiGroup> {
        self.perspective.read().await.emoji_groups.get(id).cloned()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaysetPerspective) + Send + Sync + 'static,
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

    // ============================================================================
    // Probes
    // ============================================================================

    pub async fn probe_all(&self) -> Result<()> {
        self.probe_templates().await?;
        self.probe_svg_markers().await?;
        self.probe_emoji_groups().await?;
        self.probe_spaces().await?;
        Ok(())
    }

    pub async fn probe_templates(&self) -> Result<usize> {
        let templates = self.proxy.get_templates().await?;
        let count = templates.len();
        {
            let mut perspective = self.perspective.write().await;
            for item in templates {
                perspective.templates.insert(item.hash, item.content);
            }
        }
        self.notify_subscribers().await;
        Ok(count)
    }

    pub async fn probe_svg_markers(&self) -> Result<usize> {
        let markers = self.proxy.get_svg_markers().await?;
        let count = markers.len();
        {
            let mut perspective = self.perspective.write().await;
            for item in markers {
                perspective.svg_markers.insert(item.hash, item.content);
            }
        }
        self.notify_subscribers().await;
        Ok(count)
    }

    pub async fn probe_emoji_groups(&self) -> Result<usize> {
        let groups = self.proxy.get_all_emoji_groups().await?;
        let count = groups.len();
        {
            let mut perspective = self.perspective.write().await;
            for item in groups {
                perspective.emoji_groups.insert(item.hash, item.content);
            }
        }
        self.notify_subscribers().await;
        Ok(count)
    }

    /// Reloads every Space. A Space that cannot be decoded is skipped.
    pub async fn probe_spaces(&self) -> Result<Vec<SpaceId>> {
        let spaces = self.proxy.get_spaces().await?;
        let mut ids = Vec::with_capacity(spaces.len());
        {
            let mut perspective = self.perspective.write().await;
            for item in spaces {
                match materialize_space(&item.content) {
                    Ok(space) => {
                        ids.push(item.hash.clone());
                        perspective.spaces.insert(item.hash, space);
                    }
                    Err(e) => tracing::warn!("[PlaysetZvm] skipping space {}: {}", item.hash, e),
                }
            }
        }
        self.notify_subscribers().await;
        Ok(ids)
    }

    pub async fn probe_inventory(&self) -> Result<Inventory> {
        self.proxy.get_inventory().await
    }

    // ============================================================================
    // Fetch one piece
    // ============================================================================

    pub async fn fetch_template(&self, id: &EntryId) -> Result<Template> {
        let template = self
            .proxy
            .get_template(id)
            .await?
            .ok_or_else(|| WhereError::not_found("Template", id.as_str()))?;
        self.perspective
            .write()
            .await
            .templates
            .insert(id.clone(), template.clone());
        self.notify_subscribers().await;
        Ok(template)
    }

    pub async fn fetch_svg_marker(&self, id: &EntryId) -> Result<SvgMarker> {
        let marker = self
            .proxy
            .get_svg_marker(id)
            .await?
            .ok_or_else(|| WhereError::not_found("SvgMarker", id.as_str()))?;
        self.perspective
            .write()
            .await
            .svg_markers
            .insert(id.clone(), marker.clone());
        self.notify_subscribers().await;
        Ok(marker)
    }

    pub async fn fetch_emoji_group(&self, id: &EntryId) -> Result<EmojiGroup> {
        let group = self
            .proxy
            .get_emoji_group(id)
            .await?
            .ok_or_else(|| WhereError::not_found("EmojiGroup", id.as_str()))?;
        self.perspective
            .write()
            .await
            .emoji_groups
            .insert(id.clone(), group.clone());
        self.notify_subscribers().await;
        Ok(group)
    }

    pub async fn fetch_space(&self, id: &SpaceId) -> Result<SpaceMat> {
        let entry = self
            .proxy
            .get_space(id)
            .await?
            .ok_or_else(|| WhereError::not_found("Space", id.as_str()))?;
        let space = materialize_space(&entry)?;
        self.perspective
            .write()
            .await
            .spaces
            .insert(id.clone(), space.clone());
        self.notify_subscribers().await;
        Ok(space)
    }

    // ============================================================================
    // Publish
    // ============================================================================

    pub async fn publish_template(&self, template: Template) -> Result<EntryId> {
        let id = self.proxy.create_template(&template).await?;
        self.perspective
            .write()
            .await
            .templates
            .insert(id.clone(), template);
        self.notify_subscribers().await;
        Ok(id)
    }

    pub async fn publish_svg_marker(&self, marker: SvgMarker) -> Result<EntryId> {
        let id = self.proxy.create_svg_marker(&marker).await?;
        self.perspective
            .write()
            .await
            .svg_markers
            .insert(id.clone(), marker);
        self.notify_subscribers().await;
        Ok(id)
    }

    pub async fn publish_emoji_group(&self, group: EmojiGroup) -> Result<EntryId> {
        let id = self.proxy.create_emoji_group(&group).await?;
        self.perspective
            .write()
            .await
            .emoji_groups
            .insert(id.clone(), group);
        self.notify_subscribers().await;
        Ok(id)
    }

    pub async fn publish_space(&self, space: SpaceMat) -> Result<SpaceId> {
        let id = self.proxy.create_space(&dematerialize_space(&space)).await?;
        tracing::debug!("[PlaysetZvm] published space '{}' as {}", space.name, id);
        self.perspective
            .write()
            .await
            .spaces
            .insert(id.clone(), space);
        self.notify_subscribers().await;
        Ok(id)
    }

    // ============================================================================
    // Export
    // ============================================================================

    /// Copies a piece into another instance. The local cache is untouched.
    ///
    /// A Space is exported together with the pieces it references; their ids
    /// in the destination are returned. Other kinds return nothing.
    pub async fn export_piece(
        &self,
        id: &EntryId,
        kind: PieceKind,
        destination: &CellId,
    ) -> Result<Vec<EntryId>> {
        tracing::debug!("[PlaysetZvm] exporting {} {} to {}", kind, id, destination);
        match kind {
            PieceKind::Space => {
                let space_id = SpaceId::from(id.clone());
                self.proxy.export_space(&space_id, destination).await
            }
            _ => {
                self.proxy.export_piece(id, kind, destination).await?;
                Ok(Vec::new())
            }
        }
    }
}
