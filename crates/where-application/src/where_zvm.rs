//! View-model of the Where zome: manifests, sessions and locations.

use crate::context::HappContext;
use crate::subscriber::{SubscriberRegistry, SubscriptionId};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use where_core::gateway::{PushChannel, WhereProxy};
use where_core::placement::{
    AddHereInput, Coord, CreateNextSessionInput, HereEntry, HereOutput, Location, LocationInfo,
    PlacementSession, PlayManifest, SpaceSessionsInput, WherePerspective, dematerialize_here,
    materialize_here,
};
use where_core::signal::SignalPayload;
use where_core::{AgentId, LinkId, Result, SessionId, SpaceId, WhereError};

/// Result of [`WhereZvm::update_location`].
///
/// The new placement is the commit point. When the old one could not be
/// deleted remotely, `orphaned_link` names it: the backend still holds it
/// and the next probe of the session drops it from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub info: LocationInfo,
    /// Slot the new placement landed in.
    pub index: usize,
    pub previous_link: LinkId,
    pub orphaned_link: Option<LinkId>,
}

impl UpdateOutcome {
    pub fn is_clean(&self) -> bool {
        self.orphaned_link.is_none()
    }
}

/// Where a placement ends up when it lands in a session that may have moved
/// on since it was read.
enum Placement {
    Replaced(usize),
    Appended(usize),
    AlreadyPresent(usize),
}

impl Placement {
    fn index(&self) -> usize {
        match self {
            Placement::Replaced(idx) | Placement::Appended(idx) | Placement::AlreadyPresent(idx) => {
                *idx
            }
        }
    }
}

/// Writes `info` into the slot holding `previous_link`, appends when there
/// is none or that link is no longer cached. A tombstone is never refilled.
fn place(
    session: &mut PlacementSession,
    previous_link: Option<&LinkId>,
    info: LocationInfo,
) -> Placement {
    if let Some(existing) = session.position_of(&info.link_id) {
        return Placement::AlreadyPresent(existing);
    }
    match previous_link.and_then(|link| session.position_of(link)) {
        Some(idx) => {
            session.locations[idx] = Some(info);
            Placement::Replaced(idx)
        }
        None => {
            session.locations.push(Some(info));
            Placement::Appended(session.locations.len() - 1)
        }
    }
}

pub struct WhereZvm {
    proxy: WhereProxy,
    push: Arc<dyn PushChannel>,
    zome_name: String,
    me: AgentId,
    perspective: RwLock<WherePerspective>,
    orphaned_links: RwLock<HashSet<LinkId>>,
    subscribers: SubscriberRegistry<WherePerspective>,
}

impl WhereZvm {
    pub fn new(ctx: &HappContext) -> Self {
        Self {
            proxy: WhereProxy::new(ctx.gateway.clone(), ctx.config.where_zome.clone()),
            push: ctx.push.clone(),
            zome_name: ctx.config.where_zome.clone(),
            me: ctx.me().clone(),
            perspective: RwLock::new(WherePerspective::default()),
            orphaned_links: RwLock::new(HashSet::new()),
            subscribers: SubscriberRegistry::new(),
        }
    }

    pub fn me(&self) -> &AgentId {
        &self.me
    }

    // ============================================================================
    // Read accessors
    // ============================================================================

    /// Owned snapshot of the whole cache.
    pub async fn perspective(&self) -> WherePerspective {
        self.perspective.read().await.clone()
    }

    pub async fn manifest(&self, space_id: &SpaceId) -> Option<PlayManifest> {
        self.perspective.read().await.manifests.get(space_id).cloned()
    }

    pub async fn session(&self, session_id: &SessionId) -> Option<PlacementSession> {
        self.perspective.read().await.sessions.get(session_id).cloned()
    }

    /// Id of the session of `space_id` with the given backend index.
    pub async fn session_at_index(&self, space_id: &SpaceId, index: u32) -> Option<SessionId> {
        let perspective = self.perspective.read().await;
        let manifest = perspective.manifests.get(space_id)?;
        manifest
            .session_ids
            .iter()
            .find(|id| {
                perspective
                    .sessions
                    .get(*id)
                    .is_some_and(|session| session.index == index)
            })
            .cloned()
    }

    pub async fn orphaned_links(&self) -> Vec<LinkId> {
        self.orphaned_links.read().await.iter().cloned().collect()
    }

    // ============================================================================
    // Subscribers
    // ============================================================================

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WherePerspective) + Send + Sync + 'static,
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

    /// Refreshes the manifest of `space_id`.
    ///
    /// Returns `None` when the backend knows no session for the Space; no
    /// manifest is created in that case.
    pub async fn probe_manifest(&self, space_id: &SpaceId) -> Result<Option<PlayManifest>> {
        let session_ids = self.proxy.get_space_sessions(space_id).await?;
        if session_ids.is_empty() {
            tracing::debug!("[WhereZvm] no session for space {}", space_id);
            return Ok(None);
        }
        let hidden = self.proxy.get_hidden_spaces().await?;

        let manifest = {
            let mut perspective = self.perspective.write().await;
            let manifest = perspective
                .manifests
                .entry(space_id.clone())
                .or_insert_with(|| PlayManifest::new(space_id.clone()));
            manifest.visible = !hidden.contains(space_id);
            // Sessions announced by peers but not yet indexed stay listed.
            let announced: Vec<SessionId> = manifest
                .session_ids
                .iter()
                .filter(|id| !session_ids.contains(id))
                .cloned()
                .collect();
            manifest.session_ids = session_ids;
            manifest.session_ids.extend(announced);
            manifest.clone()
        };
        self.notify_subscribers().await;
        Ok(Some(manifest))
    }

    /// Reloads a session and all its Locations, replacing the cached entry.
    ///
    /// Records that cannot be decoded are skipped, and so are records whose
    /// link was orphaned by a failed update.
    pub async fn probe_session(&self, session_id: &SessionId) -> Result<PlacementSession> {
        let entry = self
            .proxy
            .get_session_from_eh(session_id)
            .await?
            .ok_or_else(|| WhereError::not_found("PlacementSession", session_id.as_str()))?;
        let heres = self.proxy.get_heres(session_id).await?;

        let orphaned = self.orphaned_links.read().await.clone();
        let mut session = PlacementSession::new(entry.name, entry.index);
        for here in &heres {
            if orphaned.contains(&here.link_id) {
                tracing::debug!("[WhereZvm] dropping orphaned link {}", here.link_id);
                continue;
            }
            match materialize_here(here) {
                Ok(info) => session.locations.push(Some(info)),
                Err(e) => tracing::warn!("[WhereZvm] skipping here in {}: {}", session_id, e),
            }
        }

        {
            let mut perspective = self.perspective.write().await;
            if let Some(manifest) = perspective.manifests.get_mut(&entry.space_id)
                && !manifest.session_ids.contains(session_id)
            {
                manifest.session_ids.push(session_id.clone());
            }
            perspective
                .sessions
                .insert(session_id.clone(), session.clone());
        }
        self.notify_subscribers().await;
        Ok(session)
    }

    // ============================================================================
    // Sessions
    // ============================================================================

    /// Mints the next session of `space_id`. Returns its id and backend index.
    pub async fn create_next_session(
        &self,
        space_id: &SpaceId,
        name: &str,
    ) -> Result<(SessionId, u32)> {
        let input = CreateNextSessionInput {
            space_id: space_id.clone(),
            name: name.to_string(),
        };
        let (session_id, index) = self.proxy.create_next_session(&input).await?;
        tracing::debug!(
            "[WhereZvm] created session '{}' #{} for space {}",
            name,
            index,
            space_id
        );

        {
            let mut perspective = self.perspective.write().await;
            Self::insert_session(
                &mut perspective,
                space_id,
                session_id.clone(),
                PlacementSession::new(name, index),
                true,
            );
        }
        self.notify_subscribers().await;
        Ok((session_id, index))
    }

    /// Creates one session per name, indexed contiguously from the current
    /// manifest length.
    pub async fn create_sessions(
        &self,
        space_id: &SpaceId,
        names: &[String],
    ) -> Result<Vec<SessionId>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let input = SpaceSessionsInput {
            space_id: space_id.clone(),
            session_names: names.to_vec(),
        };
        let session_ids = self.proxy.create_sessions(&input).await?;
        if session_ids.len() != names.len() {
            return Err(WhereError::invalid_state(format!(
                "asked for {} sessions in space {}, backend created {}",
                names.len(),
                space_id,
                session_ids.len()
            )));
        }

        {
            let mut perspective = self.perspective.write().await;
            let start = perspective
                .manifests
                .get(space_id)
                .map(|manifest| manifest.session_ids.len())
                .unwrap_or(0) as u32;
            for (offset, (session_id, name)) in session_ids.iter().zip(names).enumerate() {
                Self::insert_session(
                    &mut perspective,
                    space_id,
                    session_id.clone(),
                    PlacementSession::new(name.clone(), start + offset as u32),
                    true,
                );
            }
        }
        self.notify_subscribers().await;
        Ok(session_ids)
    }

    /// Caches a session announced by a peer.
    ///
    /// The manifest is extended only when already known. Returns `false` when
    /// the session was cached already.
    pub async fn add_session(
        &self,
        space_id: &SpaceId,
        session_id: SessionId,
        session: PlacementSession,
    ) -> bool {
        let added = {
            let mut perspective = self.perspective.write().await;
            Self::insert_session(&mut perspective, space_id, session_id, session, false)
        };
        if added {
            self.notify_subscribers().await;
        }
        added
    }

    fn insert_session(
        perspective: &mut WherePerspective,
        space_id: &SpaceId,
        session_id: SessionId,
        session: PlacementSession,
        create_manifest: bool,
    ) -> bool {
        if create_manifest {
            perspective
                .manifests
                .entry(space_id.clone())
                .or_insert_with(|| PlayManifest::new(space_id.clone()));
        }
        if let Some(manifest) = perspective.manifests.get_mut(space_id)
            && !manifest.session_ids.contains(&session_id)
        {
            manifest.session_ids.push(session_id.clone());
        }
        if perspective.sessions.contains_key(&session_id) {
            return false;
        }
        perspective.sessions.insert(session_id, session);
        true
    }

    // ============================================================================
    // Locations
    // ============================================================================

    async fn session_index(&self, session_id: &SessionId) -> Result<u32> {
        self.perspective
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|session| session.index)
            .ok_or_else(|| {
                WhereError::invalid_state(format!("session {} is not cached", session_id))
            })
    }

    async fn live_location(&self, session_id: &SessionId, idx: usize) -> Result<LocationInfo> {
        let perspective = self.perspective.read().await;
        let session = perspective.sessions.get(session_id).ok_or_else(|| {
            WhereError::invalid_state(format!("session {} is not cached", session_id))
        })?;
        match session.locations.get(idx) {
            Some(Some(info)) => Ok(info.clone()),
            Some(None) => Err(WhereError::invalid_state(format!(
                "location {} of session {} is deleted",
                idx, session_id
            ))),
            None => Err(WhereError::invalid_state(format!(
                "session {} has no location {}",
                session_id, idx
            ))),
        }
    }

    async fn add_here(&self, space_id: &SpaceId, index: u32, entry: HereEntry) -> Result<LinkId> {
        let input = AddHereInput {
            space_id: space_id.clone(),
            session_index: index,
            value: entry.value,
            meta: entry.meta,
        };
        self.proxy.add_here(&input).await
    }

    /// Publishes a new placement and appends it to its session.
    pub async fn publish_location(
        &self,
        location: Location,
        space_id: &SpaceId,
    ) -> Result<LocationInfo> {
        let index = self.session_index(&location.session_id).await?;
        let link_id = self
            .add_here(space_id, index, dematerialize_here(&location))
            .await?;
        let info = LocationInfo {
            location,
            link_id,
            author: self.me.clone(),
        };
        self.add_location(info.clone()).await;
        Ok(info)
    }

    /// Merges a Location into its cached session, matching by link.
    ///
    /// Returns `false` when the link is already cached or the session is not.
    pub async fn add_location(&self, info: LocationInfo) -> bool {
        let added = {
            let mut perspective = self.perspective.write().await;
            match perspective.sessions.get_mut(&info.location.session_id) {
                Some(session) if !session.contains_link(&info.link_id) => {
                    session.locations.push(Some(info));
                    true
                }
                Some(_) => false,
                None => {
                    tracing::debug!(
                        "[WhereZvm] session {} not cached, ignoring location {}",
                        info.location.session_id,
                        info.link_id
                    );
                    false
                }
            }
        };
        if added {
            self.notify_subscribers().await;
        }
        added
    }

    /// Moves the Location at `idx` and optionally retags it.
    ///
    /// Publishes the modified copy as a new placement at the same session
    /// index, writes it into the slot, then deletes the old placement. A
    /// failed delete is tolerated: the cache keeps only the new Location and
    /// the old link is reported in [`UpdateOutcome::orphaned_link`].
    pub async fn update_location(
        &self,
        session_id: &SessionId,
        space_id: &SpaceId,
        idx: usize,
        coord: Coord,
        tag: Option<String>,
        emoji: Option<String>,
    ) -> Result<UpdateOutcome> {
        let current = self.live_location(session_id, idx).await?;
        let index = self.session_index(session_id).await?;
        let previous_link = current.link_id.clone();

        let mut location = current.location;
        location.coord = coord;
        if tag.is_some() {
            location.meta.tag = tag;
        }
        if emoji.is_some() {
            location.meta.emoji = emoji;
        }

        let link_id = self
            .add_here(space_id, index, dematerialize_here(&location))
            .await?;
        let info = LocationInfo {
            location,
            link_id,
            author: self.me.clone(),
        };

        let placement = {
            let mut perspective = self.perspective.write().await;
            let session = perspective.sessions.get_mut(session_id).ok_or_else(|| {
                WhereError::invalid_state(format!("session {} is not cached", session_id))
            })?;
            // The slot to replace is wherever the old link sits now.
            place(session, Some(&previous_link), info.clone())
        };
        if let Placement::Appended(at) = placement {
            tracing::debug!(
                "[WhereZvm] location {} of {} went away during update, appended at {}",
                idx,
                session_id,
                at
            );
        }
        self.notify_subscribers().await;

        let orphaned_link = match self.proxy.delete_here(&previous_link).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    "[WhereZvm] new placement {} kept but old placement {} could not be deleted: {}",
                    info.link_id,
                    previous_link,
                    e
                );
                self.orphaned_links
                    .write()
                    .await
                    .insert(previous_link.clone());
                Some(previous_link.clone())
            }
        };

        Ok(UpdateOutcome {
            info,
            index: placement.index(),
            previous_link,
            orphaned_link,
        })
    }

    /// Deletes the Location at `idx`, leaving a tombstone. Returns its link.
    pub async fn delete_location(&self, session_id: &SessionId, idx: usize) -> Result<LinkId> {
        let info = self.live_location(session_id, idx).await?;
        self.proxy.delete_here(&info.link_id).await?;
        self.remove_location(session_id, &info.link_id).await;
        Ok(info.link_id)
    }

    /// Tombstones the slot holding `link_id`. Returns `false` if no slot does.
    pub async fn remove_location(&self, session_id: &SessionId, link_id: &LinkId) -> bool {
        let removed = {
            let mut perspective = self.perspective.write().await;
            match perspective.sessions.get_mut(session_id) {
                Some(session) => match session.position_of(link_id) {
                    Some(idx) => {
                        session.locations[idx] = None;
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };
        if removed {
            self.notify_subscribers().await;
        }
        removed
    }

    /// Applies an update announced by a peer: the new placement replaces
    /// the Location linked by `previous_link`, or is appended if that link
    /// is gone. A slot authored by another agent is never replaced.
    ///
    /// Returns `false` when the new link is already cached or the session
    /// is not, or the entry cannot be decoded.
    pub async fn apply_remote_update(
        &self,
        previous_link: &LinkId,
        link_id: LinkId,
        entry: HereEntry,
        author: AgentId,
    ) -> bool {
        let session_id = entry.session_id.clone();
        let output = HereOutput {
            entry,
            link_id,
            author,
        };
        let info = match materialize_here(&output) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("[WhereZvm] dropping update in {}: {}", session_id, e);
                return false;
            }
        };

        let applied = {
            let mut perspective = self.perspective.write().await;
            match perspective.sessions.get_mut(&session_id) {
                Some(session) => {
                    let slot_author = session
                        .position_of(previous_link)
                        .and_then(|idx| session.locations[idx].as_ref())
                        .map(|slot| slot.author.clone());
                    let replaced = match slot_author {
                        Some(slot_author) if slot_author != info.author => {
                            tracing::warn!(
                                "[WhereZvm] {} is not the author of {}, appending its update",
                                info.author,
                                previous_link
                            );
                            None
                        }
                        _ => Some(previous_link),
                    };
                    !matches!(place(session, replaced, info), Placement::AlreadyPresent(_))
                }
                None => false,
            }
        };
        if applied {
            self.notify_subscribers().await;
        }
        applied
    }

    // ============================================================================
    // Visibility
    // ============================================================================

    pub async fn hide_play(&self, space_id: &SpaceId) -> Result<()> {
        self.set_visibility(space_id, false).await
    }

    pub async fn unhide_play(&self, space_id: &SpaceId) -> Result<()> {
        self.set_visibility(space_id, true).await
    }

    async fn set_visibility(&self, space_id: &SpaceId, visible: bool) -> Result<()> {
        if self.manifest(space_id).await.is_none() {
            return Err(WhereError::invalid_state(format!(
                "space {} has no manifest",
                space_id
            )));
        }
        if visible {
            self.proxy.unhide_space(space_id).await?;
        } else {
            self.proxy.hide_space(space_id).await?;
        }
        {
            let mut perspective = self.perspective.write().await;
            if let Some(manifest) = perspective.manifests.get_mut(space_id) {
                manifest.visible = visible;
            }
        }
        self.notify_subscribers().await;
        Ok(())
    }

    // ============================================================================
    // Peers
    // ============================================================================

    /// Fire-and-forget push of `payload` to `peers`.
    ///
    /// Self is never a recipient; with nobody left the push is skipped.
    /// Returns whether the push was handed to the channel.
    pub async fn notify_peers(&self, payload: &SignalPayload, peers: &[AgentId]) -> bool {
        let recipients: Vec<AgentId> = peers
            .iter()
            .filter(|peer| **peer != self.me)
            .cloned()
            .collect();
        if recipients.is_empty() {
            tracing::debug!(
                "[WhereZvm] no peer to notify of {}, skipping",
                payload.message.kind()
            );
            return false;
        }
        let value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("[WhereZvm] cannot encode {}: {}", payload.message.kind(), e);
                return false;
            }
        };
        match self.push.send(&self.zome_name, value, &recipients).await {
            Ok(()) => {
                tracing::debug!(
                    "[WhereZvm] sent {} to {} peer(s)",
                    payload.message.kind(),
                    recipients.len()
                );
                true
            }
            Err(e) => {
                tracing::warn!("[WhereZvm] push of {} failed: {}", payload.message.kind(), e);
                false
            }
        }
    }
}
