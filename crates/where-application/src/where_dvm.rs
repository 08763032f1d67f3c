//! Dna view-model of a Where instance.
//!
//! Composes the Where and Playset view-models of one backend instance,
//! drains the instance's push channel, keeps the presence table and
//! assembles Plays (a Space with its sessions).

use crate::context::HappContext;
use crate::playset_zvm::PlaysetZvm;
use crate::subscriber::{SubscriberRegistry, SubscriptionId};
use crate::where_zvm::{UpdateOutcome, WhereZvm};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use where_core::gateway::AppSignal;
use where_core::placement::{
    Coord, HereOutput, Location, LocationInfo, PlacementSession, PlacementSessionEntry, Play,
    PlayManifest, dematerialize_here, materialize_here,
};
use where_core::playset::{SpaceMat, SpaceMeta};
use where_core::presence::{PresenceStatus, PresenceTable, now_secs};
use where_core::signal::{Message, SignalPayload};
use where_core::{AgentId, Result, SessionId, SpaceId, WhereError};

/// Label a session gets when it is named after the day it covers.
pub fn session_label_for(date: chrono::NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Whether Locations of a session may still be changed: always when the
/// Space allows editing the past, otherwise only in today's session.
pub fn is_session_editable(meta: &SpaceMeta, session_name: &str, today: chrono::NaiveDate) -> bool {
    meta.can_modify_past || session_name == session_label_for(today)
}

/// State owned by the DVM itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereDvmPerspective {
    pub presence: PresenceTable,
    /// Agents announced by the host application, never including self.
    pub known_agents: BTreeSet<AgentId>,
    pub plays: HashMap<SpaceId, Play>,
    pub current_sessions: HashMap<SpaceId, SessionId>,
}

pub struct WhereDvm {
    ctx: HappContext,
    where_zvm: WhereZvm,
    playset_zvm: PlaysetZvm,
    perspective: RwLock<WhereDvmPerspective>,
    subscribers: SubscriberRegistry<WhereDvmPerspective>,
    listener: Mutex<Option<CancellationToken>>,
}

impl WhereDvm {
    pub fn new(ctx: HappContext) -> Self {
        Self {
            where_zvm: WhereZvm::new(&ctx),
            playset_zvm: PlaysetZvm::new(&ctx),
            ctx,
            perspective: RwLock::new(WhereDvmPerspective::default()),
            subscribers: SubscriberRegistry::new(),
            listener: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &HappContext {
        &self.ctx
    }

    pub fn me(&self) -> &AgentId {
        self.ctx.me()
    }

    pub fn where_zvm(&self) -> &WhereZvm {
        &self.where_zvm
    }

    pub fn playset_zvm(&self) -> &PlaysetZvm {
        &self.playset_zvm
    }

    pub async fn perspective(&self) -> WhereDvmPerspective {
        self.perspective.read().await.clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&WhereDvmPerspective) + Send + Sync + 'static,
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
    // Lifecycle
    // ============================================================================

    fn listener_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers as the instance's signal handler and starts draining
    /// signals on a tokio task. Attaching again replaces the previous task.
    pub fn attach(self: &Arc<Self>) {
        let mut signals = self.ctx.push.subscribe();
        let token = CancellationToken::new();
        if let Some(previous) = self.listener_slot().replace(token.clone()) {
            previous.cancel();
        }

        let dvm = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!("[WhereDvm] listening for signals on {}", dvm.ctx.cell_id);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    signal = signals.recv() => match signal {
                        Some(signal) => dvm.handle_signal(signal).await,
                        None => break,
                    },
                }
            }
            tracing::info!("[WhereDvm] stopped listening on {}", dvm.ctx.cell_id);
        });
    }

    /// Stops the signal task. Returns `false` if none was running.
    pub fn detach(&self) -> bool {
        match self.listener_slot().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener_slot()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    // ============================================================================
    // Signal routing
    // ============================================================================

    /// Routes one pushed signal.
    ///
    /// Signals for another instance or another zome are dropped. Any other
    /// signal refreshes the sender's presence and is acknowledged with a
    /// Pong unless it is one. Failures to fetch referenced entities are
    /// logged and the signal is dropped.
    pub async fn handle_signal(&self, signal: AppSignal) {
        if signal.cell_id != self.ctx.cell_id {
            tracing::debug!(
                "[WhereDvm] dropping signal for foreign instance {}",
                signal.cell_id
            );
            return;
        }
        if signal.zome_name != self.ctx.config.where_zome {
            tracing::trace!("[WhereDvm] ignoring signal from zome {}", signal.zome_name);
            return;
        }
        let payload: SignalPayload = match serde_json::from_value(signal.payload) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("[WhereDvm] dropping undecodable signal: {}", e);
                return;
            }
        };

        let SignalPayload {
            maybe_space_hash,
            from,
            message,
        } = payload;
        tracing::debug!("[WhereDvm] received {} from {}", message.kind(), from);

        self.record_presence(&from, now_secs()).await;
        if !message.is_pong() {
            let pong = SignalPayload::pong(maybe_space_hash.clone(), self.me());
            self.where_zvm
                .notify_peers(&pong, std::slice::from_ref(&from))
                .await;
        }

        match message {
            Message::Ping(_) | Message::Pong(_) => {}
            Message::NewSpace(space_id) => self.on_new_space(&space_id).await,
            Message::NewSession(session_id, entry) => self.on_new_session(session_id, entry).await,
            Message::NewHere(output) => self.on_new_here(maybe_space_hash.as_ref(), output).await,
            Message::DeleteHere(session_id, link_id) => {
                self.where_zvm.remove_location(&session_id, &link_id).await;
            }
            Message::UpdateHere(previous_link, link_id, entry) => {
                self.where_zvm
                    .apply_remote_update(&previous_link, link_id, entry, from)
                    .await;
            }
            Message::NewTemplate(id) => {
                if self.playset_zvm.template(&id).await.is_none()
                    && let Err(e) = self.playset_zvm.fetch_template(&id).await
                {
                    tracing::warn!("[WhereDvm] cannot fetch announced template {}: {}", id, e);
                }
            }
            Message::NewSvgMarker(id) => {
                if self.playset_zvm.svg_marker(&id).await.is_none()
                    && let Err(e) = self.playset_zvm.fetch_svg_marker(&id).await
                {
                    tracing::warn!("[WhereDvm] cannot fetch announced svg marker {}: {}", id, e);
                }
            }
            Message::NewEmojiGroup(id) => {
                if self.playset_zvm.emoji_group(&id).await.is_none()
                    && let Err(e) = self.playset_zvm.fetch_emoji_group(&id).await
                {
                    tracing::warn!("[WhereDvm] cannot fetch announced emoji group {}: {}", id, e);
                }
            }
        }
    }

    async fn on_new_space(&self, space_id: &SpaceId) {
        if self.where_zvm.manifest(space_id).await.is_some() {
            tracing::debug!("[WhereDvm] space {} already known", space_id);
            return;
        }
        match self.where_zvm.probe_manifest(space_id).await {
            Ok(Some(manifest)) => {
                if let Err(e) = self.assemble_play(space_id, &manifest).await {
                    tracing::warn!("[WhereDvm] cannot load announced space {}: {}", space_id, e);
                }
            }
            Ok(None) => tracing::debug!("[WhereDvm] announced space {} has no session yet", space_id),
            Err(e) => tracing::warn!("[WhereDvm] cannot probe announced space {}: {}", space_id, e),
        }
    }

    async fn on_new_session(&self, session_id: SessionId, entry: PlacementSessionEntry) {
        let session = PlacementSession::new(entry.name.clone(), entry.index);
        self.where_zvm
            .add_session(&entry.space_id, session_id.clone(), session)
            .await;
        let changed = {
            let mut perspective = self.perspective.write().await;
            match perspective.plays.get_mut(&entry.space_id) {
                Some(play) if !play.sessions.contains_key(&entry.name) => {
                    play.sessions.insert(entry.name, session_id);
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.notify_subscribers().await;
        }
    }

    async fn on_new_here(&self, space_id: Option<&SpaceId>, output: HereOutput) {
        let session_id = output.entry.session_id.clone();
        if self.where_zvm.session(&session_id).await.is_some() {
            match materialize_here(&output) {
                Ok(info) => {
                    self.where_zvm.add_location(info).await;
                }
                Err(e) => tracing::warn!("[WhereDvm] dropping announced location: {}", e),
            }
            return;
        }
        let space_known = match space_id {
            Some(space_id) => self.where_zvm.manifest(space_id).await.is_some(),
            None => false,
        };
        if !space_known {
            tracing::debug!(
                "[WhereDvm] location {} is for unknown session {}, dropping",
                output.link_id,
                session_id
            );
            return;
        }
        if let Err(e) = self.where_zvm.probe_session(&session_id).await {
            tracing::warn!("[WhereDvm] cannot load session {}: {}", session_id, e);
        }
    }

    // ============================================================================
    // Presence
    // ============================================================================

    async fn record_presence(&self, agent: &AgentId, at: i64) {
        self.perspective
            .write()
            .await
            .presence
            .record(agent.clone(), at);
        self.notify_subscribers().await;
    }

    pub async fn last_seen(&self, agent: &AgentId) -> Option<i64> {
        self.perspective.read().await.presence.last_seen(agent)
    }

    pub async fn presence_status(&self, agent: &AgentId) -> PresenceStatus {
        self.presence_status_at(agent, now_secs()).await
    }

    pub async fn presence_status_at(&self, agent: &AgentId, now: i64) -> PresenceStatus {
        self.perspective
            .read()
            .await
            .presence
            .status(agent, self.me(), now, &self.ctx.config.presence)
    }

    /// Adds agents the host application knows about (e.g. from profiles).
    pub async fn register_agents(&self, agents: &[AgentId]) {
        let me = self.me().clone();
        {
            let mut perspective = self.perspective.write().await;
            perspective
                .known_agents
                .extend(agents.iter().filter(|agent| **agent != me).cloned());
        }
        self.notify_subscribers().await;
    }

    /// Every agent ever registered or heard from, except self.
    pub async fn all_others(&self) -> Vec<AgentId> {
        let perspective = self.perspective.read().await;
        let mut others: BTreeSet<AgentId> = perspective.known_agents.clone();
        others.extend(perspective.presence.agents().cloned());
        others.remove(self.me());
        others.into_iter().collect()
    }

    /// Peers heard from recently enough to be worth notifying.
    pub async fn all_current_others(&self) -> Vec<AgentId> {
        self.all_current_others_at(now_secs()).await
    }

    pub async fn all_current_others_at(&self, now: i64) -> Vec<AgentId> {
        let window = self.ctx.config.presence.current_others_secs;
        let perspective = self.perspective.read().await;
        let mut others: Vec<AgentId> = perspective
            .presence
            .agents()
            .filter(|agent| *agent != self.me())
            .filter(|agent| {
                perspective
                    .presence
                    .last_seen(agent)
                    .is_some_and(|seen| now - seen < window)
            })
            .cloned()
            .collect();
        others.sort();
        others
    }

    /// Pings every known peer. Returns whether a push went out.
    pub async fn ping_others(&self, space_id: Option<&SpaceId>) -> bool {
        let others = self.all_others().await;
        let ping = SignalPayload::ping(space_id.cloned(), self.me());
        self.where_zvm.notify_peers(&ping, &others).await
    }

    async fn broadcast(&self, space_id: &SpaceId, message: Message) {
        let others = self.all_current_others().await;
        let payload = SignalPayload::new(Some(space_id.clone()), self.me().clone(), message);
        self.where_zvm.notify_peers(&payload, &others).await;
    }

    // ============================================================================
    // Plays
    // ============================================================================

    pub async fn plays(&self) -> HashMap<SpaceId, Play> {
        self.perspective.read().await.plays.clone()
    }

    pub async fn play(&self, space_id: &SpaceId) -> Option<Play> {
        self.perspective.read().await.plays.get(space_id).cloned()
    }

    async fn add_play(&self, space_id: &SpaceId, play: Play, first_session: Option<SessionId>) {
        {
            let mut perspective = self.perspective.write().await;
            perspective.plays.insert(space_id.clone(), play);
            if let Some(first) = first_session {
                perspective
                    .current_sessions
                    .entry(space_id.clone())
                    .or_insert(first);
            }
        }
        self.notify_subscribers().await;
    }

    /// Loads the Space and every session of an already probed manifest.
    async fn assemble_play(
        &self,
        space_id: &SpaceId,
        manifest: &PlayManifest,
    ) -> Result<Option<Play>> {
        let space = match self.playset_zvm.space(space_id).await {
            Some(space) => space,
            None => self.playset_zvm.fetch_space(space_id).await?,
        };

        let mut sessions = BTreeMap::new();
        let mut first_session = None;
        for session_id in &manifest.session_ids {
            match self.where_zvm.probe_session(session_id).await {
                Ok(session) => {
                    first_session.get_or_insert_with(|| session_id.clone());
                    sessions.insert(session.name, session_id.clone());
                }
                Err(e) => tracing::warn!(
                    "[WhereDvm] skipping session {} of space {}: {}",
                    session_id,
                    space_id,
                    e
                ),
            }
        }
        if sessions.is_empty() {
            return Ok(None);
        }

        let play = Play { space, sessions };
        self.add_play(space_id, play.clone(), first_session).await;
        Ok(Some(play))
    }

    /// Loads a Play. `None` when the Space has no session.
    pub async fn probe_play(&self, space_id: &SpaceId) -> Result<Option<Play>> {
        match self.where_zvm.probe_manifest(space_id).await? {
            Some(manifest) => self.assemble_play(space_id, &manifest).await,
            None => Ok(None),
        }
    }

    /// Reloads the Space list and loads a Play for each. A Space that fails
    /// is logged and skipped. Returns the Spaces that have a Play.
    pub async fn probe_all_plays(&self) -> Result<Vec<SpaceId>> {
        self.playset_zvm.probe_spaces().await?;
        let space_ids: Vec<SpaceId> = self
            .playset_zvm
            .perspective()
            .await
            .spaces
            .into_keys()
            .collect();

        let mut loaded = Vec::new();
        for space_id in space_ids {
            match self.probe_play(&space_id).await {
                Ok(Some(_)) => loaded.push(space_id),
                Ok(None) => tracing::debug!("[WhereDvm] space {} has no play", space_id),
                Err(e) => tracing::warn!("[WhereDvm] cannot load play {}: {}", space_id, e),
            }
        }
        tracing::info!("[WhereDvm] loaded {} play(s)", loaded.len());
        Ok(loaded)
    }

    /// Full refresh: the catalog, then every Play.
    pub async fn probe_all(&self) -> Result<Vec<SpaceId>> {
        self.playset_zvm.probe_all().await?;
        self.probe_all_plays().await
    }

    /// Publishes a Space with its first sessions and announces it.
    ///
    /// Without names a single session called after the configured default
    /// is created.
    pub async fn construct_new_play(
        &self,
        space: SpaceMat,
        session_names: Vec<String>,
    ) -> Result<SpaceId> {
        let names = if session_names.is_empty() {
            vec![self.ctx.config.default_session_name.clone()]
        } else {
            session_names
        };

        let space_id = self.playset_zvm.publish_space(space.clone()).await?;
        let session_ids = self.where_zvm.create_sessions(&space_id, &names).await?;

        let sessions = names.into_iter().zip(session_ids.iter().cloned()).collect();
        self.add_play(&space_id, Play { space, sessions }, session_ids.first().cloned())
            .await;
        tracing::info!("[WhereDvm] constructed play {}", space_id);

        self.broadcast(&space_id, Message::NewSpace(space_id.clone()))
            .await;
        Ok(space_id)
    }

    pub async fn current_session(&self, space_id: &SpaceId) -> Option<SessionId> {
        self.perspective
            .read()
            .await
            .current_sessions
            .get(space_id)
            .cloned()
    }

    pub async fn set_current_session(&self, space_id: &SpaceId, session_id: &SessionId) -> Result<()> {
        let belongs = self
            .where_zvm
            .manifest(space_id)
            .await
            .is_some_and(|manifest| manifest.session_ids.contains(session_id));
        if !belongs {
            return Err(WhereError::invalid_state(format!(
                "session {} is not part of space {}",
                session_id, space_id
            )));
        }
        self.perspective
            .write()
            .await
            .current_sessions
            .insert(space_id.clone(), session_id.clone());
        self.notify_subscribers().await;
        Ok(())
    }

    pub async fn hide_play(&self, space_id: &SpaceId) -> Result<()> {
        self.where_zvm.hide_play(space_id).await
    }

    pub async fn unhide_play(&self, space_id: &SpaceId) -> Result<()> {
        self.where_zvm.unhide_play(space_id).await
    }

    // ============================================================================
    // Mutations announced to peers
    // ============================================================================

    pub async fn create_next_session(&self, space_id: &SpaceId, name: &str) -> Result<SessionId> {
        let (session_id, index) = self.where_zvm.create_next_session(space_id, name).await?;
        let changed = {
            let mut perspective = self.perspective.write().await;
            match perspective.plays.get_mut(space_id) {
                Some(play) => {
                    play.sessions.insert(name.to_string(), session_id.clone());
                    true
                }
                None => false,
            }
        };
        if changed {
            self.notify_subscribers().await;
        }

        let entry = PlacementSessionEntry {
            name: name.to_string(),
            index,
            space_id: space_id.clone(),
        };
        self.broadcast(space_id, Message::NewSession(session_id.clone(), entry))
            .await;
        Ok(session_id)
    }

    pub async fn publish_location(
        &self,
        location: Location,
        space_id: &SpaceId,
    ) -> Result<LocationInfo> {
        let info = self.where_zvm.publish_location(location, space_id).await?;
        let output = HereOutput {
            entry: dematerialize_here(&info.location),
            link_id: info.link_id.clone(),
            author: info.author.clone(),
        };
        self.broadcast(space_id, Message::NewHere(output)).await;
        Ok(info)
    }

    pub async fn update_location(
        &self,
        session_id: &SessionId,
        space_id: &SpaceId,
        idx: usize,
        coord: Coord,
        tag: Option<String>,
        emoji: Option<String>,
    ) -> Result<UpdateOutcome> {
        let outcome = self
            .where_zvm
            .update_location(session_id, space_id, idx, coord, tag, emoji)
            .await?;
        let message = Message::UpdateHere(
            outcome.previous_link.clone(),
            outcome.info.link_id.clone(),
            dematerialize_here(&outcome.info.location),
        );
        self.broadcast(space_id, message).await;
        Ok(outcome)
    }

    pub async fn delete_location(
        &self,
        session_id: &SessionId,
        space_id: &SpaceId,
        idx: usize,
    ) -> Result<()> {
        let link_id = self.where_zvm.delete_location(session_id, idx).await?;
        self.broadcast(space_id, Message::DeleteHere(session_id.clone(), link_id))
            .await;
        Ok(())
    }

    /// Deletes every Location of self in the current session of `space_id`.
    ///
    /// Does nothing when that session can no longer be edited. Returns the
    /// number of deleted Locations.
    pub async fn delete_all_my_locations(&self, space_id: &SpaceId) -> Result<usize> {
        let session_id = self.current_session(space_id).await.ok_or_else(|| {
            WhereError::invalid_state(format!("space {} has no current session", space_id))
        })?;
        let session = self.where_zvm.session(&session_id).await.ok_or_else(|| {
            WhereError::invalid_state(format!("session {} is not cached", session_id))
        })?;
        let meta = self
            .playset_zvm
            .space(space_id)
            .await
            .map(|space| space.meta)
            .unwrap_or_default();
        let today = chrono::Local::now().date_naive();
        if !is_session_editable(&meta, &session.name, today) {
            tracing::debug!("[WhereDvm] session '{}' is read-only", session.name);
            return Ok(0);
        }

        let mine: Vec<usize> = session
            .live_locations()
            .filter(|(_, info)| &info.author == self.me())
            .map(|(idx, _)| idx)
            .collect();
        for idx in &mine {
            self.delete_location(&session_id, space_id, *idx).await?;
        }
        Ok(mine.len())
    }

    /// First live Location placed under `author_name` in the current session.
    pub async fn peer_first_location(
        &self,
        space_id: &SpaceId,
        author_name: &str,
    ) -> Option<LocationInfo> {
        let session_id = self.current_session(space_id).await?;
        let session = self.where_zvm.session(&session_id).await?;
        session
            .live_locations()
            .find(|(_, info)| info.location.meta.author_name.as_deref() == Some(author_name))
            .map(|(_, info)| info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockGateway, MockPush, alice, bob, cell, context};
    use serde_json::json;
    use where_core::{CellId, LinkId};
    use where_core::gateway::{playset_fn, where_fn};
    use where_core::placement::LocationMeta;

    fn space() -> SpaceId {
        SpaceId::new("uhCEkSpace")
    }

    fn dvm() -> (WhereDvm, Arc<MockGateway>, Arc<MockPush>) {
        let (ctx, gateway, push) = context();
        (WhereDvm::new(ctx), gateway, push)
    }

    fn signal(payload: &SignalPayload) -> AppSignal {
        AppSignal {
            cell_id: cell(),
            zome_name: "where".to_string(),
            payload: serde_json::to_value(payload).unwrap(),
        }
    }

    fn space_entry() -> serde_json::Value {
        json!({
            "name": "Office",
            "origin": "uhCEkTemplate",
            "surface": "{}",
        })
    }

    fn here(link: &str, session: &SessionId, author: &AgentId, name: &str) -> HereOutput {
        HereOutput {
            entry: where_core::placement::HereEntry {
                value: json!({ "x": 1.0, "y": 2.0 }).to_string(),
                session_id: session.clone(),
                meta: [("authorName".to_string(), format!("\"{}\"", name))].into(),
            },
            link_id: link.into(),
            author: author.clone(),
        }
    }

    /// A dvm with one Play of one empty session.
    async fn with_play(session_name: &str) -> (WhereDvm, Arc<MockGateway>, Arc<MockPush>, SessionId) {
        let (dvm, gateway, push) = dvm();
        gateway.respond(playset_fn::CREATE_SPACE, json!(space()));
        gateway.respond(where_fn::CREATE_SESSIONS, json!(["uhCEkS0"]));
        let space_mat = where_core::playset::materialize_space(
            &serde_json::from_value(space_entry()).unwrap(),
        )
        .unwrap();
        dvm.construct_new_play(space_mat, vec![session_name.to_string()])
            .await
            .unwrap();
        (dvm, gateway, push, SessionId::new("uhCEkS0"))
    }

    #[tokio::test]
    async fn test_foreign_instance_signal_is_dropped() {
        let (dvm, _gateway, push) = dvm();
        let mut foreign = signal(&SignalPayload::ping(None, &bob()));
        foreign.cell_id = CellId::new("uhC0kOther", alice());

        dvm.handle_signal(foreign).await;

        assert_eq!(dvm.last_seen(&bob()).await, None);
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_other_zome_and_garbage_are_ignored() {
        let (dvm, _gateway, push) = dvm();
        let mut profiles = signal(&SignalPayload::ping(None, &bob()));
        profiles.zome_name = "profiles".to_string();
        dvm.handle_signal(profiles).await;

        let mut garbage = signal(&SignalPayload::ping(None, &bob()));
        garbage.payload = json!({ "message": { "type": "Teleport" } });
        dvm.handle_signal(garbage).await;

        assert_eq!(dvm.last_seen(&bob()).await, None);
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_ping_records_presence_and_pongs_sender() {
        let (dvm, _gateway, push) = dvm();

        dvm.handle_signal(signal(&SignalPayload::ping(None, &bob())))
            .await;

        assert!(dvm.last_seen(&bob()).await.is_some());
        assert_eq!(dvm.presence_status(&bob()).await, PresenceStatus::Online);
        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, vec![bob()]);
        assert_eq!(push.sent_kinds(), vec!["Pong"]);
    }

    #[tokio::test]
    async fn test_pong_is_not_answered() {
        let (dvm, _gateway, push) = dvm();

        dvm.handle_signal(signal(&SignalPayload::pong(None, &bob())))
            .await;

        assert!(dvm.last_seen(&bob()).await.is_some());
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_presence_decay_and_self() {
        let (dvm, _gateway, _push) = dvm();
        dvm.record_presence(&bob(), 1_000).await;

        assert_eq!(dvm.presence_status_at(&bob(), 1_031).await, PresenceStatus::Away);
        assert_eq!(dvm.presence_status_at(&bob(), 1_301).await, PresenceStatus::Offline);
        assert_eq!(dvm.presence_status_at(&alice(), 99_999).await, PresenceStatus::Online);
        assert_eq!(
            dvm.presence_status_at(&AgentId::new("uhCAkNobody"), 1_000).await,
            PresenceStatus::Offline
        );
    }

    #[tokio::test]
    async fn test_current_others_exclude_self_and_stale() {
        let (dvm, _gateway, _push) = dvm();
        let carol = AgentId::new("uhCAkCarol");
        dvm.record_presence(&alice(), 1_000).await;
        dvm.record_presence(&bob(), 1_000).await;
        dvm.record_presence(&carol, 600).await;
        dvm.register_agents(&[AgentId::new("uhCAkDave"), alice()]).await;

        assert_eq!(dvm.all_current_others_at(1_010).await, vec![bob()]);
        assert_eq!(dvm.all_others().await.len(), 3);
    }

    #[tokio::test]
    async fn test_ping_others_targets_every_known_peer() {
        let (dvm, _gateway, push) = dvm();
        assert!(!dvm.ping_others(Some(&space())).await);

        dvm.register_agents(&[bob(), AgentId::new("uhCAkCarol")]).await;
        assert!(dvm.ping_others(Some(&space())).await);

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.len(), 2);
        assert_eq!(sent[0].0["maybeSpaceHash"], json!(space()));
    }

    #[tokio::test]
    async fn test_new_space_probes_manifest_once() {
        let (dvm, gateway, _push) = dvm();
        gateway.respond(where_fn::GET_SPACE_SESSIONS, json!(["uhCEkS0"]));
        gateway.respond(where_fn::GET_HIDDEN_SPACES, json!([]));
        gateway.respond(playset_fn::GET_SPACE, space_entry());
        gateway.respond(
            where_fn::GET_SESSION_FROM_EH,
            json!({ "name": "global", "index": 0, "spaceEh": space() }),
        );
        gateway.respond(where_fn::GET_HERES, json!([]));
        let announce = SignalPayload::new(Some(space()), bob(), Message::NewSpace(space()));

        dvm.handle_signal(signal(&announce)).await;
        dvm.handle_signal(signal(&announce)).await;

        assert_eq!(gateway.call_count(where_fn::GET_SPACE_SESSIONS), 1);
        let play = dvm.play(&space()).await.unwrap();
        assert_eq!(play.space.name, "Office");
        assert_eq!(play.sessions["global"], SessionId::new("uhCEkS0"));
        assert_eq!(
            dvm.current_session(&space()).await,
            Some(SessionId::new("uhCEkS0"))
        );
    }

    #[tokio::test]
    async fn test_new_space_without_sessions_creates_nothing() {
        let (dvm, gateway, _push) = dvm();
        gateway.respond(where_fn::GET_SPACE_SESSIONS, json!([]));
        let announce = SignalPayload::new(Some(space()), bob(), Message::NewSpace(space()));

        dvm.handle_signal(signal(&announce)).await;

        assert!(dvm.where_zvm().manifest(&space()).await.is_none());
        assert!(dvm.plays().await.is_empty());
        assert_eq!(gateway.call_count(playset_fn::GET_SPACE), 0);
    }

    #[tokio::test]
    async fn test_construct_new_play_defaults_and_announces() {
        let (dvm, gateway, push) = dvm();
        dvm.handle_signal(signal(&SignalPayload::ping(None, &bob())))
            .await;
        gateway.respond(playset_fn::CREATE_SPACE, json!(space()));
        gateway.respond(where_fn::CREATE_SESSIONS, json!(["uhCEkS0"]));
        let space_mat = where_core::playset::materialize_space(
            &serde_json::from_value(space_entry()).unwrap(),
        )
        .unwrap();

        let space_id = dvm.construct_new_play(space_mat, Vec::new()).await.unwrap();

        assert_eq!(space_id, space());
        let call = &gateway.calls_to(where_fn::CREATE_SESSIONS)[0];
        assert_eq!(call["sessionNames"], json!(["global"]));
        assert_eq!(push.sent_kinds(), vec!["Pong", "NewSpace"]);
        assert_eq!(
            dvm.current_session(&space()).await,
            Some(SessionId::new("uhCEkS0"))
        );
    }

    #[tokio::test]
    async fn test_new_here_twice_is_added_once() {
        let (dvm, _gateway, _push, session) = with_play("global").await;
        let announce = SignalPayload::new(
            Some(space()),
            bob(),
            Message::NewHere(here("uhCkkBob", &session, &bob(), "bob")),
        );

        dvm.handle_signal(signal(&announce)).await;
        dvm.handle_signal(signal(&announce)).await;

        let cached = dvm.where_zvm().session(&session).await.unwrap();
        assert_eq!(cached.locations.len(), 1);
    }

    #[tokio::test]
    async fn test_new_here_for_unknown_space_is_dropped() {
        let (dvm, gateway, _push) = dvm();
        let session = SessionId::new("uhCEkElsewhere");
        let announce = SignalPayload::new(
            Some(SpaceId::new("uhCEkUnknown")),
            bob(),
            Message::NewHere(here("uhCkkBob", &session, &bob(), "bob")),
        );

        dvm.handle_signal(signal(&announce)).await;

        assert!(dvm.where_zvm().session(&session).await.is_none());
        assert_eq!(gateway.call_count(where_fn::GET_SESSION_FROM_EH), 0);
    }

    #[tokio::test]
    async fn test_delete_and_update_signals() {
        let (dvm, _gateway, _push, session) = with_play("global").await;
        for link in ["uhCkk0", "uhCkk1"] {
            let announce = SignalPayload::new(
                Some(space()),
                bob(),
                Message::NewHere(here(link, &session, &bob(), "bob")),
            );
            dvm.handle_signal(signal(&announce)).await;
        }

        let delete = SignalPayload::new(
            Some(space()),
            bob(),
            Message::DeleteHere(session.clone(), "uhCkk0".into()),
        );
        dvm.handle_signal(signal(&delete)).await;
        let moved = here("uhCkkMoved", &session, &bob(), "bob");
        let update = SignalPayload::new(
            Some(space()),
            bob(),
            Message::UpdateHere("uhCkk1".into(), moved.link_id.clone(), moved.entry.clone()),
        );
        dvm.handle_signal(signal(&update)).await;

        let cached = dvm.where_zvm().session(&session).await.unwrap();
        assert_eq!(cached.locations.len(), 2);
        assert!(cached.locations[0].is_none());
        let slot = cached.locations[1].as_ref().unwrap();
        assert_eq!(slot.link_id, LinkId::new("uhCkkMoved"));
        assert_eq!(slot.author, bob());
    }

    #[tokio::test]
    async fn test_peer_update_follows_its_link_not_its_index() {
        let (dvm, gateway, _push, session) = with_play("global").await;
        gateway.respond(where_fn::ADD_HERE, json!("uhCkkAliceOwn"));
        let mine = Location {
            coord: Coord::new(1.0, 1.0),
            session_id: session.clone(),
            meta: LocationMeta::default(),
        };
        dvm.publish_location(mine, &space()).await.unwrap();
        let announce = SignalPayload::new(
            Some(space()),
            bob(),
            Message::NewHere(here("uhCkkBobOld", &session, &bob(), "bob")),
        );
        dvm.handle_signal(signal(&announce)).await;

        // Bob's own cache holds his marker at index 0.
        let moved = here("uhCkkBobNew", &session, &bob(), "bob");
        let update = SignalPayload::new(
            Some(space()),
            bob(),
            Message::UpdateHere("uhCkkBobOld".into(), moved.link_id.clone(), moved.entry.clone()),
        );
        dvm.handle_signal(signal(&update)).await;

        let cached = dvm.where_zvm().session(&session).await.unwrap();
        let links: Vec<_> = cached
            .locations
            .iter()
            .map(|slot| slot.as_ref().map(|info| info.link_id.clone()))
            .collect();
        assert_eq!(
            links,
            vec![
                Some(LinkId::new("uhCkkAliceOwn")),
                Some(LinkId::new("uhCkkBobNew"))
            ]
        );
        assert_eq!(cached.locations[0].as_ref().unwrap().author, alice());
    }

    #[tokio::test]
    async fn test_new_session_signal_extends_play() {
        let (dvm, _gateway, _push, _session) = with_play("global").await;
        let entry = PlacementSessionEntry {
            name: "day 2".to_string(),
            index: 1,
            space_id: space(),
        };
        let announce = SignalPayload::new(
            Some(space()),
            bob(),
            Message::NewSession(SessionId::new("uhCEkS1"), entry),
        );

        dvm.handle_signal(signal(&announce)).await;
        dvm.handle_signal(signal(&announce)).await;

        let manifest = dvm.where_zvm().manifest(&space()).await.unwrap();
        assert_eq!(manifest.session_ids.len(), 2);
        let play = dvm.play(&space()).await.unwrap();
        assert_eq!(play.sessions["day 2"], SessionId::new("uhCEkS1"));
    }

    #[tokio::test]
    async fn test_publish_location_announces_new_here() {
        let (dvm, gateway, push, session) = with_play("global").await;
        dvm.record_presence(&bob(), now_secs()).await;
        gateway.respond(where_fn::ADD_HERE, json!("uhCkkMine"));
        let location = Location {
            coord: Coord::new(3.0, 4.0),
            session_id: session,
            meta: LocationMeta::default(),
        };

        dvm.publish_location(location, &space()).await.unwrap();

        assert_eq!(push.sent_kinds(), vec!["NewHere"]);
        let (payload, recipients) = &push.sent()[0];
        assert_eq!(recipients, &vec![bob()]);
        assert_eq!(payload["message"]["content"]["linkAh"], json!("uhCkkMine"));
    }

    #[tokio::test]
    async fn test_delete_all_my_locations_spares_peers() {
        let (dvm, gateway, _push, session) = with_play("global").await;
        let peer = SignalPayload::new(
            Some(space()),
            bob(),
            Message::NewHere(here("uhCkkBob", &session, &bob(), "bob")),
        );
        dvm.handle_signal(signal(&peer)).await;
        for link in ["uhCkkA1", "uhCkkA2"] {
            gateway.respond(where_fn::ADD_HERE, json!(link));
            let location = Location {
                coord: Coord::new(0.0, 0.0),
                session_id: session.clone(),
                meta: LocationMeta::default(),
            };
            dvm.publish_location(location, &space()).await.unwrap();
        }
        gateway.respond(where_fn::DELETE_HERE, json!(null));
        gateway.respond(where_fn::DELETE_HERE, json!(null));

        let deleted = dvm.delete_all_my_locations(&space()).await.unwrap();

        assert_eq!(deleted, 2);
        let cached = dvm.where_zvm().session(&session).await.unwrap();
        assert_eq!(cached.live_locations().count(), 1);
        assert_eq!(
            dvm.peer_first_location(&space(), "bob").await.unwrap().link_id,
            LinkId::new("uhCkkBob")
        );
        assert!(dvm.peer_first_location(&space(), "carol").await.is_none());
    }

    #[test]
    fn test_session_editability() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut meta = SpaceMeta::default();
        assert!(is_session_editable(&meta, "global", today));

        meta.can_modify_past = false;
        assert!(is_session_editable(&meta, "09/03/2024", today));
        assert!(!is_session_editable(&meta, "08/03/2024", today));
    }

    #[tokio::test]
    async fn test_set_current_session_checks_membership() {
        let (dvm, _gateway, _push, session) = with_play("global").await;

        let err = dvm
            .set_current_session(&space(), &SessionId::new("uhCEkStranger"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
        dvm.set_current_session(&space(), &session).await.unwrap();
    }
}
