//! In-process backend for demos and tests.
//!
//! [`LocalConductor`] keeps the state of several dnas in memory and hands out
//! [`LocalCell`]s, one per (dna, agent), that implement both collaborator
//! ports. Calls are answered synchronously from that state; pushes are
//! delivered to the handler registered by the recipient's cell of the same
//! dna. Failures can be injected per function.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;
use where_core::gateway::{
    AppSignal, ExportPieceInput, ExportPlaysetInput, ExportSpaceInput, PushChannel, ZomeGateway,
    ludotheque_fn, playset_fn, where_fn,
};
use where_core::placement::{
    AddHereInput, CreateNextSessionInput, HereEntry, HereOutput, PlacementSessionEntry,
    SpaceSessionsInput,
};
use where_core::playset::{
    EmojiGroup, Hashed, Inventory, MarkerPiece, PieceKind, Playset, Space, SvgMarker, Template,
};
use where_core::{AgentId, CellId, DnaId, EntryId, LinkId, Result, SessionId, SpaceId, WhereError};

/// Content address of `content`, stable across calls and dnas.
fn content_address<T: Serialize>(kind: &str, content: &T) -> Result<EntryId> {
    let bytes = serde_json::to_vec(content)?;
    let mut name = kind.as_bytes().to_vec();
    name.push(b':');
    name.extend(bytes);
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, &name);
    Ok(EntryId::new(format!("uhCEk{}", uuid.simple())))
}

fn new_link() -> LinkId {
    LinkId::new(format!("uhCkk{}", Uuid::new_v4().simple()))
}

/// Entries of one kind in creation order, deduplicated by address.
#[derive(Debug, Clone)]
struct Catalog<T> {
    order: Vec<EntryId>,
    items: HashMap<EntryId, T>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }
}

impl<T: Clone + Serialize> Catalog<T> {
    fn insert(&mut self, kind: &str, item: T) -> Result<EntryId> {
        let id = content_address(kind, &item)?;
        if !self.items.contains_key(&id) {
            self.order.push(id.clone());
            self.items.insert(id.clone(), item);
        }
        Ok(id)
    }

    fn get(&self, id: &EntryId) -> Option<T> {
        self.items.get(id).cloned()
    }

    fn all(&self) -> Vec<Hashed<EntryId, T>> {
        self.order
            .iter()
            .filter_map(|id| {
                self.items.get(id).map(|item| Hashed {
                    hash: id.clone(),
                    content: item.clone(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct HereRecord {
    link_id: LinkId,
    entry: HereEntry,
    author: AgentId,
    deleted: bool,
}

#[derive(Debug, Default)]
struct DnaState {
    templates: Catalog<Template>,
    svg_markers: Catalog<SvgMarker>,
    emoji_groups: Catalog<EmojiGroup>,
    spaces: Catalog<Space>,
    playsets: Catalog<Playset>,
    sessions: HashMap<SessionId, PlacementSessionEntry>,
    space_sessions: HashMap<SpaceId, Vec<SessionId>>,
    heres: Vec<HereRecord>,
    hidden: HashMap<AgentId, BTreeSet<SpaceId>>,
}

impl DnaState {
    fn create_session(&mut self, space_id: &SpaceId, name: &str) -> Result<(SessionId, u32)> {
        let sessions = self.space_sessions.entry(space_id.clone()).or_default();
        let entry = PlacementSessionEntry {
            name: name.to_string(),
            index: sessions.len() as u32,
            space_id: space_id.clone(),
        };
        let id = SessionId::new(content_address("PlacementSession", &entry)?.as_str());
        sessions.push(id.clone());
        let index = entry.index;
        self.sessions.insert(id.clone(), entry);
        Ok((id, index))
    }

    fn inventory(&self) -> Inventory {
        Inventory {
            templates: self.templates.order.clone(),
            svg_markers: self.svg_markers.order.clone(),
            emoji_groups: self.emoji_groups.order.clone(),
            spaces: self.spaces.order.clone(),
        }
    }
}

#[derive(Default)]
struct Network {
    dnas: HashMap<DnaId, DnaState>,
    handlers: HashMap<CellId, mpsc::UnboundedSender<AppSignal>>,
    calls: Vec<(CellId, String)>,
    failures: HashMap<String, usize>,
    signals_delivered: usize,
}

/// Shared in-memory backend.
#[derive(Clone, Default)]
pub struct LocalConductor {
    network: Arc<Mutex<Network>>,
}

impl LocalConductor {
    pub fn new() -> Self {
        Self::default()
    }

    fn network(&self) -> MutexGuard<'_, Network> {
        lock(&self.network)
    }

    /// The cell of `agent` in `dna`. Cells of the same dna share state.
    pub fn cell(&self, dna: impl Into<DnaId>, agent: impl Into<AgentId>) -> Arc<LocalCell> {
        let cell_id = CellId::new(dna, agent);
        self.network()
            .dnas
            .entry(cell_id.dna().clone())
            .or_default();
        Arc::new(LocalCell {
            cell_id,
            network: self.network.clone(),
        })
    }

    /// Makes the next `times` calls of `function` fail.
    pub fn fail_next(&self, function: &str, times: usize) {
        *self
            .network()
            .failures
            .entry(function.to_string())
            .or_default() += times;
    }

    /// Calls of `function` made so far, by any cell.
    pub fn call_count(&self, function: &str) -> usize {
        self.network()
            .calls
            .iter()
            .filter(|(_, name)| name == function)
            .count()
    }

    /// Calls of `function` made by one cell.
    pub fn call_count_by(&self, cell_id: &CellId, function: &str) -> usize {
        self.network()
            .calls
            .iter()
            .filter(|(caller, name)| caller == cell_id && name == function)
            .count()
    }

    pub fn signals_delivered(&self) -> usize {
        self.network().signals_delivered
    }

    /// Live placements of a session as the backend holds them.
    pub fn live_links(&self, dna: &DnaId, session_id: &SessionId) -> Vec<LinkId> {
        self.network()
            .dnas
            .get(dna)
            .map(|state| {
                state
                    .heres
                    .iter()
                    .filter(|record| !record.deleted && &record.entry.session_id == session_id)
                    .map(|record| record.link_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn lock(network: &Mutex<Network>) -> MutexGuard<'_, Network> {
    network
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One agent's view of one dna.
pub struct LocalCell {
    cell_id: CellId,
    network: Arc<Mutex<Network>>,
}

fn decode<T: DeserializeOwned>(zome: &str, function: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        WhereError::remote(zome, function, format!("invalid payload: {}", e))
    })
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

impl LocalCell {
    fn dispatch(
        &self,
        network: &mut Network,
        zome: &str,
        function: &str,
        payload: Value,
    ) -> Result<Value> {
        let me = self.cell_id.agent().clone();
        let rejected = |message: String| WhereError::remote(zome, function, message);

        // Exports write into another dna; handle them before borrowing ours.
        match function {
            playset_fn::EXPORT_PIECE => {
                let input: ExportPieceInput = decode(zome, function, payload)?;
                let source = network.dnas.get(self.cell_id.dna());
                let piece = source.and_then(|state| copy_piece(state, &input.piece_id, &input.piece_type_name));
                let piece = piece.ok_or_else(|| {
                    rejected(format!("no {} {}", input.piece_type_name, input.piece_id))
                })?;
                let target = network.dnas.entry(input.cell_id.dna().clone()).or_default();
                paste_piece(target, piece)?;
                return Ok(Value::Null);
            }
            playset_fn::EXPORT_SPACE => {
                let input: ExportSpaceInput = decode(zome, function, payload)?;
                let source = network
                    .dnas
                    .get(self.cell_id.dna())
                    .ok_or_else(|| rejected("unknown dna".to_string()))?;
                let pieces = space_closure(source, &EntryId::from(input.space_id.clone()))
                    .ok_or_else(|| rejected(format!("no space {}", input.space_id)))?;
                let target = network.dnas.entry(input.cell_id.dna().clone()).or_default();
                let mut ids = Vec::new();
                for piece in pieces {
                    ids.push(paste_piece(target, piece)?);
                }
                return encode(&ids);
            }
            ludotheque_fn::EXPORT_PLAYSET => {
                let input: ExportPlaysetInput = decode(zome, function, payload)?;
                let source = network
                    .dnas
                    .get(self.cell_id.dna())
                    .ok_or_else(|| rejected("unknown dna".to_string()))?;
                let playset = source
                    .playsets
                    .get(&input.playset_id)
                    .ok_or_else(|| rejected(format!("no playset {}", input.playset_id)))?;
                let mut pieces = Vec::new();
                let kinds = [
                    (&playset.templates, PieceKind::Template),
                    (&playset.svg_markers, PieceKind::SvgMarker),
                    (&playset.emoji_groups, PieceKind::EmojiGroup),
                    (&playset.spaces, PieceKind::Space),
                ];
                for (ids, kind) in kinds {
                    for id in ids {
                        let piece = copy_piece(source, id, kind.as_str())
                            .ok_or_else(|| rejected(format!("playset references missing {} {}", kind, id)))?;
                        pieces.push(piece);
                    }
                }
                let target = network
                    .dnas
                    .entry(input.destination_cell_id.dna().clone())
                    .or_default();
                let mut ids = Vec::new();
                for piece in pieces {
                    ids.push(paste_piece(target, piece)?);
                }
                return encode(&ids);
            }
            _ => {}
        }

        let state = network
            .dnas
            .get_mut(self.cell_id.dna())
            .ok_or_else(|| rejected("unknown dna".to_string()))?;

        match function {
            // Where zome
            where_fn::ADD_HERE => {
                let input: AddHereInput = decode(zome, function, payload)?;
                let session_id = state
                    .space_sessions
                    .get(&input.space_id)
                    .and_then(|ids| {
                        ids.iter()
                            .find(|id| {
                                state
                                    .sessions
                                    .get(*id)
                                    .is_some_and(|entry| entry.index == input.session_index)
                            })
                            .cloned()
                    })
                    .ok_or_else(|| {
                        rejected(format!(
                            "space {} has no session #{}",
                            input.space_id, input.session_index
                        ))
                    })?;
                let link_id = new_link();
                state.heres.push(HereRecord {
                    link_id: link_id.clone(),
                    entry: HereEntry {
                        value: input.value,
                        session_id,
                        meta: input.meta,
                    },
                    author: me,
                    deleted: false,
                });
                encode(&link_id)
            }
            where_fn::DELETE_HERE => {
                let link_id: LinkId = decode(zome, function, payload)?;
                let record = state
                    .heres
                    .iter_mut()
                    .find(|record| record.link_id == link_id && !record.deleted)
                    .ok_or_else(|| rejected(format!("no live here {}", link_id)))?;
                record.deleted = true;
                Ok(Value::Null)
            }
            where_fn::GET_HERES => {
                let session_id: SessionId = decode(zome, function, payload)?;
                let heres: Vec<HereOutput> = state
                    .heres
                    .iter()
                    .filter(|record| !record.deleted && record.entry.session_id == session_id)
                    .map(|record| HereOutput {
                        entry: record.entry.clone(),
                        link_id: record.link_id.clone(),
                        author: record.author.clone(),
                    })
                    .collect();
                encode(&heres)
            }
            where_fn::HIDE_SPACE => {
                let space_id: SpaceId = decode(zome, function, payload)?;
                state.hidden.entry(me).or_default().insert(space_id);
                encode(&new_link())
            }
            where_fn::UNHIDE_SPACE => {
                let space_id: SpaceId = decode(zome, function, payload)?;
                if let Some(hidden) = state.hidden.get_mut(&me) {
                    hidden.remove(&space_id);
                }
                Ok(Value::Null)
            }
            where_fn::GET_HIDDEN_SPACES => {
                let hidden: Vec<SpaceId> = state
                    .hidden
                    .get(&me)
                    .map(|spaces| spaces.iter().cloned().collect())
                    .unwrap_or_default();
                encode(&hidden)
            }
            where_fn::GET_SESSION_FROM_EH => {
                let session_id: SessionId = decode(zome, function, payload)?;
                encode(&state.sessions.get(&session_id))
            }
            where_fn::GET_SPACE_SESSIONS => {
                let space_id: SpaceId = decode(zome, function, payload)?;
                encode(&state.space_sessions.get(&space_id).cloned().unwrap_or_default())
            }
            where_fn::CREATE_SESSIONS => {
                let input: SpaceSessionsInput = decode(zome, function, payload)?;
                let mut ids = Vec::new();
                for name in &input.session_names {
                    ids.push(state.create_session(&input.space_id, name)?.0);
                }
                encode(&ids)
            }
            where_fn::CREATE_NEXT_SESSION => {
                let input: CreateNextSessionInput = decode(zome, function, payload)?;
                encode(&state.create_session(&input.space_id, &input.name)?)
            }

            // Playset zome
            playset_fn::CREATE_TEMPLATE => {
                let template: Template = decode(zome, function, payload)?;
                encode(&state.templates.insert("Template", template)?)
            }
            playset_fn::GET_TEMPLATE => {
                let id: EntryId = decode(zome, function, payload)?;
                encode(&state.templates.get(&id))
            }
            playset_fn::GET_TEMPLATES => encode(&state.templates.all()),
            playset_fn::CREATE_SVG_MARKER => {
                let marker: SvgMarker = decode(zome, function, payload)?;
                encode(&state.svg_markers.insert("SvgMarker", marker)?)
            }
            playset_fn::GET_SVG_MARKER => {
                let id: EntryId = decode(zome, function, payload)?;
                encode(&state.svg_markers.get(&id))
            }
            playset_fn::GET_SVG_MARKERS => encode(&state.svg_markers.all()),
            playset_fn::CREATE_EMOJI_GROUP => {
                let group: EmojiGroup = decode(zome, function, payload)?;
                encode(&state.emoji_groups.insert("EmojiGroup", group)?)
            }
            playset_fn::GET_EMOJI_GROUP => {
                let id: EntryId = decode(zome, function, payload)?;
                encode(&state.emoji_groups.get(&id))
            }
            playset_fn::GET_ALL_EMOJI_GROUPS => encode(&state.emoji_groups.all()),
            playset_fn::CREATE_SPACE => {
                let space: Space = decode(zome, function, payload)?;
                encode(&state.spaces.insert("Space", space)?)
            }
            playset_fn::GET_SPACE => {
                let id: EntryId = decode(zome, function, payload)?;
                encode(&state.spaces.get(&id))
            }
            playset_fn::GET_SPACES => encode(&state.spaces.all()),
            playset_fn::GET_INVENTORY => encode(&state.inventory()),

            // Ludotheque zome
            ludotheque_fn::CREATE_PLAYSET => {
                let playset: Playset = decode(zome, function, payload)?;
                encode(&state.playsets.insert("Playset", playset)?)
            }
            ludotheque_fn::GET_PLAYSET => {
                let id: EntryId = decode(zome, function, payload)?;
                encode(&state.playsets.get(&id))
            }
            ludotheque_fn::GET_ALL_PLAYSETS => encode(&state.playsets.all()),

            other => Err(rejected(format!("unknown function {}", other))),
        }
    }
}

/// A catalog piece in transit between dnas.
enum Piece {
    Template(Template),
    SvgMarker(SvgMarker),
    EmojiGroup(EmojiGroup),
    Space(Space),
}

fn copy_piece(state: &DnaState, id: &EntryId, kind: &str) -> Option<Piece> {
    match kind {
        "Template" => state.templates.get(id).map(Piece::Template),
        "SvgMarker" => state.svg_markers.get(id).map(Piece::SvgMarker),
        "EmojiGroup" => state.emoji_groups.get(id).map(Piece::EmojiGroup),
        "Space" => state.spaces.get(id).map(Piece::Space),
        _ => None,
    }
}

fn paste_piece(state: &mut DnaState, piece: Piece) -> Result<EntryId> {
    match piece {
        Piece::Template(item) => state.templates.insert("Template", item),
        Piece::SvgMarker(item) => state.svg_markers.insert("SvgMarker", item),
        Piece::EmojiGroup(item) => state.emoji_groups.insert("EmojiGroup", item),
        Piece::Space(item) => state.spaces.insert("Space", item),
    }
}

/// A Space preceded by the template and marker artwork it references.
fn space_closure(state: &DnaState, space_id: &EntryId) -> Option<Vec<Piece>> {
    let space = state.spaces.get(space_id)?;
    let mut pieces = Vec::new();
    if let Some(template) = state.templates.get(&space.origin) {
        pieces.push(Piece::Template(template));
    }
    match &space.maybe_marker_piece {
        Some(MarkerPiece::Svg(id)) => {
            if let Some(marker) = state.svg_markers.get(id) {
                pieces.push(Piece::SvgMarker(marker));
            }
        }
        Some(MarkerPiece::EmojiGroup(id)) => {
            if let Some(group) = state.emoji_groups.get(id) {
                pieces.push(Piece::EmojiGroup(group));
            }
        }
        None => {}
    }
    pieces.push(Piece::Space(space));
    Some(pieces)
}

#[async_trait]
impl ZomeGateway for LocalCell {
    fn cell_id(&self) -> &CellId {
        &self.cell_id
    }

    async fn call(&self, zome: &str, function: &str, payload: Value) -> Result<Value> {
        let mut network = lock(&self.network);
        network
            .calls
            .push((self.cell_id.clone(), function.to_string()));

        if let Some(remaining) = network.failures.get_mut(function)
            && *remaining > 0
        {
            *remaining -= 1;
            tracing::debug!("[LocalConductor] injected failure of {}", function);
            return Err(WhereError::remote(zome, function, "injected failure"));
        }

        self.dispatch(&mut network, zome, function, payload)
    }
}

#[async_trait]
impl PushChannel for LocalCell {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AppSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.network)
            .handlers
            .insert(self.cell_id.clone(), tx);
        rx
    }

    async fn send(&self, zome: &str, payload: Value, recipients: &[AgentId]) -> Result<()> {
        let mut network = lock(&self.network);
        let mut delivered = 0;
        for recipient in recipients {
            let cell_id = CellId::new(self.cell_id.dna().clone(), recipient.clone());
            let Some(handler) = network.handlers.get(&cell_id) else {
                continue;
            };
            let signal = AppSignal {
                cell_id,
                zome_name: zome.to_string(),
                payload: payload.clone(),
            };
            if handler.send(signal).is_ok() {
                delivered += 1;
            }
        }
        network.signals_delivered += delivered;
        Ok(())
    }
}
