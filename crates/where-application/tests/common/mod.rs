#![allow(dead_code)]

use std::sync::Arc;
use where_application::{HappContext, WhereDvm};
use where_core::placement::{Coord, Location, LocationMeta};
use where_core::playset::{SpaceMat, SpaceMeta};
use where_core::{AgentId, EntryId, SessionId, WhereConfig};
use where_infrastructure::{LocalCell, LocalConductor};

pub const WHERE_DNA: &str = "uhC0kWhere";
pub const LUDOTHEQUE_DNA: &str = "uhC0kLudotheque";

/// Polls `$cond` until it holds, failing the test after about two seconds.
macro_rules! wait_until {
    ($cond:expr) => {{
        let mut reached = false;
        for _ in 0..200 {
            if $cond {
                reached = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(reached, "timed out waiting for {}", stringify!($cond));
    }};
}

/// One agent running the Where instance.
pub struct Peer {
    pub cell: Arc<LocalCell>,
    pub dvm: Arc<WhereDvm>,
}

impl Peer {
    pub fn me(&self) -> AgentId {
        self.dvm.me().clone()
    }
}

pub fn context(cell: &Arc<LocalCell>) -> HappContext {
    HappContext::new(cell.clone(), cell.clone(), Arc::new(WhereConfig::default()))
}

/// A Where dvm for `agent`, attached to its push channel.
pub fn peer(conductor: &LocalConductor, agent: &str) -> Peer {
    let cell = conductor.cell(WHERE_DNA, agent);
    let dvm = Arc::new(WhereDvm::new(context(&cell)));
    dvm.attach();
    Peer { cell, dvm }
}

/// Makes two peers hear from each other so they count as current others.
pub async fn introduce(a: &Peer, b: &Peer) {
    a.dvm.register_agents(&[b.me()]).await;
    b.dvm.register_agents(&[a.me()]).await;
    assert!(a.dvm.ping_others(None).await);
    wait_until!(
        a.dvm.last_seen(&b.me()).await.is_some() && b.dvm.last_seen(&a.me()).await.is_some()
    );
}

pub fn office() -> SpaceMat {
    SpaceMat {
        name: "Office".to_string(),
        origin: EntryId::new("uhCEkFloorPlan"),
        surface: serde_json::json!({ "html": "<img src=\"office.png\">" }),
        maybe_marker_piece: None,
        meta: SpaceMeta::default(),
    }
}

pub fn location(session_id: &SessionId, x: f64, y: f64, author_name: &str) -> Location {
    Location {
        coord: Coord::new(x, y),
        session_id: session_id.clone(),
        meta: LocationMeta {
            author_name: Some(author_name.to_string()),
            tag: Some("desk".to_string()),
            ..LocationMeta::default()
        },
    }
}
