//! Scripted ports shared by the unit tests of this crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use where_core::gateway::{AppSignal, PushChannel, ZomeGateway};
use where_core::{AgentId, CellId, Result, WhereConfig, WhereError};

use crate::context::HappContext;

pub fn alice() -> AgentId {
    AgentId::new("uhCAkAlice")
}

pub fn bob() -> AgentId {
    AgentId::new("uhCAkBob")
}

pub fn cell() -> CellId {
    CellId::new("uhC0kWhere", alice())
}

/// Gateway answering each function from a queue of scripted responses.
pub struct MockGateway {
    cell_id: CellId,
    responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockGateway {
    pub fn new(cell_id: CellId) -> Self {
        Self {
            cell_id,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, function: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(function.to_string())
            .or_default()
            .push_back(Ok(value));
    }

    pub fn fail(&self, function: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .entry(function.to_string())
            .or_default()
            .push_back(Err(WhereError::remote("mock", function, message)));
    }

    pub fn calls_to(&self, function: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == function)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn call_count(&self, function: &str) -> usize {
        self.calls_to(function).len()
    }
}

#[async_trait]
impl ZomeGateway for MockGateway {
    fn cell_id(&self) -> &CellId {
        &self.cell_id
    }

    async fn call(&self, zome: &str, function: &str, payload: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((function.to_string(), payload));
        self.responses
            .lock()
            .unwrap()
            .get_mut(function)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(WhereError::remote(zome, function, "no scripted response")))
    }
}

/// Push channel recording everything sent through it.
#[derive(Default)]
pub struct MockPush {
    sent: Mutex<Vec<(Value, Vec<AgentId>)>>,
}

impl MockPush {
    pub fn sent(&self) -> Vec<(Value, Vec<AgentId>)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|(payload, _)| payload["message"]["type"].as_str().map(String::from))
            .collect()
    }
}

#[async_trait]
impl PushChannel for MockPush {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<AppSignal> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }

    async fn send(&self, _zome: &str, payload: Value, recipients: &[AgentId]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((payload, recipients.to_vec()));
        Ok(())
    }
}

pub fn context() -> (HappContext, Arc<MockGateway>, Arc<MockPush>) {
    let gateway = Arc::new(MockGateway::new(cell()));
    let push = Arc::new(MockPush::default());
    let ctx = HappContext::new(
        gateway.clone(),
        push.clone(),
        Arc::new(WhereConfig::default()),
    );
    (ctx, gateway, push)
}
