use std::sync::Arc;
use where_core::gateway::{PushChannel, ZomeGateway};
use where_core::{AgentId, CellId, WhereConfig};

/// Everything the view-models of one backend instance share.
///
/// Built once at startup and handed to every view-model; there is no
/// process-wide state.
#[derive(Clone)]
pub struct HappContext {
    pub cell_id: CellId,
    pub gateway: Arc<dyn ZomeGateway>,
    pub push: Arc<dyn PushChannel>,
    pub config: Arc<WhereConfig>,
}

impl HappContext {
    pub fn new(
        gateway: Arc<dyn ZomeGateway>,
        push: Arc<dyn PushChannel>,
        config: Arc<WhereConfig>,
    ) -> Self {
        Self {
            cell_id: gateway.cell_id().clone(),
            gateway,
            push,
            config,
        }
    }

    /// The local agent.
    pub fn me(&self) -> &AgentId {
        self.cell_id.agent()
    }
}
