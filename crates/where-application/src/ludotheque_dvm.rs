use crate::context::HappContext;
use crate::ludotheque_zvm::LudothequeZvm;
use crate::playset_zvm::PlaysetZvm;
use where_core::{CellId, EntryId, Result};

/// Dna view-model of the global catalog instance.
///
/// The catalog has no placements and nobody signals it, so there is no
/// signal handling here: it is refreshed on demand.
pub struct LudothequeDvm {
    ctx: HappContext,
    playset_zvm: PlaysetZvm,
    ludotheque_zvm: LudothequeZvm,
}

impl LudothequeDvm {
    pub fn new(ctx: HappContext) -> Self {
        Self {
            playset_zvm: PlaysetZvm::new(&ctx),
            ludotheque_zvm: LudothequeZvm::new(&ctx),
            ctx,
        }
    }

    pub fn cell_id(&self) -> &CellId {
        &self.ctx.cell_id
    }

    pub fn playset_zvm(&self) -> &PlaysetZvm {
        &self.playset_zvm
    }

    pub fn ludotheque_zvm(&self) -> &LudothequeZvm {
        &self.ludotheque_zvm
    }

    pub async fn probe_all(&self) -> Result<()> {
        self.playset_zvm.probe_all().await?;
        let count = self.ludotheque_zvm.probe_playsets().await?;
        tracing::info!("[LudothequeDvm] {} playset(s) in catalog {}", count, self.ctx.cell_id);
        Ok(())
    }

    /// Installs a playset from the catalog into a Where instance.
    pub async fn export_playset(
        &self,
        playset_id: &EntryId,
        destination: &CellId,
    ) -> Result<Vec<EntryId>> {
        tracing::info!("[LudothequeDvm] exporting playset {} to {}", playset_id, destination);
        self.ludotheque_zvm
            .export_playset(playset_id, destination)
            .await
    }
}
