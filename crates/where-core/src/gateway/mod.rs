//! Gateway module: collaborator ports and the typed zome proxies built on them.

mod playset_proxy;
mod port;
mod proxy;
mod where_proxy;

pub use playset_proxy::{
    ExportPieceInput, ExportPlaysetInput, ExportSpaceInput, LudothequeProxy, PlaysetProxy,
    ludotheque_fn, playset_fn,
};
pub use port::{AppSignal, PushChannel, ZomeGateway};
pub use proxy::ZomeProxy;
pub use where_proxy::{WhereProxy, where_fn};
