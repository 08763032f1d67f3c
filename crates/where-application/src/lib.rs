//! Application layer of the Where view-models.
//!
//! Zome view-models own one cache each and keep it in step with the backend
//! through their gateway; dna view-models compose them per backend instance
//! and route pushed signals to them.

pub mod context;
pub mod ludotheque_dvm;
pub mod ludotheque_zvm;
pub mod playset_zvm;
pub mod subscriber;
pub mod where_dvm;
pub mod where_zvm;

#[cfg(test)]
mod test_support;

pub use context::HappContext;
pub use ludotheque_dvm::LudothequeDvm;
pub use ludotheque_zvm::LudothequeZvm;
pub use playset_zvm::PlaysetZvm;
pub use subscriber::{SubscriberRegistry, SubscriptionId};
pub use where_dvm::{WhereDvm, WhereDvmPerspective};
pub use where_zvm::{UpdateOutcome, WhereZvm};
