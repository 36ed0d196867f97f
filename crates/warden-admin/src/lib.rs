//! Administration API for the Warden policy engine.
//!
//! Every write is validated before it reaches storage:
//! - codes are well formed and referenced codes exist in the catalog
//! - escalation targets exist and trigger conditions parse
//! - override constraint maps parse
//! - catalog rows that are still referenced cannot be deleted
//!
//! Uniqueness violations surface as `Error::Conflict` from the adapter.

use std::sync::Arc;

use warden_core::{EngineOpts, Warden};
use warden_types::policy_adapter::PolicyAdapter;

pub mod catalog;
pub mod directory;
pub mod grant;
pub mod role;
pub mod rule;

mod prelude;
mod validate;

pub use catalog::CreatePermissionRequest;
pub use directory::AssignRoleRequest;
pub use grant::OverrideRequest;
pub use role::CreateRoleRequest;
pub use rule::CreateRuleRequest;

#[derive(Debug, Clone)]
pub struct AdminApi {
	adapter: Arc<dyn PolicyAdapter>,
	opts: EngineOpts,
}

impl AdminApi {
	pub fn new(adapter: Arc<dyn PolicyAdapter>, opts: EngineOpts) -> Self {
		Self { adapter, opts }
	}

	/// Shares the engine's adapter and options
	pub fn for_engine(warden: &Warden) -> Self {
		Self::new(warden.adapter().clone(), warden.opts().clone())
	}

	pub fn adapter(&self) -> &Arc<dyn PolicyAdapter> {
		&self.adapter
	}
}

// vim: ts=4
