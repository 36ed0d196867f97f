//! Warden policy engine core.
//!
//! - `resolver`: effective permission computation (roles, overrides, deny precedence)
//! - `constraint`: typed constraints attached to direct grants
//! - `escalation`: escalation rule evaluation
//! - `approval`: approval request inbox
//! - `engine`: the `Warden` facade combining all of the above with events and audit

pub mod approval;
pub mod audit;
pub mod clock;
pub mod constraint;
pub mod engine;
pub mod escalation;
pub mod event;
pub mod opts;
pub mod predicate;
pub mod prelude;
pub mod resolver;
pub mod trigger;

pub use engine::{Decision, Warden};
pub use escalation::EscalationOutcome;
pub use opts::EngineOpts;
pub use resolver::{Access, Authorization, DenyReason, EffectivePermissions};

// vim: ts=4
