//! Shared types, adapter traits, and core utilities for the Warden policy engine.
//!
//! This crate contains the data model that is shared between the engine, the
//! administration API and all storage adapter implementations. Keeping it in a
//! separate crate lets adapter crates compile in parallel with the engine.

pub mod abac;
pub mod audit;
pub mod error;
pub mod escalation;
pub mod permission;
pub mod policy_adapter;
pub mod prelude;
pub mod types;

// vim: ts=4
