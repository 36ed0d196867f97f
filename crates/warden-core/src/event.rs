//! Escalation events
//!
//! Notifications, new approval requests and misconfigured rules are published
//! on a bounded channel. Publishing never waits: when the channel is full the
//! event is dropped and logged. Receivers share one queue, so each event is
//! delivered to exactly one subscriber.

use flume::{Receiver, Sender, TrySendError};
use serde::Serialize;

use warden_types::escalation::EscalationTarget;

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationEvent {
	/// A `notify` rule fired, the action proceeds
	Notify {
		rule_id: i64,
		admin_id: Box<str>,
		resource_code: Box<str>,
		action_code: Box<str>,
		target: EscalationTarget,
	},
	ApprovalCreated {
		approval_id: i64,
		rule_id: i64,
		admin_id: Box<str>,
		target: EscalationTarget,
	},
	/// A rule cannot be acted on, e.g. its `escalate_to` target is missing or inactive
	Misconfiguration {
		rule_id: i64,
		message: Box<str>,
	},
}

#[derive(Debug, Clone)]
pub struct EventBus {
	tx: Sender<EscalationEvent>,
	rx: Receiver<EscalationEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (tx, rx) = flume::bounded(capacity);
		Self { tx, rx }
	}

	pub fn subscribe(&self) -> Receiver<EscalationEvent> {
		self.rx.clone()
	}

	pub fn publish(&self, event: EscalationEvent) {
		match self.tx.try_send(event) {
			Ok(()) => {}
			Err(TrySendError::Full(event)) => {
				warn!("Escalation event channel full, dropping event: {:?}", event);
			}
			// The bus holds a receiver itself, so this is unreachable in practice
			Err(TrySendError::Disconnected(event)) => {
				warn!("Escalation event channel closed, dropping event: {:?}", event);
			}
		}
	}

	/// Number of events waiting for a subscriber
	pub fn pending(&self) -> usize {
		self.tx.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn misconfiguration(rule_id: i64) -> EscalationEvent {
		EscalationEvent::Misconfiguration { rule_id, message: "missing target".into() }
	}

	#[test]
	fn test_publish_and_receive() {
		let bus = EventBus::new(4);
		let rx = bus.subscribe();
		bus.publish(misconfiguration(1));
		assert_eq!(rx.try_recv().unwrap(), misconfiguration(1));
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn test_full_channel_drops() {
		let bus = EventBus::new(1);
		bus.publish(misconfiguration(1));
		bus.publish(misconfiguration(2));
		assert_eq!(bus.pending(), 1);
		assert_eq!(bus.subscribe().try_recv().unwrap(), misconfiguration(1));
	}

	#[test]
	fn test_event_serialization() {
		let event = EscalationEvent::Notify {
			rule_id: 3,
			admin_id: "a1".into(),
			resource_code: "finance".into(),
			action_code: "refund".into(),
			target: EscalationTarget::Role("finance_manager".into()),
		};
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "notify");
		assert_eq!(json["target"]["role"], "finance_manager");
	}
}

// vim: ts=4
