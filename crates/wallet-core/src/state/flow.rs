//! Flow state machine.
//!
//! Idle -> Preparing -> Submitting -> AwaitingReceipt -> Succeeded, with
//! Failed reachable from every non-terminal state after Idle and Cancelled
//! reachable until something is broadcast.

use crate::FlowError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowState {
	Idle,
	Preparing,
	Submitting,
	AwaitingReceipt,
	Succeeded,
	Failed,
	Cancelled,
}

impl FlowState {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			FlowState::Succeeded | FlowState::Failed | FlowState::Cancelled
		)
	}
}

static TRANSITIONS: Lazy<HashMap<FlowState, HashSet<FlowState>>> = Lazy::new(|| {
	use FlowState::*;

	let mut m = HashMap::new();
	m.insert(Idle, HashSet::from([Preparing]));
	m.insert(Preparing, HashSet::from([Submitting, Failed, Cancelled]));
	m.insert(Submitting, HashSet::from([AwaitingReceipt, Failed, Cancelled]));
	m.insert(AwaitingReceipt, HashSet::from([Succeeded, Failed]));
	m.insert(Succeeded, HashSet::new()); // terminal
	m.insert(Failed, HashSet::new()); // terminal
	m.insert(Cancelled, HashSet::new()); // terminal
	m
});

/// Current state of one flow run.
#[derive(Debug)]
pub struct FlowStateMachine {
	state: FlowState,
}

impl Default for FlowStateMachine {
	fn default() -> Self {
		Self::new()
	}
}

impl FlowStateMachine {
	pub fn new() -> Self {
		Self {
			state: FlowState::Idle,
		}
	}

	pub fn state(&self) -> FlowState {
		self.state
	}

	pub fn is_valid_transition(from: FlowState, to: FlowState) -> bool {
		TRANSITIONS
			.get(&from)
			.is_some_and(|allowed| allowed.contains(&to))
	}

	/// Moves to `to`, or fails leaving the state unchanged.
	pub fn transition(&mut self, to: FlowState) -> Result<(), FlowError> {
		if !Self::is_valid_transition(self.state, to) {
			return Err(FlowError::InvalidTransition {
				from: self.state,
				to,
			});
		}
		tracing::trace!(from = ?self.state, to = ?to, "Flow transition");
		self.state = to;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_happy_path() {
		let mut machine = FlowStateMachine::new();
		for state in [
			FlowState::Preparing,
			FlowState::Submitting,
			FlowState::AwaitingReceipt,
			FlowState::Succeeded,
		] {
			machine.transition(state).unwrap();
		}
		assert!(machine.state().is_terminal());
	}

	#[test]
	fn test_no_cancel_after_broadcast() {
		let mut machine = FlowStateMachine::new();
		machine.transition(FlowState::Preparing).unwrap();
		machine.transition(FlowState::Submitting).unwrap();
		machine.transition(FlowState::AwaitingReceipt).unwrap();

		let err = machine.transition(FlowState::Cancelled).unwrap_err();
		assert!(matches!(
			err,
			FlowError::InvalidTransition {
				from: FlowState::AwaitingReceipt,
				to: FlowState::Cancelled
			}
		));
		assert_eq!(machine.state(), FlowState::AwaitingReceipt);
	}

	#[test]
	fn test_terminal_states_are_final() {
		for terminal in [FlowState::Succeeded, FlowState::Failed, FlowState::Cancelled] {
			for next in [FlowState::Idle, FlowState::Preparing, FlowState::Failed] {
				assert!(!FlowStateMachine::is_valid_transition(terminal, next));
			}
		}
		assert!(!FlowStateMachine::is_valid_transition(
			FlowState::Idle,
			FlowState::Submitting
		));
	}
}
