// Copyright (C) 2023 QuerentAI LLC.
// This file is part of Querent.

// The Licensed Work is licensed under the Business Source License 1.1 (BSL 1.1).
// You may use this file in compliance with the BSL 1.1, subject to the following restrictions:
// 1. You may not use the Licensed Work for AI-related services, database services,
//    or any service or product offering that provides database, big data, or analytics
//    services to third parties unless explicitly authorized by QuerentAI LLC.
// 2. For more details, see the LICENSE file or visit https://mariadb.com/bsl11/.

// For inquiries about alternative licensing arrangements, please contact contact@querent.xyz.

// The Licensed Work is provided "AS IS", WITHOUT WARRANTY OF ANY KIND, express or implied,
// including but not limited to the warranties of merchantability, fitness for a particular purpose,
// and non-infringement. See the Business Source License for more details.

// This software includes code developed by QuerentAI LLC (https://querent.ai).

//! One actor instance: its identity, queue, state stack and timers (§3, §4.3).

use std::{any::Any, sync::Arc};

use common::ActorId;

use crate::{
	event::Event,
	operation::{Operation, OperationStatus},
	queue::EventQueue,
	state::{StateMachineDef, StateStack},
	timer::TimerSet,
};

/// Coarse lifecycle of an actor, tracked alongside its finer-grained
/// [`OperationStatus`] for observer hooks and error messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Lifecycle {
	/// Constructed but its entry action for the start state has not yet run.
	Created,
	Running,
	/// Executing its `OnHalt` handler; `raise`/most effects are rejected here.
	Halting,
	/// Fully drained. Retained in the actor table only for must-handle/halted
	/// reception bookkeeping until the scheduler prunes it (§7#4).
	Halted,
}

/// An actor instance: identity, behavior (shared `StateMachineDef`), and all
/// per-instance mutable state the engine needs to schedule and dispatch it.
pub struct ActorCell {
	pub id: ActorId,
	pub type_name: &'static str,
	pub machine: Arc<StateMachineDef>,
	pub stack: StateStack,
	pub queue: EventQueue,
	pub lifecycle: Lifecycle,
	pub operation: Operation,
	pub user_state: Box<dyn Any + Send>,
	pub timers: TimerSet,
	pub pending_must_handle: usize,
	/// The `initialEvent` argument to `createActor`, if any: delivered to the
	/// start state's entry action on the actor's very first operation step,
	/// then consumed (§4.2, §4.3 `createActor(type, initialEvent?)`).
	pub ctor_event: Option<Event>,
}

impl ActorCell {
	pub fn new(
		id: ActorId,
		type_name: &'static str,
		machine: Arc<StateMachineDef>,
		user_state: Box<dyn Any + Send>,
		ctor_event: Option<Event>,
	) -> Self {
		let start_state = machine.start_state;
		ActorCell {
			operation: Operation::new(id.clone()),
			id,
			type_name,
			stack: StateStack::new(start_state),
			machine,
			queue: EventQueue::new(),
			lifecycle: Lifecycle::Created,
			user_state,
			timers: TimerSet::default(),
			pending_must_handle: 0,
			ctor_event,
		}
	}

	pub fn is_halted(&self) -> bool {
		self.lifecycle == Lifecycle::Halted
	}

	pub fn current_state_name(&self) -> &'static str {
		self.stack.current()
	}

	/// Whether the currently-active state (top of stack only — see
	/// DESIGN.md) declares a default handler, consulted by `EventQueue::dequeue`.
	pub fn current_state_has_default(&self) -> bool {
		self.machine.state(self.current_state_name()).default.is_some()
	}

	pub fn mark_enabled(&mut self) {
		if self.lifecycle != Lifecycle::Halted {
			self.operation.mark_enabled();
		}
	}

	pub fn status(&self) -> &OperationStatus {
		&self.operation.status
	}
}
