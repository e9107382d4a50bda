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

//! Passive liveness/safety observers (§4.3).
//!
//! A monitor has the same shape as an actor's state machine — named states,
//! a handler table, `Goto`/`DoAction` transitions — but owns no queue and no
//! operation of its own: `monitor(type, event)` dispatches it synchronously
//! on the calling actor's operation. Unlike an actor, a monitor that has no
//! handler for an incoming event simply ignores it rather than reporting a
//! bug: monitors are typically partial specifications over a subset of the
//! program's event vocabulary (see DESIGN.md).

use std::{any::Any, collections::HashMap, sync::Arc};

use crate::{
	context::ActionCtx,
	event::Event,
	observer::RuntimeObserver,
	state::{Action, Transition},
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LivenessTag {
	/// Liveness-unsatisfied; a violation if still current at the end of a
	/// fair iteration (§7#7).
	Hot,
	/// Liveness-satisfied.
	Cold,
	/// No liveness obligation either way.
	Neutral,
}

pub struct MonitorStateDef {
	pub name: &'static str,
	pub liveness: LivenessTag,
	pub entry: Option<Action>,
	pub handlers: HashMap<&'static str, Transition>,
}

pub struct MonitorStateBuilder {
	name: &'static str,
	liveness: LivenessTag,
	entry: Option<Action>,
	handlers: HashMap<&'static str, Transition>,
}

impl MonitorStateBuilder {
	pub fn new(name: &'static str, liveness: LivenessTag) -> Self {
		MonitorStateBuilder { name, liveness, entry: None, handlers: HashMap::new() }
	}

	#[must_use]
	pub fn on_entry<F>(mut self, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.entry = Some(Arc::new(action));
		self
	}

	#[must_use]
	pub fn on_do<F>(mut self, event_type: &'static str, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.handlers.insert(event_type, Transition::DoAction(Arc::new(action)));
		self
	}

	#[must_use]
	pub fn on_goto(mut self, event_type: &'static str, target: &'static str) -> Self {
		self.handlers.insert(event_type, Transition::Goto(target));
		self
	}

	pub fn build(self) -> MonitorStateDef {
		MonitorStateDef { name: self.name, liveness: self.liveness, entry: self.entry, handlers: self.handlers }
	}
}

/// Shared, immutable behavior of a monitor type.
pub struct MonitorDef {
	pub states: HashMap<&'static str, Arc<MonitorStateDef>>,
	pub start_state: &'static str,
	make_state: Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>,
}

impl MonitorDef {
	pub fn builder(start_state: &'static str) -> MonitorDefBuilder {
		MonitorDefBuilder { states: HashMap::new(), start_state, make_state: None }
	}

	pub fn state(&self, name: &str) -> &Arc<MonitorStateDef> {
		self.states.get(name).unwrap_or_else(|| panic!("unknown monitor state '{name}'"))
	}
}

pub struct MonitorDefBuilder {
	states: HashMap<&'static str, Arc<MonitorStateDef>>,
	start_state: &'static str,
	make_state: Option<Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>>,
}

impl MonitorDefBuilder {
	#[must_use]
	pub fn with_state(mut self, state: MonitorStateDef) -> Self {
		self.states.insert(state.name, Arc::new(state));
		self
	}

	#[must_use]
	pub fn with_state_factory<F>(mut self, make_state: F) -> Self
	where F: Fn() -> Box<dyn Any + Send> + Send + Sync + 'static {
		self.make_state = Some(Arc::new(make_state));
		self
	}

	pub fn build(self) -> Arc<MonitorDef> {
		assert!(
			self.states.contains_key(self.start_state),
			"start state '{}' was never registered",
			self.start_state
		);
		Arc::new(MonitorDef {
			states: self.states,
			start_state: self.start_state,
			make_state: self.make_state.unwrap_or_else(|| Arc::new(|| Box::new(()))),
		})
	}
}

/// One live monitor instance.
pub struct MonitorInstance {
	pub type_name: &'static str,
	def: Arc<MonitorDef>,
	current: &'static str,
	user_state: Box<dyn Any + Send>,
}

impl MonitorInstance {
	pub fn new(type_name: &'static str, def: Arc<MonitorDef>) -> Self {
		let current = def.start_state;
		let user_state = (def.make_state)();
		MonitorInstance { type_name, def, current, user_state }
	}

	pub fn current_state_name(&self) -> &'static str {
		self.current
	}

	pub fn liveness(&self) -> LivenessTag {
		self.def.state(self.current).liveness
	}

	pub fn is_hot(&self) -> bool {
		self.liveness() == LivenessTag::Hot
	}

	/// Runs the handler for `event` in the current state, if any. Goto
	/// transitions run the target state's entry action afterward, matching
	/// how an actor's `StateMachineCore` enters a new state (§4.2 step 5).
	/// Fires `OnMonitorExecuteAction` (§6) immediately before any action body
	/// runs, whether it came from a `DoAction` handler or a transition's
	/// entry action.
	pub fn dispatch(&mut self, event: &Event, ctx: &mut ActionCtx<'_>, observer: &dyn RuntimeObserver) {
		let state = Arc::clone(self.def.state(self.current));
		match state.handlers.get(event.type_name()) {
			Some(Transition::DoAction(action)) => {
				observer.on_monitor_execute_action(self.type_name, self.current);
				action(self.user_state.as_mut(), ctx);
			},
			Some(Transition::Goto(target)) => {
				self.current = target;
				if let Some(entry) = &self.def.state(target).entry {
					observer.on_monitor_execute_action(self.type_name, self.current);
					entry(self.user_state.as_mut(), ctx);
				}
			},
			Some(Transition::Push(target)) => {
				// Monitors are flat: a Push behaves like a Goto (see DESIGN.md).
				self.current = target;
				if let Some(entry) = &self.def.state(target).entry {
					observer.on_monitor_execute_action(self.type_name, self.current);
					entry(self.user_state.as_mut(), ctx);
				}
			},
			None => {},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{context::ActionHost, error::RuntimeError};
	use common::ActorId;
	use std::sync::Arc as StdArc;

	#[derive(Default)]
	struct NoopHost;
	impl ActionHost for NoopHost {
		fn send_event(&mut self, _from: ActorId, _to: ActorId, _event: Event) -> Result<(), RuntimeError> {
			Ok(())
		}
		fn create_actor(
			&mut self,
			_creator: ActorId,
			_type_name: &'static str,
			_machine: StdArc<crate::state::StateMachineDef>,
			_ctor_event: Option<Event>,
		) -> Result<ActorId, RuntimeError> {
			unimplemented!()
		}
		fn invoke_monitor(&mut self, _monitor_type: &'static str, _event: Event) -> Result<(), RuntimeError> {
			Ok(())
		}
		fn random_boolean(&mut self) -> Result<bool, RuntimeError> {
			Ok(false)
		}
		fn random_integer(&mut self, _upper: u64) -> Result<u64, RuntimeError> {
			Ok(0)
		}
		fn fair_random(&mut self) -> Result<bool, RuntimeError> {
			Ok(false)
		}
	}

	#[derive(Debug)]
	struct Done;

	struct NoopObserver;
	impl RuntimeObserver for NoopObserver {}

	#[test]
	fn goto_on_matching_event_clears_hot_state() {
		let done_type = std::any::type_name::<Done>();
		let def = MonitorDef::builder("Waiting")
			.with_state(MonitorStateBuilder::new("Waiting", LivenessTag::Hot).on_goto(done_type, "Satisfied").build())
			.with_state(MonitorStateBuilder::new("Satisfied", LivenessTag::Cold).build())
			.build();
		let mut instance = MonitorInstance::new("Liveness", def);
		assert!(instance.is_hot());
		let mut host = NoopHost;
		let actor = common::IdAllocator::new().next_actor_id("A", None, None);
		let mut ctx = ActionCtx::new(actor, &mut host, false);
		let observer = NoopObserver;
		instance.dispatch(&Event::new(Done), &mut ctx, &observer);
		assert!(!instance.is_hot());
	}
}
