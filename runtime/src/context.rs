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

//! The program-facing surface handed to action bodies (§4.3, §4.6).
//!
//! Action closures are plain synchronous functions — `Fn(&mut dyn Any, &mut
//! ActionCtx<'_>)`, no `Result` — so every fallible effect here swallows its
//! own error into `ActionCtx::fault` rather than propagating it. `dispatch`
//! calls `finish()` immediately after invoking a handler to pull out both the
//! fault and the requested effects; this keeps user action bodies reading
//! like ordinary imperative code (`ctx.send(...)`, `ctx.assert_that(...)`)
//! while still surfacing every bug in the taxonomy (§7).
//!
//! `raise`/`goto`/`push_state`/`pop_state`/`receive`/`start_timer`/
//! `stop_timer`/`halt` only ever affect the calling actor's own cell, so they
//! are recorded here as plain fields rather than routed through
//! [`ActionHost`] — `dispatch::run_action` applies them directly against the
//! `&mut ActorCell` it already owns once the closure returns. `ActionHost` is
//! reserved for effects that genuinely reach outside the current actor: a
//! send to another actor's queue, a new row in the actor table, a monitor
//! dispatch, or a draw from the shared oracle.
//!
//! `receive(...)` does not block the calling closure midway — there is no
//! coroutine machinery here. Calling it marks the operation
//! `WaitingToReceive` (§4.1) and the closure is expected to return right
//! after; the event that eventually satisfies the predicate is delivered
//! through the ordinary handler table on a later, fresh dispatch, not as a
//! return value of this call. See DESIGN.md for why this reading of `receive`
//! was chosen over true call-site resumption.

use std::sync::Arc;

use common::ActorId;

use crate::{
	error::{BugKind, RuntimeError},
	event::{Event, EventPayload, ReceivePredicate},
	state::StateMachineDef,
};

/// Everything an [`ActionCtx`] needs from the engine for effects that reach
/// outside the calling actor's own cell. Implemented by the engine layer;
/// kept as a trait so this module stays decoupled from the concrete engine
/// type.
pub trait ActionHost {
	fn send_event(&mut self, from: ActorId, to: ActorId, event: Event) -> Result<(), RuntimeError>;

	fn create_actor(
		&mut self,
		creator: ActorId,
		type_name: &'static str,
		machine: Arc<StateMachineDef>,
		ctor_event: Option<Event>,
	) -> Result<ActorId, RuntimeError>;

	fn invoke_monitor(&mut self, monitor_type: &'static str, event: Event) -> Result<(), RuntimeError>;

	fn random_boolean(&mut self) -> Result<bool, RuntimeError>;

	fn random_integer(&mut self, upper: u64) -> Result<u64, RuntimeError>;

	fn fair_random(&mut self) -> Result<bool, RuntimeError>;
}

/// A same-actor effect requested by an action body. At most one of these is
/// meaningful per action (P disallows e.g. both `raise` and `goto` in the
/// same handler); if more than one is requested, `dispatch::run_action`
/// applies `halt` first, then `goto`/`push`/`pop`, then `raise`, and silently
/// drops the rest — see DESIGN.md.
#[derive(Default)]
pub struct RequestedEffects {
	pub raised: Option<Event>,
	pub goto: Option<&'static str>,
	pub push: Option<&'static str>,
	pub pop: bool,
	pub receive_predicate: Option<ReceivePredicate>,
	pub halt: bool,
	pub timer_starts: Vec<(&'static str, bool)>,
	pub timer_stops: Vec<&'static str>,
}

/// Passed by `&mut` to every entry/exit/do action invocation. Carries the
/// outcome of whatever effects the action requested back to `dispatch`.
pub struct ActionCtx<'a> {
	actor_id: ActorId,
	host: &'a mut dyn ActionHost,
	in_halt_handler: bool,
	current_event: Option<Event>,
	fault: Option<RuntimeError>,
	effects: RequestedEffects,
}

impl<'a> ActionCtx<'a> {
	pub fn new(actor_id: ActorId, host: &'a mut dyn ActionHost, in_halt_handler: bool) -> Self {
		ActionCtx {
			actor_id,
			host,
			in_halt_handler,
			current_event: None,
			fault: None,
			effects: RequestedEffects::default(),
		}
	}

	#[must_use]
	pub fn with_event(mut self, event: Event) -> Self {
		self.current_event = Some(event);
		self
	}

	pub fn actor_id(&self) -> &ActorId {
		&self.actor_id
	}

	/// The event whose `DoAction` handler is currently executing; `None` for
	/// entry/exit/default actions, which run without an associated event.
	pub fn event(&self) -> Option<&Event> {
		self.current_event.as_ref()
	}

	/// Consumes the context, returning the first fault recorded (if any) and
	/// the same-actor effects it requested. `dispatch::run_action` only
	/// applies the effects when this returns `None`.
	pub fn finish(self) -> (Option<RuntimeError>, RequestedEffects) {
		(self.fault, self.effects)
	}

	pub fn is_blocked_on_receive(&self) -> bool {
		self.effects.receive_predicate.is_some()
	}

	/// Whether a fault has already been recorded against this action
	/// invocation — used by [`ActionHost::invoke_monitor`]'s raised-event
	/// drain loop, which reuses one `ActionCtx` across several dispatches of
	/// the same monitor step rather than building a fresh one per raise.
	pub fn has_fault(&self) -> bool {
		self.fault.is_some()
	}

	/// Takes the recorded fault (if any) without consuming the context. See
	/// [`Self::has_fault`].
	pub fn take_fault(&mut self) -> Option<RuntimeError> {
		self.fault.take()
	}

	/// Takes a pending `raise(...)` request without consuming the context, so
	/// a caller that owns the dispatch loop (monitor raised-event draining;
	/// see DESIGN.md) can re-enter dispatch with the raised event instead of
	/// only ever seeing it via [`Self::finish`].
	pub fn take_raised(&mut self) -> Option<Event> {
		self.effects.raised.take()
	}

	fn record_fault(&mut self, err: RuntimeError) {
		if self.fault.is_none() {
			self.fault = Some(err);
		}
	}

	/// Reports a call to an uncontrolled concurrency primitive (§5, §7#8) —
	/// the program-facing surface a host's instrumentation layer calls into
	/// when it detects user code reaching outside the scheduler (a native
	/// `thread::sleep`, a raw OS mutex, an uninstrumented executor).
	/// Intercepting those calls automatically is out of this core's scope
	/// (§1's "assembly rewriting" Non-goal); this only records the resulting
	/// fault so the run ends with `RuntimeError::UncontrolledInvocation`
	/// instead of silently racing the scheduler.
	pub fn report_uncontrolled_invocation(&mut self, api: &'static str) {
		self.record_fault(RuntimeError::UncontrolledInvocation { api });
	}

	/// Rejects `operation` with `IllegalOperationWhileHalted` if called from
	/// inside `OnHalt` — the taxonomy (§7#5) names exactly receive/raise/goto
	/// as illegal there; `push`/`pop` are included for the same reason as
	/// `goto` (all three attempt a state transition an already-halting actor
	/// cannot make).
	fn guard_halt_handler(&mut self, operation: &'static str) -> bool {
		if self.in_halt_handler {
			self.record_fault(RuntimeError::Bug(BugKind::IllegalOperationWhileHalted {
				actor: self.actor_id.clone(),
				operation,
			}));
			return false;
		}
		true
	}

	pub fn send<T: EventPayload>(&mut self, to: ActorId, payload: T) {
		self.send_event(to, Event::new(payload));
	}

	pub fn send_event(&mut self, to: ActorId, event: Event) {
		if let Err(err) = self.host.send_event(self.actor_id.clone(), to, event) {
			self.record_fault(err);
		}
	}

	pub fn create_actor<T: Into<Option<Event>>>(
		&mut self,
		type_name: &'static str,
		machine: Arc<StateMachineDef>,
		ctor_event: T,
	) -> Option<ActorId> {
		match self.host.create_actor(self.actor_id.clone(), type_name, machine, ctor_event.into()) {
			Ok(id) => Some(id),
			Err(err) => {
				self.record_fault(err);
				None
			},
		}
	}

	/// Raises `payload` on this same actor: processed before any other queued
	/// event (§4.2 step 6). Disallowed inside an `OnHalt`/exit-to-halted
	/// handler (§8 Open Question resolution; see DESIGN.md).
	pub fn raise<T: EventPayload>(&mut self, payload: T) {
		if !self.guard_halt_handler("raise") {
			return;
		}
		self.effects.raised = Some(Event::new(payload));
	}

	pub fn goto(&mut self, target: &'static str) {
		if !self.guard_halt_handler("goto") {
			return;
		}
		self.effects.goto = Some(target);
	}

	pub fn push_state(&mut self, target: &'static str) {
		if !self.guard_halt_handler("push") {
			return;
		}
		self.effects.push = Some(target);
	}

	pub fn pop_state(&mut self) {
		if !self.guard_halt_handler("pop") {
			return;
		}
		self.effects.pop = true;
	}

	/// Marks this operation as waiting to receive an event matching
	/// `predicate`. Does not return the event; see the module docs.
	pub fn receive(&mut self, predicate: ReceivePredicate) {
		if !self.guard_halt_handler("receive") {
			return;
		}
		self.effects.receive_predicate = Some(predicate);
	}

	pub fn monitor<T: EventPayload>(&mut self, monitor_type: &'static str, payload: T) {
		if let Err(err) = self.host.invoke_monitor(monitor_type, Event::new(payload)) {
			self.record_fault(err);
		}
	}

	pub fn assert_that(&mut self, condition: bool, message: impl Into<String>) {
		if !condition {
			self.record_fault(RuntimeError::Bug(BugKind::AssertionFailure(message.into())));
		}
	}

	pub fn random(&mut self) -> bool {
		match self.host.random_boolean() {
			Ok(value) => value,
			Err(err) => {
				self.record_fault(err);
				false
			},
		}
	}

	pub fn random_int(&mut self, upper: u64) -> u64 {
		match self.host.random_integer(upper) {
			Ok(value) => value,
			Err(err) => {
				self.record_fault(err);
				0
			},
		}
	}

	/// A random choice biased so that, over an unbounded number of calls from
	/// the same scheduling point, both outcomes are guaranteed to recur —
	/// suitable for loop conditions that should eventually take both branches
	/// under a fair strategy (§4.6).
	pub fn fair_random(&mut self) -> bool {
		match self.host.fair_random() {
			Ok(value) => value,
			Err(err) => {
				self.record_fault(err);
				false
			},
		}
	}

	pub fn start_timer(&mut self, name: &'static str, periodic: bool) {
		self.effects.timer_starts.push((name, periodic));
	}

	pub fn stop_timer(&mut self, name: &'static str) {
		self.effects.timer_stops.push(name);
	}

	/// Requests a graceful halt: the actor runs its `OnHalt` handler and then
	/// drains to `Completed` (§4.2, §4.3).
	pub fn halt(&mut self) {
		self.effects.halt = true;
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	#[derive(Default)]
	struct StubHost {
		sent: Vec<(ActorId, ActorId)>,
		halted_actors: HashMap<ActorId, bool>,
	}

	impl ActionHost for StubHost {
		fn send_event(&mut self, from: ActorId, to: ActorId, _event: Event) -> Result<(), RuntimeError> {
			self.sent.push((from, to));
			Ok(())
		}

		fn create_actor(
			&mut self,
			_creator: ActorId,
			_type_name: &'static str,
			_machine: Arc<StateMachineDef>,
			_ctor_event: Option<Event>,
		) -> Result<ActorId, RuntimeError> {
			unimplemented!("not exercised by these tests")
		}

		fn invoke_monitor(&mut self, _monitor_type: &'static str, _event: Event) -> Result<(), RuntimeError> {
			Ok(())
		}

		fn random_boolean(&mut self) -> Result<bool, RuntimeError> {
			Ok(true)
		}

		fn random_integer(&mut self, _upper: u64) -> Result<u64, RuntimeError> {
			Ok(0)
		}

		fn fair_random(&mut self) -> Result<bool, RuntimeError> {
			Ok(true)
		}
	}

	fn actor(name: &str) -> ActorId {
		common::IdAllocator::new().next_actor_id(name, None, None)
	}

	#[test]
	fn assert_false_records_an_assertion_failure_fault() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, false);
		ctx.assert_that(true, "should not fire");
		ctx.assert_that(false, "boom");
		let (fault, _effects) = ctx.finish();
		let fault = fault.expect("fault recorded");
		assert!(matches!(fault, RuntimeError::Bug(BugKind::AssertionFailure(m)) if m == "boom"));
	}

	#[test]
	fn raise_inside_halt_handler_is_rejected() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, true);
		ctx.raise(42_i32);
		let (fault, effects) = ctx.finish();
		let fault = fault.expect("fault recorded");
		assert!(matches!(
			fault,
			RuntimeError::Bug(BugKind::IllegalOperationWhileHalted { operation: "raise", .. })
		));
		assert!(effects.raised.is_none());
	}

	#[test]
	fn goto_inside_halt_handler_is_rejected() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, true);
		ctx.goto("Elsewhere");
		let (fault, effects) = ctx.finish();
		let fault = fault.expect("fault recorded");
		assert!(matches!(
			fault,
			RuntimeError::Bug(BugKind::IllegalOperationWhileHalted { operation: "goto", .. })
		));
		assert!(effects.goto.is_none());
	}

	#[test]
	fn receive_marks_the_context_as_blocked() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, false);
		ctx.receive(ReceivePredicate::of_types(vec!["Ping"]));
		assert!(ctx.is_blocked_on_receive());
		let (_fault, effects) = ctx.finish();
		assert!(effects.receive_predicate.is_some());
	}

	#[test]
	fn halt_and_timer_requests_are_recorded_without_reaching_the_host() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, false);
		ctx.start_timer("Retry", false);
		ctx.stop_timer("Other");
		ctx.halt();
		let (fault, effects) = ctx.finish();
		assert!(fault.is_none());
		assert!(effects.halt);
		assert_eq!(effects.timer_starts, vec![("Retry", false)]);
		assert_eq!(effects.timer_stops, vec!["Other"]);
		assert!(host.sent.is_empty());
	}

	#[test]
	fn reporting_an_uncontrolled_invocation_records_a_process_fatal_fault() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, false);
		ctx.report_uncontrolled_invocation("thread::sleep");
		let (fault, _effects) = ctx.finish();
		let fault = fault.expect("fault recorded");
		assert!(matches!(fault, RuntimeError::UncontrolledInvocation { api: "thread::sleep" }));
		assert!(fault.is_process_fatal());
	}

	#[test]
	fn take_raised_and_take_fault_do_not_consume_the_context() {
		let mut host = StubHost::default();
		let id = actor("A");
		let mut ctx = ActionCtx::new(id, &mut host, false);
		ctx.raise(7_i32);
		assert!(ctx.take_raised().is_some());
		assert!(ctx.take_raised().is_none());
		ctx.assert_that(false, "boom");
		assert!(ctx.has_fault());
		let fault = ctx.take_fault();
		assert!(fault.is_some());
		assert!(!ctx.has_fault());
	}
}
