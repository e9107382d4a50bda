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

//! The per-operation step algorithm (§4.2): dequeue, resolve a handler by
//! walking the state stack toward the root, run it, apply its transition,
//! and drain any events it raised before handing control back to the
//! scheduler.
//!
//! This module only knows about one [`ActorCell`] at a time plus the
//! [`ActionHost`] trait object — it never touches the engine's actor table
//! directly, so the `remove`-then-reinsert dance that makes a cross-actor
//! effect borrow-check lives entirely in `engine`, not here. Every effect an
//! action requests that stays within the calling actor's own cell (raise,
//! goto, push, pop, receive, timers, halt) is applied directly against
//! `&mut ActorCell` here, without going through `ActionHost` at all.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::{
	actor::{ActorCell, Lifecycle},
	context::{ActionCtx, ActionHost, RequestedEffects},
	error::{BugKind, RuntimeError},
	event::{halt_event_type, Event, Halt},
	observer::{RuntimeObserver, TransitionKind},
	queue::{DequeueOutcome, EnqueueOutcome},
	state::{Action, ExceptionDecision, Transition},
	timer::TimerFired,
};

/// Runs exactly one operation step for `cell`. Callers must only invoke this
/// when the scheduler has chosen `cell`'s operation from the enabled set.
pub fn run_one_operation(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
) -> Result<(), RuntimeError> {
	if cell.lifecycle == Lifecycle::Created {
		cell.lifecycle = Lifecycle::Running;
		let start_state = cell.current_state_name();
		let ctor_event = cell.ctor_event.take();
		run_entry(cell, host, observer, start_state, ctor_event)?;
	} else {
		if !cell.queue.has_ready_event(cell.current_state_has_default()) && !cell.timers.is_empty() {
			fire_a_timer(cell, host, observer)?;
		}
		match cell.queue.dequeue(cell.current_state_has_default()) {
			DequeueOutcome::Event(event) => {
				observer.on_dequeue(&cell.id, event.type_name());
				handle_event(cell, host, observer, event)?;
			},
			DequeueOutcome::DefaultRaised => {
				let state_name = cell.current_state_name();
				observer.on_default_event_handler(&cell.id, state_name);
				let default = cell.machine.state(state_name).default.clone();
				if let Some(action) = default {
					run_action(cell, host, observer, &action, None, "OnEventDefault")?;
				}
			},
			DequeueOutcome::NotReady => {
				// The scheduler only runs operations it found enabled; reaching
				// this means bookkeeping drifted out of sync with the queue.
				unreachable!("operation was scheduled while not actually runnable");
			},
		}
	}
	if cell.lifecycle != Lifecycle::Halted {
		refresh_enabled_state(cell);
	}
	Ok(())
}

/// Picks one of `cell`'s active logical timers to fire via the shared oracle
/// (§5) and delivers a [`TimerFired`] event into the actor's own queue ahead
/// of the dequeue that follows — the timer becomes one more nondeterministic
/// choice rather than firing deterministically the moment it is started.
fn fire_a_timer(cell: &mut ActorCell, host: &mut dyn ActionHost, observer: &dyn RuntimeObserver) -> Result<(), RuntimeError> {
	let mut names: Vec<&'static str> = cell.timers.active_names().collect();
	names.sort_unstable();
	let index = host.random_integer(names.len() as u64)? as usize;
	let name = names[index];
	cell.timers.fired(name);
	observer.on_timer_fired(&cell.id, name);
	match cell.queue.enqueue(Event::new(TimerFired { timer_name: name })) {
		EnqueueOutcome::Appended => {},
		EnqueueOutcome::UnblockedReceive(delivered) => cell.queue.deliver_unblocked(delivered),
	}
	Ok(())
}

/// Walks the state stack from current toward root looking for a handler for
/// `event`'s type, popping (and running exit actions) along the way — the
/// `OnPopUnhandledEvent` hook (§6) fires for each pop this induces. Reports
/// `UnhandledEvent` if even the root has no handler.
fn handle_event(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	event: Event,
) -> Result<(), RuntimeError> {
	loop {
		let state_name = cell.current_state_name();
		let state_def = Arc::clone(cell.machine.state(state_name));
		if let Some(transition) = state_def.handlers.get(event.type_name()).cloned() {
			return apply_transition(cell, host, observer, transition, Some(event));
		}
		if cell.stack.depth() > 1 {
			observer.on_pop_unhandled_event(&cell.id, event.type_name(), state_name);
			run_exit(cell, host, observer, state_name)?;
			cell.stack.pop();
			apply_defer_and_ignore(cell, cell.current_state_name());
			observer.on_state_transition(&cell.id, cell.current_state_name(), TransitionKind::Entry);
			continue;
		}
		let event_type = event.type_name();
		// §4.7: `onEventUnhandled` is a pure notification, fired before the
		// event is turned into an exception-producing situation that
		// `onException` then gets to decide the fate of.
		if let Some(hook) = cell.machine.on_event_unhandled.clone() {
			hook(cell.user_state.as_mut(), event_type, state_name);
		}
		let bug = BugKind::UnhandledEvent { actor: cell.id.clone(), event_type, state: state_name };
		return apply_exception_policy(cell, host, observer, "OnEventDequeue", bug);
	}
}

/// Runs the actor's `onException` policy (§4.7) against an already-detected
/// fault — a caught panic, or (via [`handle_event`]) an event that reached
/// the root state unhandled. Absent a registered handler, the default
/// decision is `ThrowException`, which preserves this engine's behavior
/// before `onException` existed: the fault ends the iteration as `bug`.
fn apply_exception_policy(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	method_name: &'static str,
	bug: BugKind,
) -> Result<(), RuntimeError> {
	let message = bug.to_string();
	observer.on_exception_thrown(&cell.id, &message);
	let decision = match cell.machine.on_exception.clone() {
		Some(handler) => handler(cell.user_state.as_mut(), method_name, &message),
		None => ExceptionDecision::ThrowException,
	};
	match decision {
		ExceptionDecision::HandledException => {
			observer.on_exception_handled(&cell.id, &message);
			Ok(())
		},
		ExceptionDecision::HaltMachine => run_halt(cell, host, observer),
		ExceptionDecision::ThrowException => Err(RuntimeError::Bug(bug)),
	}
}

/// Extracts a printable message from a caught panic payload — the same two
/// shapes (`&'static str`, `String`) `std::panic` ever hands a hook.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"actor action panicked with a non-string payload".to_string()
	}
}

fn apply_transition(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	transition: Transition,
	event: Option<Event>,
) -> Result<(), RuntimeError> {
	match transition {
		Transition::DoAction(action) => run_action(cell, host, observer, &action, event, "OnEventDoAction"),
		Transition::Goto(target) => do_goto(cell, host, observer, target),
		Transition::Push(target) => do_push(cell, host, observer, target),
	}
}

fn do_goto(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	target: &'static str,
) -> Result<(), RuntimeError> {
	observer.on_goto(&cell.id, cell.current_state_name(), target);
	exit_to_root(cell, host, observer)?;
	cell.stack.reset_to(target);
	run_entry(cell, host, observer, target, None)
}

fn do_push(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	target: &'static str,
) -> Result<(), RuntimeError> {
	observer.on_push(&cell.id, cell.current_state_name(), target);
	cell.stack.push(target);
	run_entry(cell, host, observer, target, None)
}

fn do_pop(cell: &mut ActorCell, host: &mut dyn ActionHost, observer: &dyn RuntimeObserver) -> Result<(), RuntimeError> {
	if cell.stack.depth() <= 1 {
		return Err(RuntimeError::Bug(BugKind::AssertionFailure(format!(
			"actor '{}' attempted to pop its root state",
			cell.id
		))));
	}
	let from = cell.current_state_name();
	run_exit(cell, host, observer, from)?;
	cell.stack.pop();
	// §4.2 step 5: entry is not re-run on pop, only the "current state" label
	// updates — but the revealed state's own defer/ignore sets still need to
	// take over, since they are not re-applied by an entry action here.
	apply_defer_and_ignore(cell, cell.current_state_name());
	observer.on_pop(&cell.id, cell.current_state_name());
	Ok(())
}

/// Runs the exit action of every currently-active state, top to root,
/// leaving the stack itself untouched (the caller resets it immediately
/// after) — see DESIGN.md for why `Goto` unwinds the whole stack here.
fn exit_to_root(cell: &mut ActorCell, host: &mut dyn ActionHost, observer: &dyn RuntimeObserver) -> Result<(), RuntimeError> {
	let chain: Vec<&'static str> = cell.stack.top_to_root().collect();
	for state_name in chain {
		run_exit(cell, host, observer, state_name)?;
	}
	Ok(())
}

fn run_entry(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	state_name: &'static str,
	event: Option<Event>,
) -> Result<(), RuntimeError> {
	observer.on_state_transition(&cell.id, state_name, TransitionKind::Entry);
	apply_defer_and_ignore(cell, state_name);
	let entry = cell.machine.state(state_name).entry.clone();
	if let Some(action) = entry {
		run_action(cell, host, observer, &action, event, "OnEntry")?;
	}
	Ok(())
}

/// The defer/ignore sets active on the queue always mirror the topmost
/// state's own declarations (see DESIGN.md on why only the topmost state's
/// sets apply, not its ancestors'): every place the "current state" label
/// changes — entry, and a bare pop that reveals a state without re-entering
/// it — must call this.
fn apply_defer_and_ignore(cell: &mut ActorCell, state_name: &'static str) {
	let defer = cell.machine.state(state_name).defer.clone();
	let ignore = cell.machine.state(state_name).ignore.clone();
	cell.queue.set_defer(defer);
	cell.queue.set_ignore(ignore);
}

fn run_exit(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	state_name: &'static str,
) -> Result<(), RuntimeError> {
	observer.on_state_transition(&cell.id, state_name, TransitionKind::Exit);
	let exit = cell.machine.state(state_name).exit.clone();
	if let Some(action) = exit {
		run_action(cell, host, observer, &action, None, "OnExit")?;
	}
	Ok(())
}

fn run_action(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	action: &Action,
	event: Option<Event>,
	method_name: &'static str,
) -> Result<(), RuntimeError> {
	observer.on_execute_action(&cell.id, cell.current_state_name());
	let in_halt_handler = cell.lifecycle == Lifecycle::Halting;
	let mut ctx = ActionCtx::new(cell.id.clone(), host, in_halt_handler);
	if let Some(event) = event {
		ctx = ctx.with_event(event);
	}
	// §4.7: a user action that panics is this engine's "raised exception" —
	// caught here, at the single point every action invocation passes
	// through, rather than unwinding the whole exploration run.
	match catch_unwind(AssertUnwindSafe(|| {
		action(cell.user_state.as_mut(), &mut ctx);
	})) {
		Ok(()) => {},
		Err(payload) => {
			let message = panic_message(payload.as_ref());
			let bug = BugKind::UnhandledUserException { actor: cell.id.clone(), source: message };
			return apply_exception_policy(cell, host, observer, method_name, bug);
		},
	}
	let (fault, effects) = ctx.finish();
	if let Some(err) = fault {
		return Err(err);
	}
	apply_effects(cell, host, observer, effects)
}

/// Applies every same-actor effect an action requested, in the order
/// `dispatch` owns: timers first (harmless bookkeeping), then receive/halt/
/// goto/push/pop/raise as the (mutually-exclusive-in-practice) terminal
/// effect of the step — see `RequestedEffects`' doc comment for the
/// precedence when more than one was requested.
fn apply_effects(
	cell: &mut ActorCell,
	host: &mut dyn ActionHost,
	observer: &dyn RuntimeObserver,
	effects: RequestedEffects,
) -> Result<(), RuntimeError> {
	for (name, periodic) in effects.timer_starts {
		cell.timers.start(name, periodic);
	}
	for name in effects.timer_stops {
		cell.timers.stop(name);
	}
	if let Some(predicate) = effects.receive_predicate {
		observer.on_wait(&cell.id);
		cell.queue.begin_receive(predicate.clone());
		cell.operation.mark_waiting_to_receive(predicate);
		return Ok(());
	}
	if effects.halt {
		return run_halt(cell, host, observer);
	}
	if let Some(target) = effects.goto {
		return do_goto(cell, host, observer, target);
	}
	if let Some(target) = effects.push {
		return do_push(cell, host, observer, target);
	}
	if effects.pop {
		return do_pop(cell, host, observer);
	}
	if let Some(raised) = effects.raised {
		observer.on_raise_event(&cell.id, raised.type_name());
		observer.on_handle_raised_event(&cell.id, raised.type_name());
		return handle_event(cell, host, observer, raised);
	}
	Ok(())
}

/// Runs the actor's `OnHalt` handler (if one is registered anywhere on the
/// current state stack) and then drains the queue, reporting
/// `MustHandleViolation` for any must-handle event still pending (§4.1,
/// §4.2).
fn run_halt(cell: &mut ActorCell, host: &mut dyn ActionHost, observer: &dyn RuntimeObserver) -> Result<(), RuntimeError> {
	cell.lifecycle = Lifecycle::Halting;
	observer.on_halt(&cell.id);
	let halt_type = halt_event_type();
	let chain: Vec<&'static str> = cell.stack.top_to_root().collect();
	for state_name in chain {
		let state_def = Arc::clone(cell.machine.state(state_name));
		if let Some(Transition::DoAction(action)) = state_def.handlers.get(halt_type).cloned() {
			run_action(cell, host, observer, &action, Some(Event::new(Halt)), "OnHalt")?;
			break;
		}
	}
	for drained in cell.queue.drain_all() {
		if drained.is_must_handle() {
			return Err(RuntimeError::Bug(BugKind::MustHandleViolation {
				actor: cell.id.clone(),
				event_type: drained.type_name(),
			}));
		}
	}
	cell.lifecycle = Lifecycle::Halted;
	cell.operation.mark_completed();
	Ok(())
}

/// After a step completes without blocking or halting, re-derives whether
/// the operation has more work ready (§4.1): a pending dequeue-able event or
/// a default handler.
///
/// An actor whose queue is simply empty — not an explicit `receive(...)` —
/// is treated the same as `WaitingToReceive` rather than staying `Enabled`
/// with nothing to dequeue: scheduling it again would hit the `unreachable!`
/// in `run_one_operation`, and §4.4's own deadlock rule ("E empty, at least
/// one `WaitingToReceive`") does not distinguish an explicit receive from an
/// actor that has simply run out of work — see DESIGN.md.
/// `ActionHost::send_event` is responsible for flipping it back to `Enabled`
/// the moment something is actually enqueued.
fn refresh_enabled_state(cell: &mut ActorCell) {
	if cell.operation.is_waiting_to_receive() {
		return;
	}
	if cell.queue.has_ready_event(cell.current_state_has_default()) || !cell.timers.is_empty() {
		cell.operation.mark_enabled();
	} else {
		cell.operation.mark_waiting_to_receive(crate::event::ReceivePredicate::of_types(Vec::new()));
	}
}
