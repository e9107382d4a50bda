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

//! Per-actor FIFO inbox with defer/ignore filters and blocking receive (§4.1).
//!
//! No lock guards this structure: each actor's queue is owned outright by the
//! actor table and only ever touched by the controller while that actor's
//! operation holds the turn (§5), so a plain `VecDeque`/`HashSet` pair is
//! sufficient — there is never a second writer to race against.

use std::collections::{HashSet, VecDeque};

use crate::event::{Event, ReceivePredicate};

/// Outcome of `EventQueue::dequeue`.
pub enum DequeueOutcome {
	Event(Event),
	/// No event is ready, but the current state has a default handler.
	DefaultRaised,
	/// No event is ready and there is no default handler.
	NotReady,
}

/// Outcome of `EventQueue::enqueue`.
pub enum EnqueueOutcome {
	/// The event was appended to the back of the pending sequence.
	Appended,
	/// The event matched an in-flight `receive(...)` predicate and was handed
	/// directly to the blocked caller, bypassing normal dequeue order.
	UnblockedReceive(Event),
}

#[derive(Default)]
pub struct EventQueue {
	pending: VecDeque<Event>,
	defer: HashSet<&'static str>,
	ignore: HashSet<&'static str>,
	blocked_on: Option<ReceivePredicate>,
}

impl EventQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_defer(&mut self, types: HashSet<&'static str>) {
		self.defer = types;
	}

	pub fn set_ignore(&mut self, types: HashSet<&'static str>) {
		self.ignore = types;
	}

	pub fn is_deferred(&self, type_name: &str) -> bool {
		self.defer.contains(type_name)
	}

	pub fn is_ignored(&self, type_name: &str) -> bool {
		self.ignore.contains(type_name)
	}

	pub fn is_blocked_on_receive(&self) -> bool {
		self.blocked_on.is_some()
	}

	/// Begins a `receive(eventTypes…)` suspension: only events matching the
	/// predicate will be delivered until it resolves.
	pub fn begin_receive(&mut self, predicate: ReceivePredicate) {
		self.blocked_on = Some(predicate);
	}

	/// §4.1 enqueue policy: a matching blocked receive short-circuits normal
	/// ordering for the blocking caller only; otherwise the event is appended.
	pub fn enqueue(&mut self, event: Event) -> EnqueueOutcome {
		if let Some(predicate) = self.blocked_on.clone() {
			if predicate.matches(&event) {
				self.blocked_on = None;
				return EnqueueOutcome::UnblockedReceive(event);
			}
		}
		self.pending.push_back(event);
		EnqueueOutcome::Appended
	}

	/// §4.1 dequeue algorithm: scan in insertion order, permanently dropping
	/// ignored entries and skipping over (but preserving) deferred ones.
	///
	/// Re-checks the stored `receive(...)` predicate first: while it is set,
	/// nothing in `pending` has been found to match it yet, so there is
	/// nothing here this call is entitled to hand out as an ordinary event —
	/// only `enqueue`'s `UnblockedReceive` path may deliver to a blocked
	/// receiver, by clearing `blocked_on` and handing the event straight back.
	pub fn dequeue(&mut self, current_state_has_default: bool) -> DequeueOutcome {
		if self.blocked_on.is_some() {
			return DequeueOutcome::NotReady;
		}
		let mut i = 0;
		while i < self.pending.len() {
			let type_name = self.pending[i].type_name();
			if self.ignore.contains(type_name) {
				self.pending.remove(i);
				continue;
			}
			if self.defer.contains(type_name) {
				i += 1;
				continue;
			}
			let event = self.pending.remove(i).expect("index was just bounds-checked");
			return DequeueOutcome::Event(event);
		}
		if current_state_has_default {
			DequeueOutcome::DefaultRaised
		} else {
			DequeueOutcome::NotReady
		}
	}

	/// Non-mutating version of the `dequeue` readiness check: does it have a
	/// dispatchable event or a default handler to fall back on, without
	/// actually consuming anything? Used to decide whether an operation stays
	/// `Enabled` after a step, or after another actor's step enqueues into it.
	pub fn has_ready_event(&self, current_state_has_default: bool) -> bool {
		let ready = self.pending.iter().any(|event| {
			let type_name = event.type_name();
			!self.ignore.contains(type_name) && !self.defer.contains(type_name)
		});
		ready || current_state_has_default
	}

	/// Re-inserts an event unblocked by `enqueue` at the very front of the
	/// pending sequence, so the next `dequeue` call (once the operation is
	/// marked enabled again) picks it up ahead of anything already waiting.
	pub fn deliver_unblocked(&mut self, event: Event) {
		self.pending.push_front(event);
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	/// Drains the whole queue. Used at halt time (§4.1, §4.2) so the caller can
	/// scan the drained events for any still-pending must-handle violation.
	pub fn drain_all(&mut self) -> Vec<Event> {
		self.pending.drain(..).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug)]
	struct Deferred;
	#[derive(Debug)]
	struct Trigger;
	#[derive(Debug)]
	struct Ignored;

	fn type_name<T>() -> &'static str {
		std::any::type_name::<T>()
	}

	#[test]
	fn fifo_per_sender() {
		let mut q = EventQueue::new();
		q.enqueue(Event::new(Deferred));
		q.enqueue(Event::new(Trigger));
		let DequeueOutcome::Event(e1) = q.dequeue(false) else { panic!("expected event") };
		let DequeueOutcome::Event(e2) = q.dequeue(false) else { panic!("expected event") };
		assert_eq!(e1.type_name(), type_name::<Deferred>());
		assert_eq!(e2.type_name(), type_name::<Trigger>());
	}

	#[test]
	fn defer_preserves_order_relative_to_other_deferred_events() {
		let mut q = EventQueue::new();
		let mut defer = HashSet::new();
		defer.insert(type_name::<Deferred>());
		q.set_defer(defer);
		q.enqueue(Event::new(Deferred));
		q.enqueue(Event::new(Trigger));
		// Trigger dispatches first: Deferred is skipped, not dropped.
		let DequeueOutcome::Event(e) = q.dequeue(false) else { panic!("expected event") };
		assert_eq!(e.type_name(), type_name::<Trigger>());
		// Clearing defer reveals Deferred still first in line.
		q.set_defer(HashSet::new());
		let DequeueOutcome::Event(e) = q.dequeue(false) else { panic!("expected event") };
		assert_eq!(e.type_name(), type_name::<Deferred>());
	}

	#[test]
	fn ignore_is_silent_loss() {
		let mut q = EventQueue::new();
		let mut ignore = HashSet::new();
		ignore.insert(type_name::<Ignored>());
		q.set_ignore(ignore);
		q.enqueue(Event::new(Ignored));
		q.enqueue(Event::new(Trigger));
		q.set_ignore(HashSet::new());
		// Ignored was dropped at dequeue time, never resurrected.
		let DequeueOutcome::Event(e) = q.dequeue(false) else { panic!("expected event") };
		assert_eq!(e.type_name(), type_name::<Trigger>());
	}

	#[test]
	fn not_ready_without_default_handler() {
		let mut q = EventQueue::new();
		assert!(matches!(q.dequeue(false), DequeueOutcome::NotReady));
	}

	#[test]
	fn default_raised_when_handler_registered() {
		let mut q = EventQueue::new();
		assert!(matches!(q.dequeue(true), DequeueOutcome::DefaultRaised));
	}

	#[test]
	fn blocked_receive_bypasses_normal_order() {
		let mut q = EventQueue::new();
		q.enqueue(Event::new(Deferred));
		q.begin_receive(ReceivePredicate::of_types(vec![type_name::<Trigger>()]));
		match q.enqueue(Event::new(Trigger)) {
			EnqueueOutcome::UnblockedReceive(e) => assert_eq!(e.type_name(), type_name::<Trigger>()),
			EnqueueOutcome::Appended => panic!("expected the receive to be unblocked directly"),
		}
		// The earlier Deferred event is still waiting in normal FIFO order.
		let DequeueOutcome::Event(e) = q.dequeue(false) else { panic!("expected event") };
		assert_eq!(e.type_name(), type_name::<Deferred>());
	}

	#[test]
	fn has_ready_event_ignores_deferred_and_honors_default() {
		let mut q = EventQueue::new();
		assert!(!q.has_ready_event(false));
		assert!(q.has_ready_event(true));
		let mut defer = HashSet::new();
		defer.insert(type_name::<Deferred>());
		q.set_defer(defer);
		q.enqueue(Event::new(Deferred));
		assert!(!q.has_ready_event(false));
		q.enqueue(Event::new(Trigger));
		assert!(q.has_ready_event(false));
	}

	#[test]
	fn halt_drains_queue() {
		let mut q = EventQueue::new();
		q.enqueue(Event::new(Trigger));
		assert!(!q.is_empty());
		let drained = q.drain_all();
		assert_eq!(drained.len(), 1);
		assert!(q.is_empty());
	}
}
