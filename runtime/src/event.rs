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

//! Events are the immutable messages actors and monitors exchange (§3 Data Model).
//!
//! An event's payload type is erased behind `Box<dyn Any + Send + Sync>` so that
//! the engine can hold a single homogeneous queue per actor regardless of how
//! many distinct event types the program defines; handler tables key off the
//! static type name instead of reflecting over attributes, per the Design Notes'
//! "tagged variant" re-architecture.

use std::{
	any::Any,
	fmt,
	sync::{Arc, Mutex},
};

use common::{ActorId, OpGroupId};

/// Marker trait for anything that can ride inside an [`Event`].
///
/// Blanket-implemented for every `'static + Send + Sync + Debug` type, mirroring
/// how the teacher's `Envelope<A>` captures an arbitrary message behind `Box<dyn Any>`.
pub trait EventPayload: Any + fmt::Debug + Send + Sync {}
impl<T: Any + fmt::Debug + Send + Sync> EventPayload for T {}

/// An immutable typed message passed between actors.
pub struct Event {
	type_name: &'static str,
	payload: Arc<dyn Any + Send + Sync>,
	debug: String,
	sender: Option<ActorId>,
	op_group: Option<OpGroupId>,
	must_handle: bool,
}

impl Event {
	pub fn new<T: EventPayload>(payload: T) -> Self {
		Event {
			type_name: std::any::type_name::<T>(),
			debug: format!("{payload:?}"),
			payload: Arc::new(payload),
			sender: None,
			op_group: None,
			must_handle: false,
		}
	}

	#[must_use]
	pub fn with_sender(mut self, sender: ActorId) -> Self {
		self.sender = Some(sender);
		self
	}

	#[must_use]
	pub fn with_op_group(mut self, op_group: OpGroupId) -> Self {
		self.op_group = Some(op_group);
		self
	}

	/// Marks the event as must-handle: the recipient must dequeue it before
	/// halting, or a `BugKind::MustHandleViolation` is reported (§7).
	#[must_use]
	pub fn must_handle(mut self) -> Self {
		self.must_handle = true;
		self
	}

	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	pub fn sender(&self) -> Option<&ActorId> {
		self.sender.as_ref()
	}

	pub fn op_group(&self) -> Option<OpGroupId> {
		self.op_group
	}

	pub fn is_must_handle(&self) -> bool {
		self.must_handle
	}

	pub fn downcast_ref<T: EventPayload>(&self) -> Option<&T> {
		self.payload.downcast_ref::<T>()
	}

	/// Identity of this event's payload allocation, for `sendEventAndExecute`
	/// (§6) to tell whether the event it just sent is the one a forced
	/// synchronous step actually consumed, rather than some other event
	/// already ahead of it in the target's queue.
	pub(crate) fn payload_handle(&self) -> Arc<dyn Any + Send + Sync> {
		Arc::clone(&self.payload)
	}

	pub(crate) fn matches_payload(&self, needle: &Arc<dyn Any + Send + Sync>) -> bool {
		Arc::ptr_eq(&self.payload, needle)
	}
}

impl Clone for Event {
	fn clone(&self) -> Self {
		Event {
			type_name: self.type_name,
			payload: Arc::clone(&self.payload),
			debug: self.debug.clone(),
			sender: self.sender.clone(),
			op_group: self.op_group,
			must_handle: self.must_handle,
		}
	}
}

impl fmt::Debug for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Event")
			.field("type_name", &self.type_name)
			.field("payload", &self.debug)
			.field("sender", &self.sender)
			.field("must_handle", &self.must_handle)
			.finish()
	}
}

/// Sentinel payload used to address a state's `OnHalt` handler through the
/// ordinary handler table (`StateBuilder::on_halt`), rather than giving
/// `StateDef` a dedicated field for it — halting is just one more event type
/// as far as dispatch is concerned, and states without a handler for it
/// simply skip straight to draining (see `dispatch::run_halt`).
#[derive(Debug)]
pub struct Halt;

pub fn halt_event_type() -> &'static str {
	std::any::type_name::<Halt>()
}

/// A predicate describing an in-flight `receive(eventTypes…)` call (§4.1).
///
/// Stored behind a `Mutex` rather than `Fn(&Event) -> bool` directly so a
/// `ReceivePredicate` can be cheaply cloned into log hooks while the closure
/// itself stays behind a single owner.
#[derive(Clone)]
pub struct ReceivePredicate {
	type_names: Arc<Mutex<Vec<&'static str>>>,
}

impl ReceivePredicate {
	pub fn of_types(type_names: Vec<&'static str>) -> Self {
		ReceivePredicate { type_names: Arc::new(Mutex::new(type_names)) }
	}

	pub fn matches(&self, event: &Event) -> bool {
		self.type_names.lock().unwrap().iter().any(|t| *t == event.type_name())
	}
}

impl fmt::Debug for ReceivePredicate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ReceivePredicate({:?})", self.type_names.lock().unwrap())
	}
}
