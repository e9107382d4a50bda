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

//! The schedulable unit (§3 Data Model).
//!
//! Unlike the teacher's `ActorState`, which is an `AtomicU32` shared across
//! OS threads (because several actors genuinely run concurrently there),
//! `OperationStatus` here is a plain enum: the whole engine is single-threaded
//! by construction (§5 — "exactly one operation is executing at any moment"
//! is realized by never handing two operations the CPU at once), so there is
//! nothing to race.

use common::ActorId;

use crate::event::ReceivePredicate;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperationStatus {
	/// Has a runnable next step: an event ready to dequeue, a default
	/// handler, or is newly created and has not run yet.
	Enabled,
	/// Blocked in `receive(...)`; becomes enabled again once a matching
	/// event is enqueued (§4.1).
	WaitingToReceive,
	/// The actor has halted; the operation is retained only long enough for
	/// bookkeeping and is then removed from the table.
	Completed,
}

/// One schedulable operation: one per actor/monitor-hosting actor, plus the
/// implicit top-level controller operation that the engine itself occupies
/// between iterations.
#[derive(Clone, Debug)]
pub struct Operation {
	pub actor_id: ActorId,
	pub status: OperationStatus,
	pub receive_predicate: Option<ReceivePredicate>,
}

impl Operation {
	pub fn new(actor_id: ActorId) -> Self {
		Operation { actor_id, status: OperationStatus::Enabled, receive_predicate: None }
	}

	pub fn is_enabled(&self) -> bool {
		self.status == OperationStatus::Enabled
	}

	pub fn is_waiting_to_receive(&self) -> bool {
		self.status == OperationStatus::WaitingToReceive
	}

	pub fn is_completed(&self) -> bool {
		self.status == OperationStatus::Completed
	}

	pub fn mark_waiting_to_receive(&mut self, predicate: ReceivePredicate) {
		self.status = OperationStatus::WaitingToReceive;
		self.receive_predicate = Some(predicate);
	}

	pub fn mark_enabled(&mut self) {
		self.status = OperationStatus::Enabled;
		self.receive_predicate = None;
	}

	pub fn mark_completed(&mut self) {
		self.status = OperationStatus::Completed;
		self.receive_predicate = None;
	}
}
