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

//! Deterministic identities for actors and operation groups.
//!
//! Unlike a general-purpose id generator, [`IdAllocator`] never touches a
//! randomness source: two iterations that make the same actor-creation calls
//! in the same order must hand out the same [`ActorId`]s, because replay
//! (see the `trace` module) depends on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque correlation tag propagated across sends for causal grouping in logs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OpGroupId(u64);

impl fmt::Display for OpGroupId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "op-group-{}", self.0)
	}
}

/// Value identity of an actor or monitor.
///
/// Stable within one exploration iteration; regenerated deterministically at
/// the start of every iteration by a freshly reset [`IdAllocator`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ActorId {
	sequence: u64,
	name: Option<String>,
	type_tag: String,
	creating_op_group: Option<OpGroupId>,
}

impl ActorId {
	pub fn sequence(&self) -> u64 {
		self.sequence
	}

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn type_tag(&self) -> &str {
		&self.type_tag
	}

	pub fn creating_op_group(&self) -> Option<OpGroupId> {
		self.creating_op_group
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.name {
			Some(name) => write!(f, "{}({})#{}", self.type_tag, name, self.sequence),
			None => write!(f, "{}#{}", self.type_tag, self.sequence),
		}
	}
}

/// Allocates stable, deterministic identities to actors and operation groups.
///
/// One allocator is owned by the test engine and reset at the start of every
/// iteration (see `engine::TestEngine::run_iteration`), so that replaying a
/// recorded trace against a freshly-reset allocator reproduces the exact same
/// `ActorId`s the original run observed.
#[derive(Debug, Default)]
pub struct IdAllocator {
	next_actor_seq: u64,
	next_op_group_seq: u64,
}

impl IdAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Resets the sequence counters. Called once per exploration iteration.
	pub fn reset(&mut self) {
		self.next_actor_seq = 0;
		self.next_op_group_seq = 0;
	}

	/// Allocates the next `ActorId` for an actor or monitor of the given type.
	///
	/// `human_name` is caller-supplied and purely decorative: it is never
	/// part of identity comparison (`ActorId` derives `Eq`/`Hash` over every
	/// field, but two allocations never collide because `sequence` is unique
	/// per iteration).
	pub fn next_actor_id(
		&mut self,
		type_tag: impl Into<String>,
		human_name: Option<String>,
		creating_op_group: Option<OpGroupId>,
	) -> ActorId {
		let sequence = self.next_actor_seq;
		self.next_actor_seq += 1;
		ActorId { sequence, name: human_name, type_tag: type_tag.into(), creating_op_group }
	}

	/// Allocates a fresh operation-group correlation tag.
	pub fn next_op_group(&mut self) -> OpGroupId {
		let seq = self.next_op_group_seq;
		self.next_op_group_seq += 1;
		OpGroupId(seq)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sequence_is_monotonic_and_deterministic() {
		let mut alloc = IdAllocator::new();
		let a = alloc.next_actor_id("Worker", None, None);
		let b = alloc.next_actor_id("Worker", None, None);
		assert_eq!(a.sequence(), 0);
		assert_eq!(b.sequence(), 1);
		assert_ne!(a, b);
	}

	#[test]
	fn reset_reproduces_identical_ids() {
		let mut alloc = IdAllocator::new();
		let first_run: Vec<ActorId> = (0..5).map(|_| alloc.next_actor_id("Node", None, None)).collect();
		alloc.reset();
		let second_run: Vec<ActorId> = (0..5).map(|_| alloc.next_actor_id("Node", None, None)).collect();
		assert_eq!(first_run, second_run);
	}

	#[test]
	fn human_name_is_decorative_only() {
		let mut alloc = IdAllocator::new();
		let named = alloc.next_actor_id("Node", Some("leader".to_string()), None);
		assert_eq!(named.name(), Some("leader"));
		assert_eq!(format!("{named}"), "Node(leader)#0");
	}

	#[test]
	fn op_group_sequence_is_independent_of_actor_sequence() {
		let mut alloc = IdAllocator::new();
		let _ = alloc.next_actor_id("Node", None, None);
		let group = alloc.next_op_group();
		assert_eq!(format!("{group}"), "op-group-0");
	}
}
