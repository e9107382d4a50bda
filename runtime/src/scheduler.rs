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

//! `schedule()`: the contract every scheduling point invokes (§4.4).
//!
//! Runs entirely synchronously on the controller; there is no per-operation
//! rendezvous primitive to release and reacquire because only one logical
//! thread of control ever exists in this engine (see DESIGN.md for why that
//! satisfies §5's "exactly one operation executing at any moment" without a
//! `tokio::sync::Notify` handoff).

use std::collections::HashMap;

use common::ActorId;

use crate::{
	error::{BugKind, RuntimeError},
	operation::Operation,
	oracle::NondeterministicOracle,
	strategy::StrategyFault,
	trace::TraceRecorder,
};

pub enum ScheduleDecision {
	Run(ActorId),
	IterationComplete,
}

/// Turns a strategy-level fault into the taxonomy entry it corresponds to
/// (§7#9 if it is a replay divergence, §7#10 otherwise).
pub fn fault_to_runtime_error(strategy: &str, step: usize, fault: StrategyFault) -> RuntimeError {
	match fault {
		StrategyFault::Error(description) => {
			RuntimeError::Bug(BugKind::StrategyError { strategy: strategy.to_string(), description })
		},
		StrategyFault::ReplayDivergence { recorded } => RuntimeError::ReplayDivergence { step, recorded },
	}
}

pub struct OperationScheduler {
	history: Vec<ActorId>,
	step_count: usize,
	max_steps: usize,
}

impl OperationScheduler {
	pub fn new(max_steps: usize) -> Self {
		OperationScheduler { history: Vec::new(), step_count: 0, max_steps }
	}

	pub fn history(&self) -> &[ActorId] {
		&self.history
	}

	pub fn reset(&mut self) {
		self.history.clear();
		self.step_count = 0;
	}

	/// The §4.4 contract: compute the enabled set, detect deadlock, and — if
	/// there is a genuine choice to make — consult the oracle and record it.
	pub fn schedule(
		&mut self,
		operations: &HashMap<ActorId, Operation>,
		oracle: &mut NondeterministicOracle,
		recorder: &mut TraceRecorder,
	) -> Result<ScheduleDecision, RuntimeError> {
		self.step_count += 1;
		if self.step_count > self.max_steps {
			return Err(RuntimeError::Bug(BugKind::StrategyError {
				strategy: oracle.description(),
				description: format!("exceeded the {}-step iteration budget", self.max_steps),
			}));
		}

		let mut enabled: Vec<ActorId> =
			operations.values().filter(|op| op.is_enabled()).map(|op| op.actor_id.clone()).collect();
		if enabled.is_empty() {
			let waiting: Vec<ActorId> =
				operations.values().filter(|op| op.is_waiting_to_receive()).map(|op| op.actor_id.clone()).collect();
			if !waiting.is_empty() {
				return Err(RuntimeError::Bug(BugKind::Deadlock { actors: waiting }));
			}
			return Ok(ScheduleDecision::IterationComplete);
		}
		// Sorted so that, for a fixed sequence of strategy choices, the
		// operation set presented to the strategy is deterministic regardless
		// of `HashMap` iteration order.
		enabled.sort_by_key(|a| a.to_string());

		let chosen = oracle
			.next_operation(&enabled)
			.map_err(|fault| fault_to_runtime_error(&oracle.description(), self.step_count, fault))?;
		recorder.record_operation(chosen.to_string());
		self.history.push(chosen.clone());
		Ok(ScheduleDecision::Run(chosen))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::strategy::RandomStrategy;

	fn operation_map(ids: &[ActorId]) -> HashMap<ActorId, Operation> {
		ids.iter().map(|id| (id.clone(), Operation::new(id.clone()))).collect()
	}

	#[test]
	fn empty_enabled_set_with_no_waiters_completes_the_iteration() {
		let mut scheduler = OperationScheduler::new(100);
		let mut oracle = NondeterministicOracle::new(Box::new(RandomStrategy::new(1)), 0);
		let mut recorder = TraceRecorder::new();
		let ops = HashMap::new();
		let decision = scheduler.schedule(&ops, &mut oracle, &mut recorder).unwrap();
		assert!(matches!(decision, ScheduleDecision::IterationComplete));
	}

	#[test]
	fn all_waiting_with_none_enabled_is_a_deadlock() {
		let mut alloc = common::IdAllocator::new();
		let a = alloc.next_actor_id("A", None, None);
		let mut ops = operation_map(&[a.clone()]);
		ops.get_mut(&a).unwrap().mark_waiting_to_receive(crate::event::ReceivePredicate::of_types(vec!["X"]));
		let mut scheduler = OperationScheduler::new(100);
		let mut oracle = NondeterministicOracle::new(Box::new(RandomStrategy::new(1)), 0);
		let mut recorder = TraceRecorder::new();
		let err = scheduler.schedule(&ops, &mut oracle, &mut recorder).unwrap_err();
		assert!(matches!(err, RuntimeError::Bug(BugKind::Deadlock { .. })));
	}

	#[test]
	fn step_budget_is_enforced() {
		let mut alloc = common::IdAllocator::new();
		let a = alloc.next_actor_id("A", None, None);
		let ops = operation_map(&[a]);
		let mut scheduler = OperationScheduler::new(1);
		let mut oracle = NondeterministicOracle::new(Box::new(RandomStrategy::new(1)), 0);
		let mut recorder = TraceRecorder::new();
		scheduler.schedule(&ops, &mut oracle, &mut recorder).unwrap();
		let err = scheduler.schedule(&ops, &mut oracle, &mut recorder).unwrap_err();
		assert!(matches!(err, RuntimeError::Bug(BugKind::StrategyError { .. })));
	}
}
