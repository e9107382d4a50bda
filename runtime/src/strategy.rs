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

//! Pluggable policies that pick the next runnable operation (§4.5).

use std::collections::{HashMap, HashSet};

use common::ActorId;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::trace::{ScheduleTrace, TraceEntry};

/// A strategy-level failure. `Error` maps to `BugKind::StrategyError` (ends
/// only the current iteration); `ReplayDivergence` maps to
/// `RuntimeError::ReplayDivergence` (always fatal to the whole run, §7).
#[derive(Clone, Debug)]
pub enum StrategyFault {
	Error(String),
	ReplayDivergence { recorded: String },
}

/// Picks the next runnable operation and supplies nondeterministic choices.
///
/// `next_operation`/`next_boolean`/`next_integer` are themselves scheduling
/// points (§4.4, §4.6): every call is recorded into the trace by whoever owns
/// the strategy (`OperationScheduler`/`NondeterministicOracle`), not by the
/// strategy itself.
pub trait ExplorationStrategy: Send {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault>;

	fn next_boolean(&mut self) -> Result<bool, StrategyFault>;

	fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault>;

	/// Called once before every iteration, including the first. Returning
	/// `false` ends the exploration run (`ExitOutcome::StrategyExhausted`).
	fn prepare_for_next_iteration(&mut self) -> bool;

	/// Whether this strategy guarantees every enabled operation eventually
	/// runs in an infinite stream — gates whether liveness violations (§7#7)
	/// are actually reported, since an unfair strategy can starve a hot
	/// state's only way out without that being a real bug.
	fn is_fair(&self) -> bool;

	fn description(&self) -> String;
}

fn sorted_by_display(enabled: &[ActorId]) -> Vec<ActorId> {
	let mut sorted = enabled.to_vec();
	sorted.sort_by_key(|a| a.to_string());
	sorted
}

/// Uniformly random choice among enabled operations.
pub struct RandomStrategy {
	rng: StdRng,
}

impl RandomStrategy {
	pub fn new(seed: u64) -> Self {
		RandomStrategy { rng: StdRng::seed_from_u64(seed) }
	}
}

impl ExplorationStrategy for RandomStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		if enabled.is_empty() {
			return Err(StrategyFault::Error("no enabled operation to choose from".into()));
		}
		let idx = self.rng.gen_range(0..enabled.len());
		Ok(enabled[idx].clone())
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		Ok(self.rng.gen_bool(0.5))
	}

	fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault> {
		if upper == 0 {
			return Ok(0);
		}
		Ok(self.rng.gen_range(0..upper))
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		true
	}

	fn is_fair(&self) -> bool {
		false
	}

	fn description(&self) -> String {
		"random".to_string()
	}
}

/// Weighted toward continuing the previously-scheduled operation, improving
/// locality (fewer, larger interleavings explored per step) compared to pure
/// random.
pub struct ProbabilisticStrategy {
	rng: StdRng,
	continuation_weight: f64,
	last_operation: Option<ActorId>,
}

impl ProbabilisticStrategy {
	pub fn new(seed: u64, continuation_weight: f64) -> Self {
		ProbabilisticStrategy {
			rng: StdRng::seed_from_u64(seed),
			continuation_weight: continuation_weight.clamp(0.0, 1.0),
			last_operation: None,
		}
	}
}

impl ExplorationStrategy for ProbabilisticStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		if enabled.is_empty() {
			return Err(StrategyFault::Error("no enabled operation to choose from".into()));
		}
		let chosen = if let Some(last) = &self.last_operation {
			if enabled.contains(last) && self.rng.gen_bool(self.continuation_weight) {
				last.clone()
			} else {
				enabled[self.rng.gen_range(0..enabled.len())].clone()
			}
		} else {
			enabled[self.rng.gen_range(0..enabled.len())].clone()
		};
		self.last_operation = Some(chosen.clone());
		Ok(chosen)
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		Ok(self.rng.gen_bool(0.5))
	}

	fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault> {
		if upper == 0 {
			return Ok(0);
		}
		Ok(self.rng.gen_range(0..upper))
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		self.last_operation = None;
		true
	}

	fn is_fair(&self) -> bool {
		false
	}

	fn description(&self) -> String {
		format!("probabilistic(w={})", self.continuation_weight)
	}
}

/// Enumerates schedules lexicographically (by `ActorId`'s `Display`) up to a
/// fixed depth, backtracking between iterations like a classic depth-first
/// search over the interleaving tree.
pub struct BoundedDfsStrategy {
	max_depth: usize,
	path: Vec<(usize, usize)>,
	cursor: usize,
	started: bool,
	exhausted: bool,
}

impl BoundedDfsStrategy {
	pub fn new(max_depth: usize) -> Self {
		BoundedDfsStrategy { max_depth, path: Vec::new(), cursor: 0, started: false, exhausted: false }
	}
}

impl ExplorationStrategy for BoundedDfsStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		if self.exhausted {
			return Err(StrategyFault::Error("bounded DFS search space exhausted".into()));
		}
		let sorted = sorted_by_display(enabled);
		if sorted.is_empty() {
			return Err(StrategyFault::Error("no enabled operation to choose from".into()));
		}
		let total = sorted.len();
		let chosen_idx = if self.cursor < self.path.len() {
			let (idx, prev_total) = self.path[self.cursor];
			if idx >= total {
				return Err(StrategyFault::Error(format!(
					"recorded DFS choice {idx} is out of range for {total} enabled operations \
					 (was {prev_total} on the prior run of this prefix)"
				)));
			}
			idx
		} else {
			if self.cursor >= self.max_depth {
				return Err(StrategyFault::Error(format!(
					"bounded DFS depth limit {} exceeded",
					self.max_depth
				)));
			}
			self.path.push((0, total));
			0
		};
		self.cursor += 1;
		Ok(sorted[chosen_idx].clone())
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		Ok(false)
	}

	fn next_integer(&mut self, _upper: u64) -> Result<u64, StrategyFault> {
		Ok(0)
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		self.cursor = 0;
		if !self.started {
			self.started = true;
			return true;
		}
		loop {
			match self.path.pop() {
				None => {
					self.exhausted = true;
					return false;
				},
				Some((idx, total)) => {
					if idx + 1 < total {
						self.path.push((idx + 1, total));
						return true;
					}
				},
			}
		}
	}

	fn is_fair(&self) -> bool {
		false
	}

	fn description(&self) -> String {
		format!("bounded-dfs(depth={})", self.max_depth)
	}
}

/// Breadth-first exploration, realized as iterative deepening over
/// [`BoundedDfsStrategy`]: once depth `k` is fully enumerated, restart at
/// depth `k + 1`. A true level-order BFS would need to hold every unexplored
/// prefix of every depth in memory at once; iterative deepening visits the
/// same depths in the same order using only one prefix stack at a time, at
/// the cost of re-deriving shallow prefixes — the standard trade for
/// unbounded-width schedule trees.
pub struct BfsStrategy {
	depth: usize,
	inner: BoundedDfsStrategy,
}

impl BfsStrategy {
	pub fn new() -> Self {
		BfsStrategy { depth: 1, inner: BoundedDfsStrategy::new(1) }
	}
}

impl Default for BfsStrategy {
	fn default() -> Self {
		Self::new()
	}
}

impl ExplorationStrategy for BfsStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		self.inner.next_operation(enabled)
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		self.inner.next_boolean()
	}

	fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault> {
		self.inner.next_integer(upper)
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		if self.inner.prepare_for_next_iteration() {
			return true;
		}
		self.depth += 1;
		self.inner = BoundedDfsStrategy::new(self.depth);
		self.inner.prepare_for_next_iteration()
	}

	fn is_fair(&self) -> bool {
		false
	}

	fn description(&self) -> String {
		format!("bfs(depth={})", self.depth)
	}
}

/// Priority-Change-Tracing (PCT): assigns each discovered operation a random
/// priority and injects `d` priority-change points per iteration, which is
/// effective at finding bugs with a shallow "bug depth" without the cost of
/// exhaustive search.
pub struct PctStrategy {
	rng: StdRng,
	priority_changes: usize,
	change_points: HashSet<usize>,
	step: usize,
	priorities: HashMap<ActorId, u32>,
	demoted: HashSet<ActorId>,
}

impl PctStrategy {
	pub fn new(seed: u64, priority_changes: usize) -> Self {
		PctStrategy {
			rng: StdRng::seed_from_u64(seed),
			priority_changes,
			change_points: HashSet::new(),
			step: 0,
			priorities: HashMap::new(),
			demoted: HashSet::new(),
		}
	}

	fn priority_of(&mut self, id: &ActorId) -> u32 {
		if self.demoted.contains(id) {
			return u32::MAX;
		}
		if let Some(p) = self.priorities.get(id) {
			return *p;
		}
		let p = self.rng.gen::<u32>();
		self.priorities.insert(id.clone(), p);
		p
	}
}

impl ExplorationStrategy for PctStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		if enabled.is_empty() {
			return Err(StrategyFault::Error("no enabled operation to choose from".into()));
		}
		let mut best: Option<(u32, ActorId)> = None;
		for id in enabled {
			let p = self.priority_of(id);
			if best.as_ref().map(|(bp, _)| p < *bp).unwrap_or(true) {
				best = Some((p, id.clone()));
			}
		}
		let (_, chosen) = best.expect("enabled is non-empty");
		if self.change_points.contains(&self.step) && enabled.len() > 1 {
			self.demoted.insert(chosen.clone());
			// Re-pick now that the chosen operation has been demoted.
			self.step += 1;
			return self.next_operation(enabled);
		}
		self.step += 1;
		Ok(chosen)
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		Ok(self.rng.gen_bool(0.5))
	}

	fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault> {
		if upper == 0 {
			return Ok(0);
		}
		Ok(self.rng.gen_range(0..upper))
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		self.step = 0;
		self.priorities.clear();
		self.demoted.clear();
		self.change_points.clear();
		// Change points are spread over a generous step budget; scheduling
		// points beyond it simply never trigger a change.
		const ASSUMED_ITERATION_LENGTH: usize = 4096;
		while self.change_points.len() < self.priority_changes {
			self.change_points.insert(self.rng.gen_range(0..ASSUMED_ITERATION_LENGTH));
		}
		true
	}

	fn is_fair(&self) -> bool {
		false
	}

	fn description(&self) -> String {
		format!("pct(d={})", self.priority_changes)
	}
}

/// Deterministically re-emits choices recorded in a [`ScheduleTrace`].
pub struct ReplayStrategy {
	trace: ScheduleTrace,
	cursor: usize,
	done: bool,
}

impl ReplayStrategy {
	pub fn new(trace: ScheduleTrace) -> Self {
		ReplayStrategy { trace, cursor: 0, done: false }
	}

	fn next_entry(&mut self) -> Result<TraceEntry, StrategyFault> {
		let entry = self
			.trace
			.entries()
			.get(self.cursor)
			.cloned()
			.ok_or_else(|| StrategyFault::Error("trace exhausted before the run finished".into()))?;
		self.cursor += 1;
		Ok(entry)
	}
}

impl ExplorationStrategy for ReplayStrategy {
	fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		match self.next_entry()? {
			TraceEntry::NextOperation(recorded) => enabled
				.iter()
				.find(|id| id.to_string() == recorded)
				.cloned()
				.ok_or(StrategyFault::ReplayDivergence { recorded }),
			other => Err(StrategyFault::Error(format!(
				"expected a recorded operation choice, found {other:?}"
			))),
		}
	}

	fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		match self.next_entry()? {
			TraceEntry::BooleanChoice(b) => Ok(b),
			other => Err(StrategyFault::Error(format!(
				"expected a recorded boolean choice, found {other:?}"
			))),
		}
	}

	fn next_integer(&mut self, _upper: u64) -> Result<u64, StrategyFault> {
		match self.next_entry()? {
			TraceEntry::IntegerChoice(i) => Ok(i.max(0) as u64),
			other => Err(StrategyFault::Error(format!(
				"expected a recorded integer choice, found {other:?}"
			))),
		}
	}

	fn prepare_for_next_iteration(&mut self) -> bool {
		if self.done {
			return false;
		}
		self.done = true;
		true
	}

	fn is_fair(&self) -> bool {
		// A replay reproduces whatever the original run observed rather than
		// re-deriving a fresh fairness guarantee.
		true
	}

	fn description(&self) -> String {
		format!("replay({} entries)", self.trace.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(alloc: &mut common::IdAllocator, name: &str) -> ActorId {
		alloc.next_actor_id(name, None, None)
	}

	#[test]
	fn random_strategy_always_picks_an_enabled_operation() {
		let mut alloc = common::IdAllocator::new();
		let a = id(&mut alloc, "A");
		let b = id(&mut alloc, "B");
		let mut strategy = RandomStrategy::new(7);
		for _ in 0..20 {
			let chosen = strategy.next_operation(&[a.clone(), b.clone()]).unwrap();
			assert!(chosen == a || chosen == b);
		}
	}

	#[test]
	fn bounded_dfs_enumerates_every_branch_before_exhausting() {
		let mut alloc = common::IdAllocator::new();
		let a = id(&mut alloc, "A");
		let b = id(&mut alloc, "B");
		let mut strategy = BoundedDfsStrategy::new(1);
		let mut seen = HashSet::new();
		loop {
			if !strategy.prepare_for_next_iteration() {
				break;
			}
			let choice = strategy.next_operation(&[a.clone(), b.clone()]).unwrap();
			seen.insert(choice.to_string());
		}
		assert_eq!(seen.len(), 2);
	}

	#[test]
	fn replay_reproduces_recorded_operation_order() {
		let mut alloc = common::IdAllocator::new();
		let a = id(&mut alloc, "A");
		let b = id(&mut alloc, "B");
		let mut trace = ScheduleTrace::new();
		trace.push(TraceEntry::NextOperation(b.to_string()));
		trace.push(TraceEntry::NextOperation(a.to_string()));
		let mut strategy = ReplayStrategy::new(trace);
		assert!(strategy.prepare_for_next_iteration());
		assert_eq!(strategy.next_operation(&[a.clone(), b.clone()]).unwrap(), b);
		assert_eq!(strategy.next_operation(&[a.clone(), b.clone()]).unwrap(), a);
		assert!(!strategy.prepare_for_next_iteration());
	}

	#[test]
	fn replay_diverges_when_recorded_choice_is_not_enabled() {
		let mut alloc = common::IdAllocator::new();
		let a = id(&mut alloc, "A");
		let b = id(&mut alloc, "B");
		let mut trace = ScheduleTrace::new();
		trace.push(TraceEntry::NextOperation(b.to_string()));
		let mut strategy = ReplayStrategy::new(trace);
		strategy.prepare_for_next_iteration();
		let err = strategy.next_operation(&[a]).unwrap_err();
		assert!(matches!(err, StrategyFault::ReplayDivergence { .. }));
	}
}
