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

//! Wraps an [`ExplorationStrategy`] with the "fair random" guarantee (§4.6):
//! `fair_random()` forces the opposite outcome once the same boolean has come
//! back `fair_streak_bound` times in a row, so an unbounded stream of calls
//! from the same call site can never starve one branch forever — independent
//! of whether the underlying strategy's own `IsFair` flag is set.
//!
//! Everything else is a thin pass-through to the strategy; the oracle exists
//! so `fair_random`'s bookkeeping has one home instead of being duplicated in
//! every strategy implementation.

use common::ActorId;

use crate::strategy::{ExplorationStrategy, StrategyFault};

pub struct NondeterministicOracle {
	strategy: Box<dyn ExplorationStrategy>,
	fair_streak_bound: u32,
	fair_last: Option<bool>,
	fair_streak: u32,
}

impl NondeterministicOracle {
	pub fn new(strategy: Box<dyn ExplorationStrategy>, fair_streak_bound: u32) -> Self {
		NondeterministicOracle { strategy, fair_streak_bound, fair_last: None, fair_streak: 0 }
	}

	pub fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
		self.strategy.next_operation(enabled)
	}

	pub fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
		self.strategy.next_boolean()
	}

	pub fn next_integer(&mut self, upper: u64) -> Result<u64, StrategyFault> {
		self.strategy.next_integer(upper)
	}

	pub fn fair_random(&mut self) -> Result<bool, StrategyFault> {
		let mut value = self.strategy.next_boolean()?;
		if self.fair_streak_bound > 0 {
			if Some(value) == self.fair_last {
				self.fair_streak += 1;
				if self.fair_streak >= self.fair_streak_bound {
					value = !value;
					self.fair_streak = 0;
				}
			} else {
				self.fair_streak = 0;
			}
		}
		self.fair_last = Some(value);
		Ok(value)
	}

	pub fn prepare_for_next_iteration(&mut self) -> bool {
		self.fair_last = None;
		self.fair_streak = 0;
		self.strategy.prepare_for_next_iteration()
	}

	pub fn is_fair(&self) -> bool {
		self.strategy.is_fair()
	}

	pub fn description(&self) -> String {
		self.strategy.description()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct AlwaysTrue;
	impl ExplorationStrategy for AlwaysTrue {
		fn next_operation(&mut self, enabled: &[ActorId]) -> Result<ActorId, StrategyFault> {
			Ok(enabled[0].clone())
		}
		fn next_boolean(&mut self) -> Result<bool, StrategyFault> {
			Ok(true)
		}
		fn next_integer(&mut self, _upper: u64) -> Result<u64, StrategyFault> {
			Ok(0)
		}
		fn prepare_for_next_iteration(&mut self) -> bool {
			true
		}
		fn is_fair(&self) -> bool {
			false
		}
		fn description(&self) -> String {
			"always-true".into()
		}
	}

	#[test]
	fn fair_random_eventually_flips_a_monotonous_strategy() {
		let mut oracle = NondeterministicOracle::new(Box::new(AlwaysTrue), 3);
		let mut saw_false = false;
		for _ in 0..10 {
			if !oracle.fair_random().unwrap() {
				saw_false = true;
			}
		}
		assert!(saw_false, "fair_random never broke the streak of `true`");
	}

	#[test]
	fn fair_random_passes_through_when_bound_is_zero() {
		let mut oracle = NondeterministicOracle::new(Box::new(AlwaysTrue), 0);
		for _ in 0..10 {
			assert!(oracle.fair_random().unwrap());
		}
	}
}
