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

//! The external driver's `serde`-deserializable knob set (§6 Configuration).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
	Random,
	Probabilistic { continuation_weight: f64 },
	Bfs,
	Dfs { max_depth: usize },
	Pct { priority_changes: usize },
	Replay { trace_path: PathBuf },
}

/// Matches the §6 enumeration field for field; see `runtime::engine::TestEngine`
/// for how each field is consumed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub strategy: StrategyKind,
	pub iterations: usize,
	pub max_steps_per_iteration: usize,
	pub fair_random_streak_bound: u32,
	pub random_seed: u64,
	pub stop_on_first_bug: bool,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			strategy: StrategyKind::Random,
			iterations: 1000,
			max_steps_per_iteration: 10_000,
			fair_random_streak_bound: 10,
			random_seed: 0,
			stop_on_first_bug: true,
		}
	}
}

impl Config {
	/// The seed used for iteration `iteration_index` (0-based): `randomSeed + N`
	/// per §6, so each iteration of a multi-iteration run is independently
	/// reproducible from `Config` alone without needing the prior iterations'
	/// RNG state.
	pub fn seed_for_iteration(&self, iteration_index: usize) -> u64 {
		self.random_seed.wrapping_add(iteration_index as u64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_uses_random_strategy_and_stops_on_first_bug() {
		let config = Config::default();
		assert!(matches!(config.strategy, StrategyKind::Random));
		assert!(config.stop_on_first_bug);
	}

	#[test]
	fn seed_for_iteration_is_offset_from_the_base_seed() {
		let config = Config { random_seed: 42, ..Config::default() };
		assert_eq!(config.seed_for_iteration(0), 42);
		assert_eq!(config.seed_for_iteration(3), 45);
	}

	#[test]
	fn round_trips_through_json() {
		let config = Config { strategy: StrategyKind::Pct { priority_changes: 3 }, ..Config::default() };
		let json = serde_json::to_string(&config).unwrap();
		let restored: Config = serde_json::from_str(&json).unwrap();
		assert!(matches!(restored.strategy, StrategyKind::Pct { priority_changes: 3 }));
	}
}
