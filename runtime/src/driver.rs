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

//! Async-friendly entry points for embedding [`TestEngine`] inside a host
//! that already runs a tokio runtime (an async test harness, a CI driver).
//!
//! `TestEngine::explore` itself is synchronous and CPU-bound — it never
//! awaits anything, by design (see DESIGN.md for why the engine is not built
//! on `tokio::task`s the way the spec's implementation note sketches it).
//! Running it straight on an async task would starve that task's executor
//! for the exploration's whole duration, so this module is the seam: it
//! hands the blocking work to `tokio::task::spawn_blocking`, the same way
//! the rest of this codebase keeps blocking filesystem work off the async
//! executor.

use std::sync::Arc;

use anyhow::Context;
use futures::future::{self, BoxFuture};

use crate::{
	config::Config,
	engine::{ExitOutcome, TestEngine},
	error::RuntimeError,
	observer::RuntimeObserver,
};

/// Runs one exploration to completion on a blocking-pool thread and hands
/// back its [`ExitOutcome`] once done.
pub async fn run_exploration(
	config: Config,
	observer: Arc<dyn RuntimeObserver>,
	setup: impl Fn(&mut TestEngine) + Send + Sync + 'static,
) -> anyhow::Result<ExitOutcome> {
	tokio::task::spawn_blocking(move || -> Result<ExitOutcome, RuntimeError> {
		let mut engine = TestEngine::new(config, observer)?;
		Ok(engine.explore(setup))
	})
	.await
	.context("exploration task panicked")?
	.map_err(anyhow::Error::from)
}

/// Runs several configurations concurrently — typically the same scenario
/// under different [`StrategyKind`](crate::config::StrategyKind)s or seeds —
/// and returns whichever finishes first. Useful for "throw a few strategies
/// at this scenario and take the first bug any of them finds" callers; the
/// remaining explorations keep running on the blocking pool but their
/// results are discarded.
pub async fn race_strategies(
	configs: Vec<Config>,
	observer: Arc<dyn RuntimeObserver>,
	setup: impl Fn(&mut TestEngine) + Send + Sync + Clone + 'static,
) -> anyhow::Result<ExitOutcome> {
	if configs.is_empty() {
		return Err(anyhow::anyhow!("race_strategies called with no configurations"));
	}
	let tasks: Vec<BoxFuture<'_, anyhow::Result<ExitOutcome>>> = configs
		.into_iter()
		.map(|config| {
			let observer = Arc::clone(&observer);
			let setup = setup.clone();
			Box::pin(run_exploration(config, observer, setup)) as BoxFuture<'_, anyhow::Result<ExitOutcome>>
		})
		.collect();
	let (first, _index, _rest) = future::select_all(tasks).await;
	first
}
