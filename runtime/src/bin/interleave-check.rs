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

//! A small standalone driver that loads a [`Config`], runs one built-in
//! scenario under it, and reports the outcome — a runnable example of
//! embedding the engine outside of a test binary, and a smoke check for the
//! crate's own release pipeline.

use std::{any::Any, path::PathBuf, sync::Arc};

use anyhow::Context;
use interleave::{
	ActionCtx, Config, ExitOutcome, StateBuilder, StateMachineDef, TestEngine, TraceSink, TracingObserver,
};
use once_cell::sync::OnceCell;
use tokio::runtime::{Builder, Runtime};

#[derive(Debug)]
struct Tick;

fn tick_event_type() -> &'static str {
	std::any::type_name::<Tick>()
}

#[derive(Default)]
struct CounterState {
	count: u32,
}

/// Self-raises `Tick` up to five times, asserting the bound holds, then
/// halts — exercises raise/assert/halt end to end without needing a second
/// actor.
fn counter_machine() -> Arc<StateMachineDef> {
	StateMachineDef::builder("Counting")
		.with_state_factory(|| Box::new(CounterState::default()) as Box<dyn Any + Send>)
		.with_state(
			StateBuilder::new("Counting")
				.on_entry(|_state, ctx: &mut ActionCtx<'_>| ctx.raise(Tick))
				.on_do(tick_event_type(), |state, ctx: &mut ActionCtx<'_>| {
					let state = state.downcast_mut::<CounterState>().expect("CounterState");
					state.count += 1;
					ctx.assert_that(state.count <= 5, "counter exceeded its bound of 5");
					if state.count < 5 {
						ctx.raise(Tick);
					} else {
						ctx.halt();
					}
				})
				.build(),
		)
		.build()
}

fn tokio_runtime() -> anyhow::Result<&'static Runtime> {
	static RUNTIME: OnceCell<Runtime> = OnceCell::new();
	RUNTIME.get_or_try_init(|| {
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.build()
			.map_err(anyhow::Error::from)
	})
}

fn main() -> anyhow::Result<()> {
	let runtime = tokio_runtime()?;
	runtime.block_on(main_impl())
}

async fn main_impl() -> anyhow::Result<()> {
	tracing_subscriber::fmt::try_init().ok();

	let mut args = std::env::args().skip(1);
	let config = match args.next() {
		Some(path) => load_config(PathBuf::from(path)).await?,
		None => Config::default(),
	};
	let trace_out = args.next().map(PathBuf::from);

	let observer = Arc::new(TracingObserver);
	let outcome = interleave::run_exploration(config, observer, |engine: &mut TestEngine| {
		engine.spawn_root_actor("Counter", counter_machine(), None, None);
	})
	.await
	.context("running exploration")?;

	match outcome {
		ExitOutcome::AllIterationsClean { iterations_run } => {
			println!("ok: {iterations_run} iterations ran clean");
			Ok(())
		},
		ExitOutcome::StrategyExhausted { iterations_run } => {
			println!("ok: strategy exhausted after {iterations_run} iterations");
			Ok(())
		},
		ExitOutcome::BugFound { iteration, error, trace } => {
			eprintln!("bug found on iteration {iteration}: {error}");
			if let Some(path) = trace_out {
				interleave::FileTraceSink::new(path)
					.write(&trace)
					.await
					.context("persisting reproducing trace")?;
			}
			std::process::exit(1);
		},
	}
}

async fn load_config(path: PathBuf) -> anyhow::Result<Config> {
	let json = tokio::fs::read_to_string(&path)
		.await
		.with_context(|| format!("reading config from {}", path.display()))?;
	serde_json::from_str(&json).with_context(|| format!("parsing config from {}", path.display()))
}
