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

//! End-to-end exploration scenarios exercising the engine's bug taxonomy and
//! replay discipline through the public `TestEngine` surface, rather than any
//! one module in isolation.

use std::sync::{Arc, Mutex};

use interleave::{
	BugKind, Config, Event, ExceptionDecision, ExitOutcome, LivenessTag, MonitorDef, MonitorStateBuilder,
	ReceivePredicate, RuntimeError, RuntimeObserver, ScheduleTrace, StateBuilder, StateMachineDef, StrategyKind,
	TestEngine, TraceEntry,
};

#[derive(Default)]
struct NoopObserver;
impl RuntimeObserver for NoopObserver {}

fn observer() -> Arc<dyn RuntimeObserver> {
	Arc::new(NoopObserver)
}

#[test]
fn sends_from_the_same_actor_are_delivered_fifo() {
	#[derive(Debug)]
	struct First;
	#[derive(Debug)]
	struct Second;

	let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
	let log_for_setup = Arc::clone(&log);
	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	engine.explore(move |engine| {
		let log_first = Arc::clone(&log_for_setup);
		let log_second = Arc::clone(&log_for_setup);
		let recipient_machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_do(std::any::type_name::<First>(), move |_, _ctx| {
						log_first.lock().unwrap().push("first");
					})
					.on_do(std::any::type_name::<Second>(), move |_, _ctx| {
						log_second.lock().unwrap().push("second");
					})
					.build(),
			)
			.build();
		let recipient = engine.spawn_root_actor("Recipient", recipient_machine, None, None);

		let recipient_for_sender = recipient.clone();
		let sender_machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(move |_, ctx| {
						ctx.send(recipient_for_sender.clone(), First);
						ctx.send(recipient_for_sender.clone(), Second);
						ctx.halt();
					})
					.build(),
			)
			.build();
		engine.spawn_root_actor("Sender", sender_machine, None, None);
	});

	assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn deferred_event_is_delivered_once_the_state_changes() {
	#[derive(Debug)]
	struct Go;
	#[derive(Debug)]
	struct Switch;

	let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
	let log_for_setup = Arc::clone(&log);
	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	engine.explore(move |engine| {
		let log = Arc::clone(&log_for_setup);
		let target_machine = StateMachineDef::builder("Waiting")
			.with_state(
				StateBuilder::new("Waiting")
					.defer(std::any::type_name::<Go>())
					.on_goto(std::any::type_name::<Switch>(), "Ready")
					.build(),
			)
			.with_state(
				StateBuilder::new("Ready")
					.on_do(std::any::type_name::<Go>(), move |_, _ctx| {
						log.lock().unwrap().push("go handled in Ready");
					})
					.build(),
			)
			.build();
		let target = engine.spawn_root_actor("Target", target_machine, None, None);

		let target_for_sender = target.clone();
		let sender_machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(move |_, ctx| {
						ctx.send(target_for_sender.clone(), Go);
						ctx.send(target_for_sender.clone(), Switch);
						ctx.halt();
					})
					.build(),
			)
			.build();
		engine.spawn_root_actor("Sender", sender_machine, None, None);
	});

	// Without defer actually wired into the queue, `Go` would have reached
	// `Waiting` directly and failed as an unhandled event instead.
	assert_eq!(*log.lock().unwrap(), vec!["go handled in Ready"]);
}

#[test]
fn must_handle_event_sent_to_an_already_halted_actor_is_a_bug() {
	#[derive(Debug)]
	struct Ping;

	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	let outcome = engine.explore(|engine| {
		let machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(|_, ctx| {
						let me = ctx.actor_id().clone();
						ctx.send_event(me, Event::new(Ping).must_handle());
						ctx.halt();
					})
					.build(),
			)
			.build();
		engine.spawn_root_actor("Solo", machine, None, None);
	});

	match outcome {
		ExitOutcome::BugFound { error, .. } => {
			assert!(matches!(error, RuntimeError::Bug(BugKind::HaltedReception { .. })));
			let message = error.to_string();
			assert!(message.contains("must-handle event"));
			assert!(message.contains("was sent to the halted"));
		},
		other => panic!("expected a bug, got {other:?}"),
	}
}

#[test]
fn two_actors_waiting_on_each_other_is_a_deadlock() {
	#[derive(Debug)]
	struct Ping;

	fn waiting_machine() -> Arc<StateMachineDef> {
		StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(|_, ctx| {
						ctx.receive(ReceivePredicate::of_types(vec![std::any::type_name::<Ping>()]));
					})
					.build(),
			)
			.build()
	}

	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();
	let outcome = engine.explore(|engine| {
		engine.spawn_root_actor("A", waiting_machine(), None, None);
		engine.spawn_root_actor("B", waiting_machine(), None, None);
	});

	match outcome {
		ExitOutcome::BugFound { error, .. } => {
			assert!(matches!(error, RuntimeError::Bug(BugKind::Deadlock { .. })));
			let message = error.to_string();
			assert!(message.starts_with("Deadlock detected"));
			assert!(message.contains("A#0"));
			assert!(message.contains("B#1"));
		},
		other => panic!("expected a deadlock, got {other:?}"),
	}
}

#[test]
fn hot_monitor_state_at_the_end_of_a_fair_replay_is_a_liveness_bug() {
	#[derive(Debug)]
	struct Done;

	let done_type = std::any::type_name::<Done>();
	let monitor_def = MonitorDef::builder("S1")
		.with_state(MonitorStateBuilder::new("S1", LivenessTag::Hot).on_goto(done_type, "S2").build())
		.with_state(MonitorStateBuilder::new("S2", LivenessTag::Cold).build())
		.build();

	// Worker halts immediately and never invokes the monitor, so the trace is
	// trivial: a single scheduling point choosing the only enabled actor. A
	// non-fair strategy (the usual case) would never surface this as a bug —
	// only a replay, which reproduces a run rather than re-deriving fairness,
	// reaches the liveness check at all.
	let mut trace = ScheduleTrace::new();
	trace.push(TraceEntry::NextOperation("Worker#0".to_string()));
	let trace_path = std::env::temp_dir().join("interleave-test-liveness-trace.json");
	std::fs::write(&trace_path, trace.to_json().unwrap()).unwrap();

	let config = Config {
		iterations: 1,
		strategy: StrategyKind::Replay { trace_path: trace_path.clone() },
		..Config::default()
	};
	let mut engine = TestEngine::new(config, observer()).unwrap();
	engine.register_monitor("Liveness", monitor_def);

	let outcome = engine.explore(|engine| {
		let machine = StateMachineDef::builder("Root")
			.with_state(StateBuilder::new("Root").on_entry(|_, ctx| ctx.halt()).build())
			.build();
		engine.spawn_root_actor("Worker", machine, None, None);
	});

	std::fs::remove_file(&trace_path).ok();

	match outcome {
		ExitOutcome::BugFound { error, .. } => {
			assert!(matches!(error, RuntimeError::Bug(BugKind::LivenessViolation { .. })));
			assert!(error.to_string().contains("detected liveness bug in hot state 'S1'"));
		},
		other => panic!("expected a liveness violation, got {other:?}"),
	}
}

/// Two actors, one of which always fails an assertion; `fail_first` controls
/// which is created first and therefore which `ActorId` sequence each gets.
fn assertion_setup(fail_first: bool) -> impl Fn(&mut TestEngine) + Send + Sync + Clone {
	move |engine: &mut TestEngine| {
		let failing_machine = StateMachineDef::builder("Root")
			.with_state(StateBuilder::new("Root").on_entry(|_, ctx| ctx.assert_that(false, "boom")).build())
			.build();
		let other_machine = StateMachineDef::builder("Root")
			.with_state(StateBuilder::new("Root").on_entry(|_, ctx| ctx.halt()).build())
			.build();
		if fail_first {
			engine.spawn_root_actor("Failing", failing_machine, None, None);
			engine.spawn_root_actor("Other", other_machine, None, None);
		} else {
			engine.spawn_root_actor("Other", other_machine, None, None);
			engine.spawn_root_actor("Failing", failing_machine, None, None);
		}
	}
}

#[test]
fn replaying_a_recorded_trace_reproduces_the_same_assertion_failure() {
	let config = Config { iterations: 1, random_seed: 7, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();
	let outcome = engine.explore(assertion_setup(true));
	let (original_message, trace) = match outcome {
		ExitOutcome::BugFound { error, trace, .. } => (error.to_string(), trace),
		other => panic!("expected the original run to find the assertion failure, got {other:?}"),
	};
	assert!(original_message.contains("assertion failed: boom"));

	let trace_path = std::env::temp_dir().join("interleave-test-replay-assertion-trace.json");
	std::fs::write(&trace_path, trace.to_json().unwrap()).unwrap();

	let replay_config = Config {
		iterations: 1,
		strategy: StrategyKind::Replay { trace_path: trace_path.clone() },
		..Config::default()
	};
	let mut replay_engine = TestEngine::new(replay_config, observer()).unwrap();
	let replay_outcome = replay_engine.explore(assertion_setup(true));
	match replay_outcome {
		ExitOutcome::BugFound { error, .. } => assert_eq!(error.to_string(), original_message),
		other => panic!("expected the replay to reproduce the assertion failure, got {other:?}"),
	}

	// Mutating the driver — swapping the order the two actors are created in
	// — shifts every `ActorId` sequence number from here on, so the recorded
	// choice is no longer in the enabled set at the very first scheduling
	// point: the replay must report divergence rather than silently running
	// some other interleaving than the one recorded.
	let mutated_config = Config {
		iterations: 1,
		strategy: StrategyKind::Replay { trace_path: trace_path.clone() },
		..Config::default()
	};
	let mut mutated_engine = TestEngine::new(mutated_config, observer()).unwrap();
	let mutated_outcome = mutated_engine.explore(assertion_setup(false));
	std::fs::remove_file(&trace_path).ok();

	match mutated_outcome {
		ExitOutcome::BugFound { error, .. } => assert!(matches!(error, RuntimeError::ReplayDivergence { .. })),
		other => panic!("expected a replay divergence, got {other:?}"),
	}
}

#[test]
fn on_halt_handler_is_reachable_through_the_public_builder_api() {
	let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
	let log_for_setup = Arc::clone(&log);
	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	engine.explore(move |engine| {
		let log = Arc::clone(&log_for_setup);
		let machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(|_, ctx| ctx.halt())
					.on_halt(move |_, _ctx| log.lock().unwrap().push("halted"))
					.build(),
			)
			.build();
		engine.spawn_root_actor("Worker", machine, None, None);
	});

	assert_eq!(*log.lock().unwrap(), vec!["halted"]);
}

#[test]
fn a_panicking_action_ends_the_iteration_as_an_unhandled_user_exception() {
	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	let outcome = engine.explore(|engine| {
		let machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root").on_entry(|_, _ctx| panic!("widget exploded")).build(),
			)
			.build();
		engine.spawn_root_actor("Worker", machine, None, None);
	});

	match outcome {
		ExitOutcome::BugFound { error, .. } => {
			assert!(matches!(error, RuntimeError::Bug(BugKind::UnhandledUserException { .. })));
			assert!(error.to_string().contains("widget exploded"));
		},
		other => panic!("expected an unhandled user exception, got {other:?}"),
	}
}

#[test]
fn on_exception_handler_can_swallow_a_panicking_action() {
	let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
	let log_for_setup = Arc::clone(&log);
	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();

	engine.explore(move |engine| {
		let log = Arc::clone(&log_for_setup);
		let machine = StateMachineDef::builder("Root")
			.with_state(StateBuilder::new("Root").on_entry(|_, _ctx| panic!("ignored")).build())
			.with_exception_handler(move |_, method_name, message| {
				log.lock().unwrap().push("handled");
				assert_eq!(method_name, "OnEntry");
				assert!(message.contains("ignored"));
				ExceptionDecision::HandledException
			})
			.build();
		engine.spawn_root_actor("Worker", machine, None, None);
	});

	// A swallowed exception lets the iteration finish cleanly rather than
	// surfacing as `ExitOutcome::BugFound` — reaching this assertion at all is
	// the real check.
	assert_eq!(*log.lock().unwrap(), vec!["handled"]);
}

#[test]
fn monitor_raised_event_is_actually_dispatched() {
	#[derive(Debug)]
	struct Trigger;
	#[derive(Debug)]
	struct Follow;

	let trigger_type = std::any::type_name::<Trigger>();
	let follow_type = std::any::type_name::<Follow>();
	let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
	let log_for_monitor = Arc::clone(&log);
	let log_for_follow = Arc::clone(&log);

	let monitor_def = MonitorDef::builder("Start")
		.with_state(
			MonitorStateBuilder::new("Start", LivenessTag::Neutral)
				.on_do(trigger_type, move |_, ctx| {
					log_for_monitor.lock().unwrap().push("trigger seen");
					ctx.raise(Follow);
				})
				.on_goto(follow_type, "Followed")
				.build(),
		)
		.with_state(
			MonitorStateBuilder::new("Followed", LivenessTag::Neutral)
				.on_entry(move |_, _ctx| log_for_follow.lock().unwrap().push("followed entered"))
				.build(),
		)
		.build();

	let config = Config { iterations: 1, ..Config::default() };
	let mut engine = TestEngine::new(config, observer()).unwrap();
	engine.register_monitor("Chain", monitor_def);

	engine.explore(|engine| {
		let machine = StateMachineDef::builder("Root")
			.with_state(
				StateBuilder::new("Root")
					.on_entry(|_, ctx| {
						ctx.monitor("Chain", Trigger);
						ctx.halt();
					})
					.build(),
			)
			.build();
		engine.spawn_root_actor("Worker", machine, None, None);
	});

	// Reaching "followed entered" proves `ctx.raise(Follow)` from inside the
	// monitor's own `Trigger` handler was actually drained and re-dispatched
	// against the monitor, not silently discarded along with the rest of that
	// `ActionCtx`'s effects.
	assert_eq!(*log.lock().unwrap(), vec!["trigger seen", "followed entered"]);
}
