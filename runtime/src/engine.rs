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

//! `TestEngine` ties every other module into one exploration run (§4, §6).
//!
//! It owns the actor table, the monitor table, the scheduler, the oracle and
//! the trace recorder, and implements [`ActionHost`] for exactly the effects
//! that reach outside the currently-dispatching actor's own cell: a send to
//! another actor's queue, a new row in the actor table, a monitor dispatch,
//! or a draw from the shared oracle. Everything else (raise, goto, push,
//! pop, receive, timers, halt) is applied directly by `dispatch` against the
//! `&mut ActorCell` it already owns — see `context` for why that split
//! exists.
//!
//! Dispatching an operation removes its `ActorCell` from `actors` for the
//! duration of the call so `&mut TestEngine` (as `ActionHost`) and `&mut
//! ActorCell` never alias; a self-send — `to` equal to the cell currently
//! removed — is buffered into `self_sends` and delivered once the cell is
//! reinserted, rather than being looked up in a table it is momentarily
//! absent from.

use std::{collections::HashMap, sync::Arc};

use common::{ActorId, IdAllocator, KillSwitch};

use crate::{
	actor::ActorCell,
	config::{Config, StrategyKind},
	context::{ActionCtx, ActionHost},
	dispatch,
	error::{BugKind, RuntimeError},
	event::Event,
	monitor::{MonitorDef, MonitorInstance},
	observer::RuntimeObserver,
	operation::Operation,
	oracle::NondeterministicOracle,
	queue::EnqueueOutcome,
	scheduler::{fault_to_runtime_error, OperationScheduler, ScheduleDecision},
	state::StateMachineDef,
	strategy::{
		BfsStrategy, BoundedDfsStrategy, ExplorationStrategy, PctStrategy, ProbabilisticStrategy,
		RandomStrategy, ReplayStrategy,
	},
	trace::{ScheduleTrace, TraceRecorder},
};

/// Outcome of a full [`TestEngine::explore`] run (§4.4, §6 Exit discipline).
#[derive(Debug)]
pub enum ExitOutcome {
	/// Every configured iteration completed without a bug.
	AllIterationsClean { iterations_run: usize },
	/// A bug was found; `trace` reproduces it exactly under `StrategyKind::Replay`.
	BugFound { iteration: usize, error: RuntimeError, trace: ScheduleTrace },
	/// The strategy's own search space (bounded DFS/BFS, a finite replay trace)
	/// was exhausted before `config.iterations` was reached.
	StrategyExhausted { iterations_run: usize },
}

fn build_strategy(kind: &StrategyKind, seed: u64) -> Result<Box<dyn ExplorationStrategy>, RuntimeError> {
	Ok(match kind {
		StrategyKind::Random => Box::new(RandomStrategy::new(seed)),
		StrategyKind::Probabilistic { continuation_weight } => {
			Box::new(ProbabilisticStrategy::new(seed, *continuation_weight))
		},
		StrategyKind::Bfs => Box::new(BfsStrategy::new()),
		StrategyKind::Dfs { max_depth } => Box::new(BoundedDfsStrategy::new(*max_depth)),
		StrategyKind::Pct { priority_changes } => Box::new(PctStrategy::new(seed, *priority_changes)),
		StrategyKind::Replay { trace_path } => {
			let json = std::fs::read_to_string(trace_path).map_err(|err| {
				RuntimeError::Bug(BugKind::StrategyError {
					strategy: "replay".to_string(),
					description: format!("failed to read trace file {}: {err}", trace_path.display()),
				})
			})?;
			let trace = ScheduleTrace::from_json(&json).map_err(|err| {
				RuntimeError::Bug(BugKind::StrategyError {
					strategy: "replay".to_string(),
					description: format!("failed to parse trace file {}: {err}", trace_path.display()),
				})
			})?;
			Box::new(ReplayStrategy::new(trace))
		},
	})
}

pub struct TestEngine {
	id_alloc: IdAllocator,
	actors: HashMap<ActorId, ActorCell>,
	monitor_defs: HashMap<&'static str, Arc<MonitorDef>>,
	monitors: HashMap<&'static str, MonitorInstance>,
	scheduler: OperationScheduler,
	oracle: NondeterministicOracle,
	recorder: TraceRecorder,
	config: Config,
	observer: Arc<dyn RuntimeObserver>,
	kill_switch: KillSwitch,
	/// The actor currently removed from `actors` for dispatch, if any.
	in_flight: Option<ActorId>,
	/// Events sent to `in_flight` itself while it is out of the table.
	self_sends: Vec<Event>,
}

impl TestEngine {
	pub fn new(config: Config, observer: Arc<dyn RuntimeObserver>) -> Result<Self, RuntimeError> {
		let strategy = build_strategy(&config.strategy, config.random_seed)?;
		let oracle = NondeterministicOracle::new(strategy, config.fair_random_streak_bound);
		let scheduler = OperationScheduler::new(config.max_steps_per_iteration);
		Ok(TestEngine {
			id_alloc: IdAllocator::new(),
			actors: HashMap::new(),
			monitor_defs: HashMap::new(),
			monitors: HashMap::new(),
			scheduler,
			oracle,
			recorder: TraceRecorder::new(),
			config,
			observer,
			kill_switch: KillSwitch::default(),
			in_flight: None,
			self_sends: Vec::new(),
		})
	}

	/// Registers a monitor type. A fresh [`MonitorInstance`] is instantiated
	/// from `def` at the start of every iteration, the same way `setup` is
	/// re-run fresh for actors (§4.3).
	pub fn register_monitor(&mut self, type_name: &'static str, def: Arc<MonitorDef>) {
		self.monitor_defs.insert(type_name, def);
	}

	/// Creates a root actor outside of any action — for use only from the
	/// `setup` closure passed to [`TestEngine::explore`], which runs once at
	/// the start of every iteration before any operation is scheduled.
	pub fn spawn_root_actor(
		&mut self,
		type_name: &'static str,
		machine: Arc<StateMachineDef>,
		human_name: Option<String>,
		ctor_event: Option<Event>,
	) -> ActorId {
		let id = self.id_alloc.next_actor_id(type_name, human_name, None);
		let user_state = machine.new_user_state();
		let cell = ActorCell::new(id.clone(), type_name, machine, user_state, ctor_event);
		self.observer.on_create_actor(&id, type_name);
		self.actors.insert(id.clone(), cell);
		id
	}

	/// Runs `config.iterations` iterations (or however many this strategy's
	/// own search space allows), calling `setup` fresh at the start of each
	/// one to build the initial configuration of actors and monitors.
	pub fn explore(&mut self, setup: impl Fn(&mut TestEngine) + Send + Sync) -> ExitOutcome {
		let total_iterations = self.config.iterations;
		for iteration in 0..total_iterations {
			if self.kill_switch.is_dead() {
				return ExitOutcome::StrategyExhausted { iterations_run: iteration };
			}
			if !self.oracle.prepare_for_next_iteration() {
				return ExitOutcome::StrategyExhausted { iterations_run: iteration };
			}
			self.id_alloc.reset();
			self.actors.clear();
			self.monitors.clear();
			self.self_sends.clear();
			self.in_flight = None;
			self.scheduler.reset();
			self.recorder.reset();
			for (type_name, def) in &self.monitor_defs {
				self.observer.on_create_monitor(*type_name);
				self.monitors.insert(*type_name, MonitorInstance::new(*type_name, Arc::clone(def)));
			}
			setup(self);
			match self.run_iteration() {
				Ok(()) => {},
				Err(err) => {
					self.observer.on_error(&err.to_string());
					let trace = self.recorder.trace().clone();
					if self.config.stop_on_first_bug || err.is_process_fatal() {
						self.kill_switch.kill();
						return ExitOutcome::BugFound { iteration, error: err, trace };
					}
				},
			}
		}
		ExitOutcome::AllIterationsClean { iterations_run: total_iterations }
	}

	fn run_iteration(&mut self) -> Result<(), RuntimeError> {
		loop {
			let operations: HashMap<ActorId, Operation> =
				self.actors.iter().map(|(id, cell)| (id.clone(), cell.operation.clone())).collect();
			match self.scheduler.schedule(&operations, &mut self.oracle, &mut self.recorder)? {
				ScheduleDecision::IterationComplete => break,
				ScheduleDecision::Run(actor_id) => self.run_one_step(actor_id)?,
			}
		}
		self.check_liveness_violations()
	}

	/// Runs exactly one operation step for `actor_id`, chosen by the scheduler
	/// from the enabled set.
	fn run_one_step(&mut self, actor_id: ActorId) -> Result<(), RuntimeError> {
		self.run_one_step_reentrant(actor_id)
	}

	/// The mechanics behind [`Self::run_one_step`], factored out so
	/// `createActorAndExecute`/`sendEventAndExecute` (§6) can drive a second
	/// operation's step from inside an action body that is itself mid-step —
	/// i.e. while `in_flight` and `self_sends` already belong to the
	/// outer-dispatching actor. Both fields are saved and restored around the
	/// nested call rather than clobbered, so a step never leaks into its
	/// caller's bookkeeping.
	fn run_one_step_reentrant(&mut self, actor_id: ActorId) -> Result<(), RuntimeError> {
		let mut cell =
			self.actors.remove(&actor_id).expect("only called with operations present in the actor table");
		let outer_in_flight = self.in_flight.replace(actor_id.clone());
		let outer_self_sends = std::mem::take(&mut self.self_sends);
		let observer = Arc::clone(&self.observer);
		let result = dispatch::run_one_operation(&mut cell, self, observer.as_ref());
		self.in_flight = outer_in_flight;
		let own_self_sends = std::mem::replace(&mut self.self_sends, outer_self_sends);
		self.actors.insert(actor_id.clone(), cell);
		for event in own_self_sends {
			self.send_event(actor_id.clone(), actor_id.clone(), event)?;
		}
		result
	}

	/// A hot monitor state at the end of a fair iteration is a liveness bug
	/// (§7#7); an unfair strategy cannot legitimately starve one, so the check
	/// only runs under a fair strategy.
	fn check_liveness_violations(&self) -> Result<(), RuntimeError> {
		if !self.oracle.is_fair() {
			return Ok(());
		}
		for (monitor_type, instance) in &self.monitors {
			if instance.is_hot() {
				return Err(RuntimeError::Bug(BugKind::LivenessViolation {
					monitor: *monitor_type,
					state: instance.current_state_name(),
				}));
			}
		}
		Ok(())
	}

	fn current_step(&self) -> usize {
		self.scheduler.history().len()
	}
}

impl ActionHost for TestEngine {
	fn send_event(&mut self, from: ActorId, to: ActorId, event: Event) -> Result<(), RuntimeError> {
		let event_type = event.type_name();
		if self.in_flight.as_ref() == Some(&to) {
			self.self_sends.push(event);
			return Ok(());
		}
		let Some(target) = self.actors.get_mut(&to) else {
			if event.is_must_handle() {
				return Err(RuntimeError::Bug(BugKind::HaltedReception { actor: to, event_type }));
			}
			return Ok(());
		};
		if target.is_halted() {
			if event.is_must_handle() {
				return Err(RuntimeError::Bug(BugKind::HaltedReception { actor: to, event_type }));
			}
			return Ok(());
		}
		self.observer.on_send(&from, &to, event_type);
		let sender = from.clone();
		let event = event.with_sender(from);
		let was_blocked_on_receive = target.queue.is_blocked_on_receive();
		match target.queue.enqueue(event) {
			EnqueueOutcome::Appended => {
				self.observer.on_enqueue(&to, event_type, Some(&sender));
				// A non-matching event appended while the target is genuinely
				// blocked on `receive(...)` must not wake it up — it stays
				// `WaitingToReceive` until a matching event arrives.
				if !was_blocked_on_receive {
					target.mark_enabled();
				}
			},
			EnqueueOutcome::UnblockedReceive(delivered) => {
				target.queue.deliver_unblocked(delivered);
				self.observer.on_receive(&to, event_type);
				target.mark_enabled();
			},
		}
		Ok(())
	}

	fn create_actor(
		&mut self,
		_creator: ActorId,
		type_name: &'static str,
		machine: Arc<StateMachineDef>,
		ctor_event: Option<Event>,
	) -> Result<ActorId, RuntimeError> {
		let group = self.id_alloc.next_op_group();
		let id = self.id_alloc.next_actor_id(type_name, None, Some(group));
		let user_state = machine.new_user_state();
		let cell = ActorCell::new(id.clone(), type_name, machine, user_state, ctor_event);
		self.observer.on_create_actor(&id, type_name);
		self.actors.insert(id.clone(), cell);
		Ok(id)
	}

	fn invoke_monitor(&mut self, monitor_type: &'static str, event: Event) -> Result<(), RuntimeError> {
		let Some(mut instance) = self.monitors.remove(monitor_type) else {
			return Ok(());
		};
		let invoking_actor = self
			.in_flight
			.clone()
			.expect("invoke_monitor is only reachable from inside an actor's action, via ActionCtx::monitor");
		self.observer.on_monitor_process_event(monitor_type, event.type_name());
		let before = instance.current_state_name();
		let observer = Arc::clone(&self.observer);
		let fault = {
			let mut ctx = ActionCtx::new(invoking_actor, self, false);
			instance.dispatch(&event, &mut ctx, observer.as_ref());
			// §4.3: "a step ends after all raised events settle" applies to a
			// monitor's own `ctx.raise(...)` too — drain it here rather than
			// letting `ctx.finish()` hand a raised event back to a caller with
			// nowhere to route it.
			let mut fault = None;
			while fault.is_none() {
				match ctx.take_raised() {
					Some(raised) => {
						observer.on_monitor_raise_event(monitor_type, raised.type_name());
						instance.dispatch(&raised, &mut ctx, observer.as_ref());
					},
					None => break,
				}
				if ctx.has_fault() {
					fault = ctx.take_fault();
				}
			}
			if fault.is_none() {
				let (remaining, _effects) = ctx.finish();
				fault = remaining;
			}
			fault
		};
		if instance.current_state_name() != before {
			self.observer.on_monitor_state_transition(monitor_type, instance.current_state_name());
		}
		self.monitors.insert(monitor_type, instance);
		match fault {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}

	fn random_boolean(&mut self) -> Result<bool, RuntimeError> {
		let description = self.oracle.description();
		let step = self.current_step();
		let value =
			self.oracle.next_boolean().map_err(|fault| fault_to_runtime_error(&description, step, fault))?;
		self.recorder.record_boolean(value);
		if let Some(actor) = self.in_flight.as_ref() {
			self.observer.on_random(actor, &format!("boolean={value}"));
		}
		Ok(value)
	}

	fn random_integer(&mut self, upper: u64) -> Result<u64, RuntimeError> {
		let description = self.oracle.description();
		let step = self.current_step();
		let value =
			self.oracle.next_integer(upper).map_err(|fault| fault_to_runtime_error(&description, step, fault))?;
		self.recorder.record_integer(value as i64);
		if let Some(actor) = self.in_flight.as_ref() {
			self.observer.on_random(actor, &format!("integer(0..{upper})={value}"));
		}
		Ok(value)
	}

	fn fair_random(&mut self) -> Result<bool, RuntimeError> {
		let description = self.oracle.description();
		let step = self.current_step();
		let value =
			self.oracle.fair_random().map_err(|fault| fault_to_runtime_error(&description, step, fault))?;
		self.recorder.record_boolean(value);
		if let Some(actor) = self.in_flight.as_ref() {
			self.observer.on_random(actor, &format!("fair_boolean={value}"));
		}
		Ok(value)
	}
}
