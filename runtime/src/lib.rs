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

#![deny(clippy::disallowed_methods)]

//! `interleave` is a deterministic scheduler and execution engine for
//! systematically testing message-passing state machines.
//!
//! It solves the following problem:
//! - pin down the interleaving of concurrently-enabled actor/monitor
//!   operations to one deterministic choice per scheduling point
//! - drive that choice from a pluggable, swappable exploration strategy
//!   instead of the OS scheduler
//! - detect assertion failures, unhandled events, deadlock and liveness bugs
//!   as first-class outcomes of an iteration, not crashes
//! - record the exact sequence of choices that produced a bug so it can be
//!   replayed deterministically, with no residual nondeterminism, after the
//!   fact

mod actor;
mod config;
mod context;
mod dispatch;
mod driver;
mod engine;
mod error;
mod event;
mod monitor;
mod oracle;
mod observer;
mod operation;
mod queue;
mod scheduler;
mod sink;
mod state;
mod strategy;
mod timer;
mod trace;

pub use common::ActorId;

pub use self::{
	config::{Config, StrategyKind},
	context::{ActionCtx, ActionHost},
	driver::{race_strategies, run_exploration},
	engine::{ExitOutcome, TestEngine},
	error::{BugKind, RuntimeError},
	event::{halt_event_type, Event, EventPayload, Halt, ReceivePredicate},
	monitor::{LivenessTag, MonitorDef, MonitorDefBuilder, MonitorStateBuilder, MonitorStateDef},
	observer::{RuntimeObserver, TracingObserver, TransitionKind},
	operation::{Operation, OperationStatus},
	sink::{FileTraceSink, TraceSink},
	state::{ExceptionDecision, StateBuilder, StateDef, StateMachineDef, StateMachineDefBuilder},
	strategy::{ExplorationStrategy, StrategyFault},
	timer::TimerFired,
	trace::{ScheduleTrace, TraceEntry},
};
