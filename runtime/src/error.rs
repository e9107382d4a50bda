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

//! The eleven-entry error taxonomy of §7, modeled as one exhaustive
//! `thiserror` enum rather than a single stringly-typed error, mirroring the
//! teacher's `ActorExitStatus`/`AskError` convention of one displayable enum
//! per failure domain.

use common::ActorId;
use thiserror::Error;

/// Bugs 1-7 and 10-11 of §7: failures that end the current exploration
/// iteration and are recorded into a trace for replay.
#[derive(Error, Debug, Clone)]
pub enum BugKind {
	#[error("assertion failed: {0}")]
	AssertionFailure(String),

	#[error("actor '{actor}' received unhandled event '{event_type}' in state '{state}'")]
	UnhandledEvent { actor: ActorId, event_type: &'static str, state: &'static str },

	#[error(
		"actor '{actor}' halted before dequeueing must-handle event '{event_type}'"
	)]
	MustHandleViolation { actor: ActorId, event_type: &'static str },

	#[error(
		"must-handle event '{event_type}' was sent to the halted actor '{actor}'"
	)]
	HaltedReception { actor: ActorId, event_type: &'static str },

	#[error("invoked '{operation}' while halted in actor '{actor}'")]
	IllegalOperationWhileHalted { actor: ActorId, operation: &'static str },

	#[error(
		"Deadlock detected — {actors:?} are waiting to receive an event, but no other \
		 controlled operations are enabled."
	)]
	Deadlock { actors: Vec<ActorId> },

	#[error("detected liveness bug in hot state '{state}' of monitor '{monitor}'")]
	LivenessViolation { monitor: &'static str, state: &'static str },

	#[error("strategy '{strategy}' error: {description}")]
	StrategyError { strategy: String, description: String },

	#[error("unhandled exception in actor '{actor}': {source}")]
	UnhandledUserException { actor: ActorId, source: String },
}

/// Wraps `BugKind` together with the two taxonomy entries that are always
/// fatal to the whole test run rather than just the current iteration.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
	#[error(transparent)]
	Bug(#[from] BugKind),

	/// User code called an uncontrolled concurrency primitive (§5, §7#8).
	#[error("Invoking '{api}' is not intercepted by the scheduler and cannot be tolerated.")]
	UncontrolledInvocation { api: &'static str },

	/// A replay strategy's recorded choice was not in the enabled set (§7#9).
	#[error(
		"replay divergence: recorded choice {recorded} was not enabled at step {step}; the \
		 program under replay must not be mutated"
	)]
	ReplayDivergence { step: usize, recorded: String },
}

impl RuntimeError {
	/// True for the taxonomy entries that are always fatal to the whole run
	/// (8-9), as opposed to ending only the current iteration (1-7, 10-11).
	pub fn is_process_fatal(&self) -> bool {
		matches!(self, RuntimeError::UncontrolledInvocation { .. } | RuntimeError::ReplayDivergence { .. })
	}
}
