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

//! The log-hook surface (§6) as a trait of default-no-op methods, the same
//! shape as the teacher's event-listener hooks: an external emitter
//! implements only the hooks it cares about, and every call site fires its
//! hook unconditionally rather than checking a capability bit.

use common::ActorId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionKind {
	Entry,
	Exit,
}

#[allow(unused_variables)]
pub trait RuntimeObserver: Send + Sync {
	fn on_create_actor(&self, actor: &ActorId, type_name: &'static str) {}
	fn on_state_transition(&self, actor: &ActorId, state: &'static str, kind: TransitionKind) {}
	fn on_goto(&self, actor: &ActorId, from: &'static str, to: &'static str) {}
	fn on_push(&self, actor: &ActorId, from: &'static str, to: &'static str) {}
	fn on_pop(&self, actor: &ActorId, to: &'static str) {}
	fn on_pop_unhandled_event(&self, actor: &ActorId, event_type: &'static str, state: &'static str) {}
	fn on_enqueue(&self, actor: &ActorId, event_type: &'static str, sender: Option<&ActorId>) {}
	fn on_dequeue(&self, actor: &ActorId, event_type: &'static str) {}
	fn on_receive(&self, actor: &ActorId, event_type: &'static str) {}
	fn on_wait(&self, actor: &ActorId) {}
	fn on_send(&self, from: &ActorId, to: &ActorId, event_type: &'static str) {}
	fn on_timer_fired(&self, actor: &ActorId, timer_name: &'static str) {}
	fn on_random(&self, actor: &ActorId, description: &str) {}
	fn on_halt(&self, actor: &ActorId) {}
	fn on_default_event_handler(&self, actor: &ActorId, state: &'static str) {}
	fn on_execute_action(&self, actor: &ActorId, state: &'static str) {}
	fn on_raise_event(&self, actor: &ActorId, event_type: &'static str) {}
	fn on_handle_raised_event(&self, actor: &ActorId, event_type: &'static str) {}
	fn on_exception_thrown(&self, actor: &ActorId, description: &str) {}
	fn on_exception_handled(&self, actor: &ActorId, description: &str) {}
	fn on_create_monitor(&self, monitor_type: &'static str) {}
	fn on_monitor_state_transition(&self, monitor_type: &'static str, state: &'static str) {}
	fn on_monitor_process_event(&self, monitor_type: &'static str, event_type: &'static str) {}
	fn on_monitor_raise_event(&self, monitor_type: &'static str, event_type: &'static str) {}
	fn on_monitor_execute_action(&self, monitor_type: &'static str, state: &'static str) {}
	fn on_error(&self, text: &str) {}
	fn on_strategy_error(&self, strategy: &str, description: &str) {}
}

/// Forwards every hook to `tracing`, routine hooks at `debug` and
/// failure-shaped hooks (`OnError`/`OnStrategyError`/`OnExceptionThrown`) at
/// `warn`/`error` (§6).
#[derive(Default)]
pub struct TracingObserver;

impl RuntimeObserver for TracingObserver {
	fn on_create_actor(&self, actor: &ActorId, type_name: &'static str) {
		tracing::debug!(%actor, type_name, "create actor");
	}

	fn on_state_transition(&self, actor: &ActorId, state: &'static str, kind: TransitionKind) {
		tracing::debug!(%actor, state, ?kind, "state transition");
	}

	fn on_goto(&self, actor: &ActorId, from: &'static str, to: &'static str) {
		tracing::debug!(%actor, from, to, "goto");
	}

	fn on_push(&self, actor: &ActorId, from: &'static str, to: &'static str) {
		tracing::debug!(%actor, from, to, "push");
	}

	fn on_pop(&self, actor: &ActorId, to: &'static str) {
		tracing::debug!(%actor, to, "pop");
	}

	fn on_pop_unhandled_event(&self, actor: &ActorId, event_type: &'static str, state: &'static str) {
		tracing::debug!(%actor, event_type, state, "pop to find a handler for unhandled event");
	}

	fn on_enqueue(&self, actor: &ActorId, event_type: &'static str, sender: Option<&ActorId>) {
		tracing::debug!(%actor, event_type, sender = ?sender, "enqueue");
	}

	fn on_dequeue(&self, actor: &ActorId, event_type: &'static str) {
		tracing::debug!(%actor, event_type, "dequeue");
	}

	fn on_receive(&self, actor: &ActorId, event_type: &'static str) {
		tracing::debug!(%actor, event_type, "receive");
	}

	fn on_wait(&self, actor: &ActorId) {
		tracing::debug!(%actor, "wait");
	}

	fn on_send(&self, from: &ActorId, to: &ActorId, event_type: &'static str) {
		tracing::debug!(%from, %to, event_type, "send");
	}

	fn on_timer_fired(&self, actor: &ActorId, timer_name: &'static str) {
		tracing::debug!(%actor, timer_name, "timer fired");
	}

	fn on_random(&self, actor: &ActorId, description: &str) {
		tracing::debug!(%actor, description, "random choice");
	}

	fn on_halt(&self, actor: &ActorId) {
		tracing::debug!(%actor, "halt");
	}

	fn on_default_event_handler(&self, actor: &ActorId, state: &'static str) {
		tracing::debug!(%actor, state, "default event handler");
	}

	fn on_execute_action(&self, actor: &ActorId, state: &'static str) {
		tracing::debug!(%actor, state, "execute action");
	}

	fn on_raise_event(&self, actor: &ActorId, event_type: &'static str) {
		tracing::debug!(%actor, event_type, "raise event");
	}

	fn on_handle_raised_event(&self, actor: &ActorId, event_type: &'static str) {
		tracing::debug!(%actor, event_type, "handle raised event");
	}

	fn on_exception_thrown(&self, actor: &ActorId, description: &str) {
		tracing::warn!(%actor, description, "exception thrown");
	}

	fn on_exception_handled(&self, actor: &ActorId, description: &str) {
		tracing::debug!(%actor, description, "exception handled");
	}

	fn on_create_monitor(&self, monitor_type: &'static str) {
		tracing::debug!(monitor_type, "create monitor");
	}

	fn on_monitor_state_transition(&self, monitor_type: &'static str, state: &'static str) {
		tracing::debug!(monitor_type, state, "monitor state transition");
	}

	fn on_monitor_process_event(&self, monitor_type: &'static str, event_type: &'static str) {
		tracing::debug!(monitor_type, event_type, "monitor process event");
	}

	fn on_monitor_raise_event(&self, monitor_type: &'static str, event_type: &'static str) {
		tracing::debug!(monitor_type, event_type, "monitor raise event");
	}

	fn on_monitor_execute_action(&self, monitor_type: &'static str, state: &'static str) {
		tracing::debug!(monitor_type, state, "monitor execute action");
	}

	fn on_error(&self, text: &str) {
		tracing::error!(text, "runtime error");
	}

	fn on_strategy_error(&self, strategy: &str, description: &str) {
		tracing::warn!(strategy, description, "strategy error");
	}
}
