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

//! Logical timers (§5, ambient): the deterministic-core substitute for a
//! wall-clock timer facility.
//!
//! A started timer is not driven by any clock. Instead, at every scheduling
//! point while it is active, firing it becomes one more nondeterministic
//! choice the strategy may make (via `ActorCell::timers` and the scheduler's
//! enabled-set computation in `scheduler`/`dispatch`) — `start_timer`'s
//! period argument only distinguishes a one-shot timer (removed once fired)
//! from a periodic one (stays active and can fire again), since an actual
//! tick count would imply a real-time guarantee this runtime deliberately
//! does not make.

use std::fmt;

use common::ActorId;

/// Delivered to the owning actor's own queue when a logical timer fires.
#[derive(Clone, Debug)]
pub struct TimerFired {
	pub timer_name: &'static str,
}

impl fmt::Display for TimerFired {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TimerFired({})", self.timer_name)
	}
}

/// One actor's set of active logical timers, owned by its `ActorCell`.
#[derive(Clone, Debug, Default)]
pub struct TimerSet {
	active: Vec<ActiveTimer>,
}

#[derive(Clone, Debug)]
struct ActiveTimer {
	name: &'static str,
	periodic: bool,
}

impl TimerSet {
	pub fn start(&mut self, name: &'static str, periodic: bool) {
		if let Some(existing) = self.active.iter_mut().find(|t| t.name == name) {
			existing.periodic = periodic;
		} else {
			self.active.push(ActiveTimer { name, periodic });
		}
	}

	pub fn stop(&mut self, name: &str) {
		self.active.retain(|t| t.name != name);
	}

	pub fn active_names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.active.iter().map(|t| t.name)
	}

	/// Called once the strategy has chosen to fire `name`: removes it if
	/// one-shot, leaves it active (so it can fire again later) if periodic.
	pub fn fired(&mut self, name: &str) {
		if let Some(timer) = self.active.iter().find(|t| t.name == name) {
			if !timer.periodic {
				self.active.retain(|t| t.name != name);
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.active.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn one_shot_timer_is_removed_after_firing() {
		let mut timers = TimerSet::default();
		timers.start("Retry", false);
		assert_eq!(timers.active_names().collect::<Vec<_>>(), vec!["Retry"]);
		timers.fired("Retry");
		assert!(timers.is_empty());
	}

	#[test]
	fn periodic_timer_survives_firing() {
		let mut timers = TimerSet::default();
		timers.start("Heartbeat", true);
		timers.fired("Heartbeat");
		assert_eq!(timers.active_names().count(), 1);
	}

	#[test]
	fn stop_removes_the_named_timer_only() {
		let mut timers = TimerSet::default();
		timers.start("A", true);
		timers.start("B", true);
		timers.stop("A");
		assert_eq!(timers.active_names().collect::<Vec<_>>(), vec!["B"]);
	}
}
