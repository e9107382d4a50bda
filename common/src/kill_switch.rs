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

//! The scheduler's cancellation primitive (§4.4).
//!
//! A [`KillSwitch`] is how the `OperationScheduler` unwinds every in-flight
//! operation once a bug is found, a strategy error occurs, or the per-iteration
//! step budget is exceeded: every scheduling point checks it before resuming.

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc, Mutex, Weak,
};

use tracing::debug;

#[derive(Clone, Default)]
pub struct KillSwitch {
	inner: Arc<Inner>,
}

struct Inner {
	alive: AtomicBool,
	children: Mutex<Vec<Weak<Inner>>>,
}

impl Default for Inner {
	fn default() -> Self {
		Self { alive: AtomicBool::new(true), children: Mutex::default() }
	}
}

fn garbage_collect(children: &mut Vec<Weak<Inner>>) {
	let mut i = 0;
	while i < children.len() {
		if Weak::strong_count(&children[i]) == 0 {
			children.swap_remove(i);
		} else {
			i += 1;
		}
	}
}

impl KillSwitch {
	pub fn is_alive(&self) -> bool {
		self.inner.alive.load(Ordering::Relaxed)
	}

	pub fn is_dead(&self) -> bool {
		!self.is_alive()
	}

	pub fn kill(&self) {
		self.inner.kill();
	}

	/// Creates a child kill switch.
	///
	/// If the parent is already dead, the child is born dead too.
	pub fn child(&self) -> KillSwitch {
		let mut lock = self.inner.children.lock().unwrap();
		let child_inner = Inner { alive: AtomicBool::new(self.is_alive()), ..Default::default() };
		garbage_collect(&mut lock);
		let child_inner_arc = Arc::new(child_inner);
		lock.push(Arc::downgrade(&child_inner_arc));
		KillSwitch { inner: child_inner_arc }
	}
}

impl Inner {
	pub fn kill(&self) {
		debug!("kill-switch-activated");
		self.alive.store(false, Ordering::Relaxed);
		let mut lock = self.children.lock().unwrap();
		for weak in lock.drain(..) {
			if let Some(inner) = weak.upgrade() {
				inner.kill();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::KillSwitch;

	#[test]
	fn kill_switch_transitions_once() {
		let kill_switch = KillSwitch::default();
		assert!(kill_switch.is_alive());
		assert!(!kill_switch.is_dead());
		kill_switch.kill();
		assert!(!kill_switch.is_alive());
		assert!(kill_switch.is_dead());
		kill_switch.kill();
		assert!(kill_switch.is_dead());
	}

	#[test]
	fn children_die_with_parent() {
		let parent = KillSwitch::default();
		let child_a = parent.child();
		let child_b = parent.child();
		assert!(child_a.is_alive());
		assert!(child_b.is_alive());
		parent.kill();
		assert!(child_a.is_dead());
		assert!(child_b.is_dead());
	}

	#[test]
	fn grandchildren_die_with_grandparent() {
		let parent = KillSwitch::default();
		let child = parent.child();
		let grandchild = child.child();
		parent.kill();
		assert!(child.is_dead());
		assert!(grandchild.is_dead());
	}

	#[test]
	fn a_dying_child_does_not_kill_its_parent() {
		let parent = KillSwitch::default();
		let child = parent.child();
		child.kill();
		assert!(parent.is_alive());
		assert!(child.is_dead());
	}
}
