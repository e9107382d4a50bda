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

//! State hierarchy of one state-machine actor (§3, §4.2).
//!
//! Per the Design Notes, a state's handler table is *data* — a map from event
//! type tag to `{DoAction | GotoState | PushState}` — rather than reflection
//! over attributes on a class. `StateMachineCore` (see `dispatch`) walks this
//! data; it never inspects the actor's concrete Rust type.

use std::{any::Any, collections::HashMap, collections::HashSet, fmt, sync::Arc};

use crate::context::ActionCtx;

/// A synchronous handler: entry/exit actions and `DoAction` transitions all
/// share this shape. Boxed behind `Arc` so cloning a `StateDef` (e.g. to build
/// a new machine from a shared library of states) is cheap.
pub type Action = Arc<dyn Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync>;

/// What an actor's `onException` callback decides to do with a caught
/// exception (§4.7): a panicking action, or an event that reached the root
/// state stack unhandled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExceptionDecision {
	/// Swallow the fault; the iteration continues as though nothing happened.
	HandledException,
	/// Treat it like an ordinary `ctx.halt()`: run `OnHalt`, then drain.
	HaltMachine,
	/// Re-raise to the scheduler; ends the iteration as a bug.
	ThrowException,
}

/// `onException(methodName, message) -> ExceptionDecision` (§4.7). Machine-level
/// (not per-state), the same way `make_state` is: one policy per actor type.
pub type ExceptionHandler = Arc<dyn Fn(&mut dyn Any, &'static str, &str) -> ExceptionDecision + Send + Sync>;

/// `onEventUnhandled(event, stateName)` (§4.7): a pure notification fired
/// before an unhandled event is turned into an exception-producing situation.
/// Returns nothing — `onException` is what gets to decide the outcome.
pub type UnhandledEventHook = Arc<dyn Fn(&mut dyn Any, &str, &'static str) + Send + Sync>;

/// What happens when a given event type is handled by a state.
#[derive(Clone)]
pub enum Transition {
	/// Run an action; the state does not change.
	DoAction(Action),
	/// Exit down to this state's ancestors and enter `target` (§4.2 step 5).
	Goto(&'static str),
	/// Enter `target` without exiting any currently-active state.
	Push(&'static str),
}

impl fmt::Debug for Transition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Transition::DoAction(_) => write!(f, "DoAction(..)"),
			Transition::Goto(s) => write!(f, "Goto({s})"),
			Transition::Push(s) => write!(f, "Push({s})"),
		}
	}
}

/// One named state: entry/exit actions, its handler table, and the event
/// types it currently defers or ignores while active.
pub struct StateDef {
	pub name: &'static str,
	pub entry: Option<Action>,
	pub exit: Option<Action>,
	pub handlers: HashMap<&'static str, Transition>,
	pub default: Option<Action>,
	pub defer: HashSet<&'static str>,
	pub ignore: HashSet<&'static str>,
}

impl StateDef {
	pub fn has_handler(&self, event_type: &str) -> bool {
		self.handlers.contains_key(event_type)
	}
}

/// Builds a [`StateDef`] with a fluent API, in the spirit of the teacher's
/// `SpawnBuilder`.
pub struct StateBuilder {
	name: &'static str,
	entry: Option<Action>,
	exit: Option<Action>,
	handlers: HashMap<&'static str, Transition>,
	default: Option<Action>,
	defer: HashSet<&'static str>,
	ignore: HashSet<&'static str>,
}

impl StateBuilder {
	pub fn new(name: &'static str) -> Self {
		StateBuilder {
			name,
			entry: None,
			exit: None,
			handlers: HashMap::new(),
			default: None,
			defer: HashSet::new(),
			ignore: HashSet::new(),
		}
	}

	#[must_use]
	pub fn on_entry<F>(mut self, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.entry = Some(Arc::new(action));
		self
	}

	#[must_use]
	pub fn on_exit<F>(mut self, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.exit = Some(Arc::new(action));
		self
	}

	#[must_use]
	pub fn on_default<F>(mut self, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.default = Some(Arc::new(action));
		self
	}

	#[must_use]
	pub fn on_do<F>(mut self, event_type: &'static str, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.handlers.insert(event_type, Transition::DoAction(Arc::new(action)));
		self
	}

	/// Registers this state's `OnHalt` handler (§4.2), addressed through the
	/// same handler table as any other event via `crate::event::halt_event_type`.
	#[must_use]
	pub fn on_halt<F>(self, action: F) -> Self
	where F: Fn(&mut dyn Any, &mut ActionCtx<'_>) + Send + Sync + 'static {
		self.on_do(crate::event::halt_event_type(), action)
	}

	#[must_use]
	pub fn on_goto(mut self, event_type: &'static str, target: &'static str) -> Self {
		self.handlers.insert(event_type, Transition::Goto(target));
		self
	}

	#[must_use]
	pub fn on_push(mut self, event_type: &'static str, target: &'static str) -> Self {
		self.handlers.insert(event_type, Transition::Push(target));
		self
	}

	#[must_use]
	pub fn defer(mut self, event_type: &'static str) -> Self {
		self.defer.insert(event_type);
		self
	}

	#[must_use]
	pub fn ignore(mut self, event_type: &'static str) -> Self {
		self.ignore.insert(event_type);
		self
	}

	pub fn build(self) -> StateDef {
		StateDef {
			name: self.name,
			entry: self.entry,
			exit: self.exit,
			handlers: self.handlers,
			default: self.default,
			defer: self.defer,
			ignore: self.ignore,
		}
	}
}

/// The static behavior of an actor type: its named states and which one is
/// entered first. Shared (via `Arc`) across every instance of that actor
/// type, the same way a class's method table is shared across its instances.
/// `make_state` is this type's per-instance constructor, invoked once by
/// `createActor` for each new `ActorCell` (mirrors `MonitorDef::make_state`).
pub struct StateMachineDef {
	pub states: HashMap<&'static str, Arc<StateDef>>,
	pub start_state: &'static str,
	make_state: Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>,
	pub on_exception: Option<ExceptionHandler>,
	pub on_event_unhandled: Option<UnhandledEventHook>,
}

impl StateMachineDef {
	pub fn builder(start_state: &'static str) -> StateMachineDefBuilder {
		StateMachineDefBuilder {
			states: HashMap::new(),
			start_state,
			make_state: None,
			on_exception: None,
			on_event_unhandled: None,
		}
	}

	pub fn state(&self, name: &str) -> &Arc<StateDef> {
		self.states.get(name).unwrap_or_else(|| panic!("unknown state '{name}'"))
	}

	pub fn new_user_state(&self) -> Box<dyn Any + Send> {
		(self.make_state)()
	}
}

pub struct StateMachineDefBuilder {
	states: HashMap<&'static str, Arc<StateDef>>,
	start_state: &'static str,
	make_state: Option<Arc<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>>,
	on_exception: Option<ExceptionHandler>,
	on_event_unhandled: Option<UnhandledEventHook>,
}

impl StateMachineDefBuilder {
	#[must_use]
	pub fn with_state(mut self, state: StateDef) -> Self {
		self.states.insert(state.name, Arc::new(state));
		self
	}

	#[must_use]
	pub fn with_state_factory<F>(mut self, make_state: F) -> Self
	where F: Fn() -> Box<dyn Any + Send> + Send + Sync + 'static {
		self.make_state = Some(Arc::new(make_state));
		self
	}

	/// Registers the actor type's `onException` policy (§4.7): invoked with
	/// the method name that faulted and the exception's message, decides
	/// whether to swallow it, halt the actor, or let it end the iteration.
	#[must_use]
	pub fn with_exception_handler<F>(mut self, handler: F) -> Self
	where F: Fn(&mut dyn Any, &'static str, &str) -> ExceptionDecision + Send + Sync + 'static {
		self.on_exception = Some(Arc::new(handler));
		self
	}

	/// Registers the actor type's `onEventUnhandled` notification (§4.7),
	/// fired before an unhandled event is routed through `onException`.
	#[must_use]
	pub fn with_unhandled_event_hook<F>(mut self, hook: F) -> Self
	where F: Fn(&mut dyn Any, &str, &'static str) + Send + Sync + 'static {
		self.on_event_unhandled = Some(Arc::new(hook));
		self
	}

	pub fn build(self) -> Arc<StateMachineDef> {
		assert!(
			self.states.contains_key(self.start_state),
			"start state '{}' was never registered",
			self.start_state
		);
		Arc::new(StateMachineDef {
			states: self.states,
			start_state: self.start_state,
			make_state: self.make_state.unwrap_or_else(|| Arc::new(|| Box::new(()))),
			on_exception: self.on_exception,
			on_event_unhandled: self.on_event_unhandled,
		})
	}
}

/// Runtime hierarchy of currently-entered states, root (index 0) to current
/// (top). Exactly one state is "current"; popping the root is forbidden
/// except during halt (enforced by the dispatch engine, not here).
#[derive(Debug, Default, Clone)]
pub struct StateStack {
	entered: Vec<&'static str>,
}

impl StateStack {
	pub fn new(start_state: &'static str) -> Self {
		StateStack { entered: vec![start_state] }
	}

	pub fn current(&self) -> &'static str {
		*self.entered.last().expect("state stack is never empty while the actor is alive")
	}

	pub fn depth(&self) -> usize {
		self.entered.len()
	}

	/// Top-to-root view, for handler resolution (§4.2 step 3).
	pub fn top_to_root(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.entered.iter().rev().copied()
	}

	pub fn push(&mut self, state: &'static str) {
		self.entered.push(state);
	}

	/// Pops the current state. Panics if called on the root; callers must
	/// check `depth() > 1` first (the dispatch engine reports this as
	/// `BugKind::AssertionFailure` rather than unwinding the process).
	pub fn pop(&mut self) -> &'static str {
		assert!(self.entered.len() > 1, "cannot pop the root state");
		self.entered.pop().expect("checked above")
	}

	/// Replaces the whole stack with a single fresh state, as `Goto` does:
	/// without statically-declared parent links between states, the
	/// hierarchical "common ancestor" a `Goto` exits down to is always the
	/// root, so a goto always unwinds every active state (see DESIGN.md).
	pub fn reset_to(&mut self, state: &'static str) {
		self.entered.clear();
		self.entered.push(state);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn push_then_pop_restores_previous_current_state() {
		let mut stack = StateStack::new("Root");
		stack.push("Child");
		assert_eq!(stack.current(), "Child");
		assert_eq!(stack.depth(), 2);
		let popped = stack.pop();
		assert_eq!(popped, "Child");
		assert_eq!(stack.current(), "Root");
	}

	#[test]
	#[should_panic(expected = "cannot pop the root state")]
	fn popping_the_root_panics() {
		let mut stack = StateStack::new("Root");
		stack.pop();
	}

	#[test]
	fn top_to_root_visits_most_current_state_first() {
		let mut stack = StateStack::new("Root");
		stack.push("Mid");
		stack.push("Leaf");
		let order: Vec<_> = stack.top_to_root().collect();
		assert_eq!(order, vec!["Leaf", "Mid", "Root"]);
	}

	#[test]
	fn goto_resets_the_whole_stack() {
		let mut stack = StateStack::new("Root");
		stack.push("Mid");
		stack.push("Leaf");
		stack.reset_to("Other");
		assert_eq!(stack.depth(), 1);
		assert_eq!(stack.current(), "Other");
	}
}
