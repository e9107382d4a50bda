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

//! Records every scheduling decision and every nondeterministic choice so a
//! bug-producing iteration can be replayed byte-for-byte (§4.8).
//!
//! A [`ScheduleTrace`] is `serde`-serializable (`serde_json`) so the external
//! driver can persist it to disk and feed it back in as `Config::replay_trace`
//! without this crate prescribing anything beyond "a JSON array of tagged
//! entries".

use serde::{Deserialize, Serialize};

/// One entry consulted, in order, by the strategy or the oracle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TraceEntry {
	NextOperation(String),
	BooleanChoice(bool),
	IntegerChoice(i64),
}

/// A finite ordered sequence of scheduler/oracle choices: the external
/// artifact used to reproduce a bug (§4.8, §6 Exit discipline).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScheduleTrace {
	entries: Vec<TraceEntry>,
}

impl ScheduleTrace {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> &[TraceEntry] {
		&self.entries
	}

	pub fn push(&mut self, entry: TraceEntry) {
		self.entries.push(entry);
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}

	pub fn from_json(json: &str) -> serde_json::Result<Self> {
		serde_json::from_str(json)
	}

	/// Number of `BooleanChoice`/`IntegerChoice` entries — used by the
	/// "nondeterminism recorded" testable property (§8).
	pub fn nondeterministic_choice_count(&self) -> usize {
		self.entries
			.iter()
			.filter(|e| matches!(e, TraceEntry::BooleanChoice(_) | TraceEntry::IntegerChoice(_)))
			.count()
	}
}

/// Appends trace entries in the exact order the scheduler and oracle consult
/// them. The recorder never reorders or drops an entry: the trace plus the
/// initial configuration is sufficient to reproduce the iteration.
#[derive(Default)]
pub struct TraceRecorder {
	trace: ScheduleTrace,
}

impl TraceRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record_operation(&mut self, actor_id_display: String) {
		self.trace.push(TraceEntry::NextOperation(actor_id_display));
	}

	pub fn record_boolean(&mut self, value: bool) {
		self.trace.push(TraceEntry::BooleanChoice(value));
	}

	pub fn record_integer(&mut self, value: i64) {
		self.trace.push(TraceEntry::IntegerChoice(value));
	}

	pub fn finish(self) -> ScheduleTrace {
		self.trace
	}

	pub fn trace(&self) -> &ScheduleTrace {
		&self.trace
	}

	pub fn reset(&mut self) {
		self.trace = ScheduleTrace::new();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_through_json() {
		let mut recorder = TraceRecorder::new();
		recorder.record_operation("Worker#0".to_string());
		recorder.record_boolean(true);
		recorder.record_integer(3);
		let trace = recorder.finish();
		let json = trace.to_json().unwrap();
		let restored = ScheduleTrace::from_json(&json).unwrap();
		assert_eq!(trace.entries(), restored.entries());
	}

	#[test]
	fn nondeterministic_choice_count_ignores_operation_entries() {
		let mut recorder = TraceRecorder::new();
		recorder.record_operation("A".to_string());
		recorder.record_boolean(false);
		recorder.record_operation("B".to_string());
		recorder.record_integer(7);
		assert_eq!(recorder.trace().nondeterministic_choice_count(), 2);
	}
}
