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

//! Where a reproducing [`ScheduleTrace`] goes once an iteration finds a bug
//! (§4.8, §6 Exit discipline). Kept separate from `trace` itself so the
//! runtime core stays free of I/O: `driver` only reaches for a [`TraceSink`]
//! after `TestEngine::explore` has already returned.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;

use crate::trace::ScheduleTrace;

#[async_trait]
pub trait TraceSink: Send + Sync {
	async fn write(&self, trace: &ScheduleTrace) -> anyhow::Result<()>;
}

/// Persists the trace as pretty-printed JSON, the same shape `Config`'s
/// `StrategyKind::Replay` reads back in.
pub struct FileTraceSink {
	pub path: PathBuf,
}

impl FileTraceSink {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		FileTraceSink { path: path.into() }
	}
}

#[async_trait]
impl TraceSink for FileTraceSink {
	async fn write(&self, trace: &ScheduleTrace) -> anyhow::Result<()> {
		let json = trace.to_json().context("serializing schedule trace")?;
		tokio::fs::write(&self.path, json)
			.await
			.with_context(|| format!("writing schedule trace to {}", self.path.display()))
	}
}
