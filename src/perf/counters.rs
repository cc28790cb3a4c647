// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Perf counters (§4.I): cheap atomic tallies, optionally pushed to the
//! log periodically in place of the out-of-scope HTTP metrics agent.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Default)]
pub struct PerfCounters {
    issued: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    timed_out: AtomicU64,
    refreshed: AtomicU64,
}

impl PerfCounters {
    pub fn issued(&self) {
        self.issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refreshed(&self) {
        self.refreshed.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> [u64; 5] {
        [
            self.issued.load(Ordering::Relaxed),
            self.completed.load(Ordering::Relaxed),
            self.retried.load(Ordering::Relaxed),
            self.timed_out.load(Ordering::Relaxed),
            self.refreshed.load(Ordering::Relaxed),
        ]
    }

    /// Spawns the periodic log-line pusher. A no-op background task when
    /// `enable_counter` is false, so callers can unconditionally hold the
    /// returned handle.
    pub fn spawn_pusher(
        self: std::sync::Arc<Self>,
        enable_counter: bool,
        tags: String,
        push_interval: std::time::Duration,
        cancel: CancellationToken,
        io_handle: &tokio::runtime::Handle,
    ) {
        if !enable_counter {
            return;
        }
        io_handle.spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(push_interval) => {}
                }
                let [issued, completed, retried, timed_out, refreshed] = self.snapshot();
                info!(
                    tags = %tags,
                    issued,
                    completed,
                    retried,
                    timed_out,
                    refreshed,
                    "perf counters"
                );
            }
        });
    }
}
