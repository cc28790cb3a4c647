// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Construction configuration (§6). No file/YAML loading here — the spec
//! scopes this crate to in-process construction, so `ClientOptions` is a
//! plain value a host application builds and passes in, validated the
//! same way the teacher validates its own `Config`.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::net::Endpoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Ordered list of meta endpoints; required, at least one entry.
    pub meta_servers: Vec<Endpoint>,
    /// Default per-operation deadline.
    pub operation_timeout_ms: u64,
    /// I/O worker pool size; defaults to the host's CPU count.
    pub io_threads: usize,
    pub enable_counter: bool,
    pub perf_counter_tags: String,
    pub push_interval_secs: u64,
    /// Per-session pending-send buffer capacity (§4.C backpressure).
    pub session_send_buffer: usize,
    pub connect_timeout_ms: u64,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// Meta query-config retry budget (§4.E).
    pub meta_max_retry: u32,
    /// Minimum interval between routing-table refreshes for one table
    /// (§4.F).
    pub min_refresh_interval_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            meta_servers: Vec::new(),
            operation_timeout_ms: 1000,
            io_threads: num_cpus::get(),
            enable_counter: false,
            perf_counter_tags: String::new(),
            push_interval_secs: 10,
            session_send_buffer: 100,
            connect_timeout_ms: 500,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 10_000,
            meta_max_retry: 10,
            min_refresh_interval_ms: 5000,
        }
    }
}

impl ClientOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.meta_servers.is_empty(), "meta_servers must not be empty");
        ensure!(self.io_threads >= 1, "io_threads must be >= 1");
        ensure!(
            self.operation_timeout_ms >= 1,
            "operation_timeout_ms must be >= 1"
        );
        ensure!(
            self.session_send_buffer >= 1,
            "session_send_buffer must be >= 1"
        );
        ensure!(
            self.reconnect_max_ms >= self.reconnect_initial_ms,
            "reconnect_max_ms must be >= reconnect_initial_ms"
        );
        Ok(())
    }
}
