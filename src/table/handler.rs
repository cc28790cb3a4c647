// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `TableHandler` (§4.F): per-table partition-map cache, routing, refresh
//! coalescing, and the operator retry/backoff loop.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    error::{Error, ErrorKind},
    op::Operator,
    perf::PerfCounters,
    session::{MetaSession, ReplicaSessionPool, SessionFailure},
    state_machine::MetaQueryError,
    table::routing::TableRouting,
    wire::server_errors::{ERR_OK, is_plain_retryable, triggers_refresh},
};

pub struct TableHandler {
    name: String,
    meta: Arc<MetaSession>,
    pool: Arc<ReplicaSessionPool>,
    routing: RwLock<Arc<TableRouting>>,
    /// Held for the duration of an in-flight refresh; a concurrent
    /// trigger that cannot acquire it immediately coalesces into the one
    /// already running instead of starting a second (§4.F "Refresh").
    refresh_gate: tokio::sync::Mutex<()>,
    min_refresh_interval: Duration,
    operation_timeout: Duration,
    counters: Arc<PerfCounters>,
}

impl TableHandler {
    /// Opens a table: queries meta once and caches the resulting routing
    /// table. Synchronous from the caller's point of view in spirit —
    /// there is exactly one meta round trip, no background work started
    /// before this returns.
    pub async fn open(
        name: impl Into<String>,
        meta: Arc<MetaSession>,
        pool: Arc<ReplicaSessionPool>,
        operation_timeout: Duration,
        min_refresh_interval: Duration,
        counters: Arc<PerfCounters>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let deadline = Instant::now() + operation_timeout;
        let resp = meta.query_config(&name, deadline).await.map_err(|e| match e {
            MetaQueryError::TableNotFound => Error::new(ErrorKind::TableNotFound),
            MetaQueryError::Exhausted => Error::new(ErrorKind::MetaUnreachable),
        })?;
        let routing = TableRouting::from_query_response(&resp)
            .map_err(|e| Error::with_source(ErrorKind::MetaUnreachable, e))?;

        Ok(Self {
            name,
            meta,
            pool,
            routing: RwLock::new(Arc::new(routing)),
            refresh_gate: tokio::sync::Mutex::new(()),
            min_refresh_interval,
            operation_timeout,
            counters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn current_routing(&self) -> Arc<TableRouting> {
        self.routing
            .read()
            .expect("table routing lock poisoned")
            .clone()
    }

    /// Routes `(hashKey, sortKey)` without sending anything (§4.F
    /// "Route"), mainly exposed for tests and diagnostics.
    pub fn route(&self, hash_key: &[u8], sort_key: &[u8]) -> (crate::net::Gpid, crate::net::Endpoint) {
        self.current_routing().route(hash_key, sort_key)
    }

    /// Triggers a refresh, coalescing concurrent callers into one
    /// in-flight meta round trip (§4.F). Returns once either this call's
    /// refresh completed, or another caller's already-running refresh
    /// did.
    async fn trigger_refresh(&self) {
        if !self.current_routing().is_stale(self.min_refresh_interval) {
            return;
        }

        let Ok(_guard) = self.refresh_gate.try_lock() else {
            // A refresh is already in flight; let it finish rather than
            // queuing a second one.
            return;
        };

        // Re-check after acquiring the gate: another refresh may have
        // completed while we were waiting to get in here.
        if !self.current_routing().is_stale(self.min_refresh_interval) {
            return;
        }

        let deadline = Instant::now() + self.operation_timeout;
        self.counters.refreshed();
        match self.meta.query_config(&self.name, deadline).await {
            Ok(resp) => match self.current_routing().merge_refresh(&resp) {
                Ok(fresh) => {
                    *self.routing.write().expect("table routing lock poisoned") = Arc::new(fresh);
                    debug!(table = %self.name, "routing table refreshed");
                }
                Err(e) => warn!(table = %self.name, error = %e, "refresh returned an invalid routing table"),
            },
            Err(e) => warn!(table = %self.name, error = %e, "refresh failed"),
        }
    }

    /// Drives one request to completion, routing, retrying, and
    /// refreshing as needed, bounded by `op.deadline` (§4.F "Execute").
    pub async fn execute(&self, mut op: Operator) -> Result<Bytes, Error> {
        let retry_delay = (self.operation_timeout / 3).max(Duration::from_millis(1));

        loop {
            let (gpid, ep) = self.route(&op.hash_key, &op.sort_key);
            if ep.is_invalid() {
                self.trigger_refresh().await;
                if self.would_exceed_deadline(op.deadline, retry_delay) {
                    self.counters.timed_out();
                    return Err(Error::new(ErrorKind::Timeout));
                }
                tokio::time::sleep(retry_delay).await;
                op.attempt += 1;
                self.counters.retried();
                continue;
            }
            op.gpid = Some(gpid);

            let remaining = op.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.counters.timed_out();
                return Err(Error::new(ErrorKind::Timeout));
            }
            let attempt_deadline = Instant::now() + remaining.min(self.operation_timeout);

            let session = self.pool.get(ep);
            let outcome = session
                .send(op.op_code, op.body.clone(), Some(gpid), attempt_deadline)
                .await;

            match outcome {
                Err(SessionFailure::Overflow) => {
                    return Err(Error::new(ErrorKind::Overflow));
                }
                Err(SessionFailure::Closed) => {
                    // Connection failure: §4.F lists this as a refresh
                    // trigger, unlike a plain per-attempt timeout below.
                    self.trigger_refresh().await;
                    if self.would_exceed_deadline(op.deadline, retry_delay) {
                        self.counters.timed_out();
                        return Err(Error::new(ErrorKind::ReplicaUnreachable));
                    }
                    tokio::time::sleep(retry_delay).await;
                    op.attempt += 1;
                    self.counters.retried();
                }
                Err(SessionFailure::Timeout) => {
                    // The attempt's own deadline elapsed without a
                    // response; no transport failure, so no refresh. If
                    // the overall op deadline is also gone this is a
                    // terminal Timeout, otherwise just try again.
                    if self.would_exceed_deadline(op.deadline, retry_delay) {
                        self.counters.timed_out();
                        return Err(Error::new(ErrorKind::Timeout));
                    }
                    op.attempt += 1;
                    self.counters.retried();
                }
                Ok(frame) => {
                    if frame.error_code == ERR_OK {
                        return Ok(frame.body);
                    }
                    if triggers_refresh(frame.error_code) {
                        self.trigger_refresh().await;
                        if self.would_exceed_deadline(op.deadline, retry_delay) {
                            self.counters.timed_out();
                            return Err(Error::new(ErrorKind::Timeout));
                        }
                        tokio::time::sleep(retry_delay).await;
                        op.attempt += 1;
                        self.counters.retried();
                    } else if is_plain_retryable(frame.error_code) {
                        if self.would_exceed_deadline(op.deadline, retry_delay) {
                            self.counters.timed_out();
                            return Err(Error::new(ErrorKind::Timeout));
                        }
                        tokio::time::sleep(retry_delay).await;
                        op.attempt += 1;
                        self.counters.retried();
                    } else {
                        return Err(Error::new(ErrorKind::ServerError(frame.error_code)));
                    }
                }
            }
        }
    }

    fn would_exceed_deadline(&self, deadline: Instant, retry_delay: Duration) -> bool {
        Instant::now() + retry_delay >= deadline
    }
}
