// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The top-level `Client`: wires a [`ClientOptions`] into a warm
//! [`MetaSession`], a [`ReplicaSessionPool`] shared by every table, and a
//! registry of [`TableHandler`]s opened on first use.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::ClientOptions,
    error::{Error, ErrorKind},
    op::Operator,
    perf::PerfCounters,
    session::{MetaSession, ReplicaSessionPool},
    table::TableHandler,
    wire::opcode::OperationCode,
};

pub struct Client {
    opts: Arc<ClientOptions>,
    meta: Arc<MetaSession>,
    pool: Arc<ReplicaSessionPool>,
    tables: DashMap<String, Arc<TableHandler>>,
    counters: Arc<PerfCounters>,
    cancel: CancellationToken,
    /// The crate's own `io_threads`-sized runtime (§5): every session's
    /// connect/receive/deadline-reaper tasks are pinned here rather than
    /// onto whatever runtime `Client::new` happened to be called from, so
    /// `io_threads` actually bounds how many OS threads service transport
    /// I/O. Kept alive for as long as the `Client` is; dropping it would
    /// cancel every background task.
    io_runtime: tokio::runtime::Runtime,
}

impl Client {
    pub fn new(opts: ClientOptions) -> Result<Self, Error> {
        opts.validate()
            .map_err(|e| Error::with_source(ErrorKind::InvalidArgument, e))?;
        let opts = Arc::new(opts);
        let cancel = CancellationToken::new();

        let connect_timeout = Duration::from_millis(opts.connect_timeout_ms);
        let reconnect_initial = Duration::from_millis(opts.reconnect_initial_ms);
        let reconnect_max = Duration::from_millis(opts.reconnect_max_ms);
        let operation_timeout = Duration::from_millis(opts.operation_timeout_ms);

        let io_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(opts.io_threads)
            .thread_name("partkv-io")
            .enable_all()
            .build()
            .map_err(|e| Error::with_source(ErrorKind::InvalidArgument, anyhow::Error::from(e)))?;
        let io_handle = io_runtime.handle().clone();

        let meta = Arc::new(MetaSession::new(
            &opts.meta_servers,
            connect_timeout,
            reconnect_initial,
            reconnect_max,
            opts.session_send_buffer,
            operation_timeout,
            opts.meta_max_retry,
            cancel.child_token(),
            &io_handle,
        ));
        let pool = Arc::new(ReplicaSessionPool::new(
            connect_timeout,
            reconnect_initial,
            reconnect_max,
            opts.session_send_buffer,
            cancel.child_token(),
            io_handle,
        ));

        let counters = Arc::new(PerfCounters::default());
        counters.clone().spawn_pusher(
            opts.enable_counter,
            opts.perf_counter_tags.clone(),
            Duration::from_secs(opts.push_interval_secs),
            cancel.child_token(),
            io_runtime.handle(),
        );

        Ok(Self {
            opts,
            meta,
            pool,
            tables: DashMap::new(),
            counters,
            cancel,
            io_runtime,
        })
    }

    /// Opens (or returns the already-open) handler for `table`.
    pub async fn open_table(&self, table: &str) -> Result<Arc<TableHandler>, Error> {
        if let Some(existing) = self.tables.get(table) {
            return Ok(existing.clone());
        }

        let handler = Arc::new(
            TableHandler::open(
                table,
                self.meta.clone(),
                self.pool.clone(),
                Duration::from_millis(self.opts.operation_timeout_ms),
                Duration::from_millis(self.opts.min_refresh_interval_ms),
                self.counters.clone(),
            )
            .await?,
        );
        self.tables
            .insert(table.to_owned(), handler.clone());
        Ok(handler)
    }

    /// Executes one request against `table`, opening it first if needed.
    /// `body` is the caller-encoded request payload for `op_code` — this
    /// crate never interprets per-operation semantics (GET/PUT/SCAN),
    /// only routes and retries.
    pub async fn execute(
        &self,
        table: &str,
        op_code: OperationCode,
        hash_key: Bytes,
        sort_key: Bytes,
        body: Bytes,
    ) -> Result<Bytes, Error> {
        if hash_key.is_empty() && sort_key.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }

        let handler = self.open_table(table).await?;
        self.counters.issued();
        let op = Operator::new(
            op_code,
            hash_key,
            sort_key,
            body,
            Duration::from_millis(self.opts.operation_timeout_ms),
        );
        let result = handler.execute(op).await;
        if result.is_ok() {
            self.counters.completed();
        }
        result
    }

    pub async fn close(&self) {
        self.cancel.cancel();
        self.pool.close_all().await;
        self.meta.close().await;
    }
}
