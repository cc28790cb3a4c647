// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `MetaSession` (§4.E): a warm connection (or connections) to the meta
//! cluster, fronting `CM_QUERY_CONFIG` behind the retry/redirect state
//! machine in [`crate::state_machine::meta_query`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
    net::Endpoint,
    session::session::Session,
    state_machine::{MetaQueryError, MetaQueryRunner, StateMachineCtx},
    wire::meta_codec::QueryConfigResponse,
};

pub struct MetaSession {
    sessions: Vec<Arc<Session>>,
    leader_idx: AtomicUsize,
    operation_timeout: Duration,
    max_retry: u32,
    cancel: CancellationToken,
}

impl MetaSession {
    pub fn new(
        meta_servers: &[Endpoint],
        connect_timeout: Duration,
        reconnect_initial: Duration,
        reconnect_max: Duration,
        send_buffer_cap: usize,
        operation_timeout: Duration,
        max_retry: u32,
        cancel: CancellationToken,
        io_handle: &tokio::runtime::Handle,
    ) -> Self {
        let sessions = meta_servers
            .iter()
            .map(|ep| {
                Session::spawn(
                    *ep,
                    true, // keep_alive: meta sessions stay warm across calls
                    connect_timeout,
                    reconnect_initial,
                    reconnect_max,
                    send_buffer_cap,
                    cancel.child_token(),
                    io_handle,
                )
            })
            .collect();
        Self {
            sessions,
            leader_idx: AtomicUsize::new(0),
            operation_timeout,
            max_retry,
            cancel,
        }
    }

    /// Runs the retry/redirect loop against the leader guess, updating it
    /// for next time before returning (§4.E).
    pub async fn query_config(
        &self,
        table_name: &str,
        deadline: tokio::time::Instant,
    ) -> Result<QueryConfigResponse, MetaQueryError> {
        let mut runner = MetaQueryRunner::new(
            self.sessions.clone(),
            self.leader_idx.load(Ordering::Relaxed),
            table_name.to_owned(),
            deadline,
            self.operation_timeout,
            self.max_retry,
        );
        let result = runner.execute(&self.cancel).await;
        if let Some(ep) = runner.leader_endpoint() {
            if let Some(idx) = self.sessions.iter().position(|s| s.endpoint() == ep) {
                self.leader_idx.store(idx, Ordering::Relaxed);
            }
        }
        result.map_err(|e| {
            e.downcast_ref::<MetaQueryError>()
                .copied()
                .unwrap_or(MetaQueryError::Exhausted)
        })
    }

    pub async fn close(&self) {
        for session in &self.sessions {
            session.close().await;
        }
    }
}
