// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `ReplicaSessionPool` (§4.D): one warm [`Session`] per replica
//! endpoint, shared across every table in the cluster.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::{net::Endpoint, session::session::Session};

pub struct ReplicaSessionPool {
    sessions: DashMap<Endpoint, Arc<Session>>,
    connect_timeout: Duration,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    send_buffer_cap: usize,
    cancel: CancellationToken,
    io_handle: tokio::runtime::Handle,
}

impl ReplicaSessionPool {
    pub fn new(
        connect_timeout: Duration,
        reconnect_initial: Duration,
        reconnect_max: Duration,
        send_buffer_cap: usize,
        cancel: CancellationToken,
        io_handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            connect_timeout,
            reconnect_initial,
            reconnect_max,
            send_buffer_cap,
            cancel,
            io_handle,
        }
    }

    /// Returns the existing session for `endpoint`, creating one (not yet
    /// connected) if none exists. Sessions are never removed during
    /// normal operation — only `close_all` tears them down.
    pub fn get(&self, endpoint: Endpoint) -> Arc<Session> {
        if let Some(existing) = self.sessions.get(&endpoint) {
            return existing.clone();
        }
        self.sessions
            .entry(endpoint)
            .or_insert_with(|| {
                Session::spawn(
                    endpoint,
                    false,
                    self.connect_timeout,
                    self.reconnect_initial,
                    self.reconnect_max,
                    self.send_buffer_cap,
                    self.cancel.child_token(),
                    &self.io_handle,
                )
            })
            .value()
            .clone()
    }

    /// Closes every session and clears the map.
    pub async fn close_all(&self) {
        let endpoints: Vec<Endpoint> = self.sessions.iter().map(|e| *e.key()).collect();
        for endpoint in endpoints {
            if let Some((_, session)) = self.sessions.remove(&endpoint) {
                session.close().await;
            }
        }
    }
}
