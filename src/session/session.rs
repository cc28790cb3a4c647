// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Session` (§4.C): one TCP connection to one endpoint, carrying any
//! number of pipelined in-flight requests correlated by sequence id.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex as AsyncMutex, Notify, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    net::{Endpoint, Gpid},
    session::common::io_with_timeout,
    wire::{Frame, HEADER_LEN, opcode::OperationCode},
};

/// Why a [`Session`] completed a request without a server response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    /// The pending-send buffer was full when the request was enqueued.
    Overflow,
    /// The session was closed (by the caller, or by a transport error)
    /// while the request was in flight.
    Closed,
    /// The request's own deadline elapsed while queued or in flight.
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

struct PendingRequest {
    deadline: Instant,
    tx: oneshot::Sender<Result<Frame, SessionFailure>>,
}

struct QueuedSend {
    seq_id: u64,
    frame: Frame,
}

/// One TCP connection to one endpoint (§4.C). Constructed via
/// [`Session::spawn`], which also starts the background connect/reconnect
/// task; callers only ever see the `Arc<Session>` handle.
pub struct Session {
    endpoint: Endpoint,
    /// Replica sessions reconnect lazily (only once work is queued); a
    /// meta session passes `keep_alive = true` so its socket stays warm
    /// across calls as §4.E requires.
    keep_alive: bool,
    connect_timeout: Duration,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    send_buffer_cap: usize,

    state: Mutex<SessionState>,
    pending: DashMap<u64, PendingRequest>,
    next_seq: AtomicU64,
    deadlines: Mutex<BinaryHeap<Reverse<(Instant, u64)>>>,
    send_queue: Mutex<VecDeque<QueuedSend>>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,

    notify_work: Notify,
    notify_deadline: Notify,
    cancel: CancellationToken,
}

impl Session {
    /// Creates a session and starts its background connect/reconnect and
    /// deadline-reaper tasks on `io_handle` — the crate's own
    /// `io_threads`-sized I/O runtime (§5 "a small pool of I/O worker
    /// threads"), not necessarily the caller's ambient one. The session
    /// begins `Disconnected`; nothing is dialed until the first `send`.
    pub fn spawn(
        endpoint: Endpoint,
        keep_alive: bool,
        connect_timeout: Duration,
        reconnect_initial: Duration,
        reconnect_max: Duration,
        send_buffer_cap: usize,
        cancel: CancellationToken,
        io_handle: &tokio::runtime::Handle,
    ) -> std::sync::Arc<Self> {
        let session = std::sync::Arc::new(Self {
            endpoint,
            keep_alive,
            connect_timeout,
            reconnect_initial,
            reconnect_max,
            send_buffer_cap,
            state: Mutex::new(SessionState::Disconnected),
            pending: DashMap::new(),
            next_seq: AtomicU64::new(1),
            deadlines: Mutex::new(BinaryHeap::new()),
            send_queue: Mutex::new(VecDeque::new()),
            writer: AsyncMutex::new(None),
            notify_work: Notify::new(),
            notify_deadline: Notify::new(),
            cancel,
        });

        io_handle.spawn(Self::connection_loop(session.clone()));
        io_handle.spawn(Self::deadline_reaper(session.clone()));
        session
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn state(&self) -> SessionState {
        *self.state.lock().expect("session state mutex poisoned")
    }

    fn set_state(&self, s: SessionState) {
        *self.state.lock().expect("session state mutex poisoned") = s;
    }

    /// Sends a request frame; resolves with the matching response frame,
    /// or a [`SessionFailure`] (§4.C). Never blocks: when the session is
    /// not `Connected` the frame is queued for delivery on connect, or
    /// rejected synchronously with `Overflow` if the queue is full.
    pub async fn send(
        self: &std::sync::Arc<Self>,
        op_code: OperationCode,
        body: bytes::Bytes,
        gpid: Option<Gpid>,
        deadline: Instant,
    ) -> Result<Frame, SessionFailure> {
        if self.state() == SessionState::Closed || self.state() == SessionState::Closing {
            return Err(SessionFailure::Closed);
        }

        // A queued-but-unsent request is already represented in `pending`
        // (inserted unconditionally below), so this alone is the in-flight
        // count; `send_queue` is just the subset of `pending` not yet
        // written to the socket.
        if self.pending.len() >= self.send_buffer_cap {
            return Err(SessionFailure::Overflow);
        }

        let seq_id = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let timeout_ms = deadline
            .saturating_duration_since(Instant::now())
            .as_millis()
            .min(u64::from(u32::MAX) as u128) as u32;
        let frame = Frame {
            seq_id,
            op_code,
            is_response: false,
            timeout_ms,
            error_code: 0,
            trace_id: rand::random(),
            gpid,
            body,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq_id, PendingRequest { deadline, tx });
        self.push_deadline(deadline, seq_id);

        if self.state() == SessionState::Connected {
            if self.write_frame(&frame).await.is_err() {
                self.fail_connection();
            }
        } else {
            self.send_queue
                .lock()
                .expect("poisoned")
                .push_back(QueuedSend { seq_id, frame });
            self.notify_work.notify_one();
        }

        rx.await.unwrap_or(Err(SessionFailure::Closed))
    }

    /// Transitions to `Closing`, drains every pending request with
    /// `Kind::Closed`, and shuts the socket down.
    pub async fn close(&self) {
        self.set_state(SessionState::Closing);
        self.drain_pending(SessionFailure::Closed);
        *self.writer.lock().await = None;
        self.set_state(SessionState::Closed);
        self.cancel.cancel();
    }

    fn drain_pending(&self, failure: SessionFailure) {
        self.send_queue.lock().expect("poisoned").clear();
        let seq_ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for seq_id in seq_ids {
            if let Some((_, req)) = self.pending.remove(&seq_id) {
                let _ = req.tx.send(Err(failure));
            }
        }
    }

    fn fail_connection(&self) {
        if self.state() == SessionState::Closed || self.state() == SessionState::Closing {
            return;
        }
        self.set_state(SessionState::Disconnected);
        self.drain_pending(SessionFailure::Closed);
        self.notify_work.notify_one();
    }

    fn push_deadline(&self, deadline: Instant, seq_id: u64) {
        self.deadlines
            .lock()
            .expect("poisoned")
            .push(Reverse((deadline, seq_id)));
        self.notify_deadline.notify_one();
    }

    async fn write_frame(&self, frame: &Frame) -> anyhow::Result<()> {
        let encoded = frame.encode();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| anyhow::anyhow!("not connected"))?;
        // Held across the await deliberately: writes on a session are
        // serialized (§4.C "Ordering").
        writer.write_all(&encoded).await?;
        Ok(())
    }

    async fn connection_loop(self: std::sync::Arc<Self>) {
        let mut backoff = self.reconnect_initial;
        loop {
            if self.cancel.is_cancelled() || self.state() == SessionState::Closed {
                return;
            }

            if self.state() == SessionState::Disconnected
                && !self.keep_alive
                && self.send_queue.lock().expect("poisoned").is_empty()
            {
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = self.notify_work.notified() => {}
                }
                continue;
            }

            self.set_state(SessionState::Connecting);
            match io_with_timeout(
                "connect",
                TcpStream::connect((self.endpoint.to_ipv4_addr(), self.endpoint.port())),
                self.connect_timeout,
                &self.cancel,
            )
            .await
            {
                Ok(stream) => {
                    backoff = self.reconnect_initial;
                    let _ = stream.set_nodelay(true);
                    let (read_half, write_half) = stream.into_split();
                    *self.writer.lock().await = Some(write_half);
                    self.set_state(SessionState::Connected);
                    self.flush_queue().await;
                    debug!(endpoint = %self.endpoint, "session connected");

                    Self::read_loop(&self, read_half).await;

                    if self.cancel.is_cancelled() || self.state() == SessionState::Closed {
                        return;
                    }
                    self.fail_connection();
                }
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "connect failed");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.reconnect_max);
        }
    }

    async fn flush_queue(&self) {
        loop {
            let next = self.send_queue.lock().expect("poisoned").pop_front();
            let Some(queued) = next else { break };

            if !self.pending.contains_key(&queued.seq_id) {
                continue; // already timed out or completed
            }
            if self.write_frame(&queued.frame).await.is_err() {
                self.send_queue
                    .lock()
                    .expect("poisoned")
                    .push_front(queued);
                self.fail_connection();
                break;
            }
        }
    }

    async fn read_loop(self: &std::sync::Arc<Self>, mut read_half: OwnedReadHalf) {
        let mut buf = vec![0u8; HEADER_LEN];
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(e) = read_half.read_exact(&mut buf[..HEADER_LEN]).await {
                trace!(endpoint = %self.endpoint, error = %e, "read loop ended");
                return;
            }
            let total = match Frame::total_length(&buf[..HEADER_LEN]) {
                Ok(t) => t,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, error = %e, "bad frame header");
                    return;
                }
            };
            buf.resize(total, 0);
            if let Err(e) = read_half.read_exact(&mut buf[HEADER_LEN..total]).await {
                trace!(endpoint = %self.endpoint, error = %e, "read loop ended mid-body");
                return;
            }

            match Frame::decode(&buf[..total]) {
                Ok(frame) => self.complete(frame),
                Err(e) => warn!(endpoint = %self.endpoint, error = %e, "failed to decode frame"),
            }
            buf.resize(HEADER_LEN, 0);
        }
    }

    fn complete(&self, frame: Frame) {
        match self.pending.remove(&frame.seq_id) {
            Some((_, req)) => {
                let _ = req.tx.send(Ok(frame));
            }
            None => trace!(seq_id = frame.seq_id, "response for unknown sequence id"),
        }
    }

    async fn deadline_reaper(self: std::sync::Arc<Self>) {
        loop {
            if self.cancel.is_cancelled() || self.state() == SessionState::Closed {
                return;
            }

            let next = self.deadlines.lock().expect("poisoned").peek().map(|r| r.0);
            match next {
                None => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = self.notify_deadline.notified() => {}
                    }
                }
                Some((deadline, _)) => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep_until(deadline) => self.expire_due(),
                        _ = self.notify_deadline.notified() => {}
                    }
                }
            }
        }
    }

    fn expire_due(&self) {
        let now = Instant::now();
        loop {
            let due = {
                let mut heap = self.deadlines.lock().expect("poisoned");
                match heap.peek() {
                    Some(Reverse((deadline, _))) if *deadline <= now => heap.pop(),
                    _ => None,
                }
            };
            let Some(Reverse((_, seq_id))) = due else { break };
            if let Some((_, req)) = self.pending.remove(&seq_id) {
                let _ = req.tx.send(Err(SessionFailure::Timeout));
            }
        }
    }
}
