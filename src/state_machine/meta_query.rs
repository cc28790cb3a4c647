// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The meta query-config retry/redirect loop (§4.E), modeled as an
//! explicit `Start → SendQuery → AwaitResponse → FollowRedirect → Done`
//! state machine instead of recursive calls, so the retry budget lives
//! in one place.

use std::{fmt, pin::Pin, sync::Arc, time::Duration};

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

use crate::{
    net::Endpoint,
    session::session::{Session, SessionFailure},
    state_machine::common::{StateMachine, StateMachineCtx, Transition},
    wire::{
        meta_codec::{QueryConfigResponse, decode_query_config_response, encode_query_config_request},
        opcode::OperationCode,
        server_errors::{ERR_FORWARD_TO_OTHERS, ERR_OBJECT_NOT_FOUND, ERR_OK},
    },
};

/// Why `query_config` gave up without an `ERR_OK` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaQueryError {
    /// Meta returned `ERR_OBJECT_NOT_FOUND` for the table.
    TableNotFound,
    /// Every endpoint failed, or attempts/deadline ran out first.
    Exhausted,
}

impl fmt::Display for MetaQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaQueryError::TableNotFound => write!(f, "table not found"),
            MetaQueryError::Exhausted => write!(f, "meta cluster unreachable"),
        }
    }
}

impl std::error::Error for MetaQueryError {}

/// Mutable state threaded through every step: which endpoint is the
/// current leader guess, how many attempts remain, and the final
/// outcome once reached.
pub struct MetaQueryCtx {
    pub sessions: Vec<Arc<Session>>,
    pub leader_idx: usize,
    pub table_name: String,
    pub deadline: tokio::time::Instant,
    pub operation_timeout: Duration,
    pub max_retry: u32,
    pub attempt: u32,
    pub result: Option<Result<QueryConfigResponse, MetaQueryError>>,
}

/// The one state this machine ever runs; `FollowRedirect` is folded into
/// `SendQuery` by updating `ctx.leader_idx` before looping, matching how
/// the spec describes it ("update leader guess and retry").
pub enum MetaQueryState {
    SendQuery,
}

type StepOutput = Transition<MetaQueryState, ()>;

impl StateMachine<MetaQueryCtx, StepOutput> for MetaQueryState {
    type StepResult<'a>
        = Pin<Box<dyn Future<Output = StepOutput> + Send + 'a>>
    where
        Self: 'a,
        StepOutput: 'a,
        MetaQueryCtx: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut MetaQueryCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            if ctx.attempt >= ctx.max_retry || tokio::time::Instant::now() >= ctx.deadline {
                ctx.result = Some(Err(MetaQueryError::Exhausted));
                return Transition::Done(());
            }
            ctx.attempt += 1;

            let session = ctx.sessions[ctx.leader_idx].clone();
            let remaining = ctx
                .deadline
                .saturating_duration_since(tokio::time::Instant::now());
            let attempt_deadline = tokio::time::Instant::now()
                + remaining.min(ctx.operation_timeout);
            let body = encode_query_config_request(&ctx.table_name);

            let outcome = session
                .send(OperationCode::CmQueryConfig, body, None, attempt_deadline)
                .await;

            let frame = match outcome {
                Ok(frame) => frame,
                Err(SessionFailure::Overflow | SessionFailure::Closed | SessionFailure::Timeout) => {
                    ctx.leader_idx = (ctx.leader_idx + 1) % ctx.sessions.len();
                    return Transition::Stay(());
                }
            };

            let parsed = match decode_query_config_response(frame.error_code, &frame.body) {
                Ok(p) => p,
                Err(_) => {
                    ctx.leader_idx = (ctx.leader_idx + 1) % ctx.sessions.len();
                    return Transition::Stay(());
                }
            };

            match parsed.err {
                ERR_OK => {
                    ctx.result = Some(Ok(parsed));
                    Transition::Done(())
                }
                ERR_OBJECT_NOT_FOUND => {
                    ctx.result = Some(Err(MetaQueryError::TableNotFound));
                    Transition::Done(())
                }
                ERR_FORWARD_TO_OTHERS => {
                    if let Some(hint) = parsed.forward_hint {
                        if let Some(idx) = ctx.sessions.iter().position(|s| s.endpoint() == hint) {
                            ctx.leader_idx = idx;
                        }
                    }
                    Transition::Stay(())
                }
                _other => {
                    ctx.leader_idx = (ctx.leader_idx + 1) % ctx.sessions.len();
                    Transition::Stay(())
                }
            }
        })
    }
}

pub struct MetaQueryRunner {
    ctx: MetaQueryCtx,
    state: Option<MetaQueryState>,
}

impl MetaQueryRunner {
    pub fn new(
        sessions: Vec<Arc<Session>>,
        initial_leader: usize,
        table_name: String,
        deadline: tokio::time::Instant,
        operation_timeout: Duration,
        max_retry: u32,
    ) -> Self {
        Self {
            ctx: MetaQueryCtx {
                sessions,
                leader_idx: initial_leader,
                table_name,
                deadline,
                operation_timeout,
                max_retry,
                attempt: 0,
                result: None,
            },
            state: Some(MetaQueryState::SendQuery),
        }
    }

    /// The endpoint the retry loop ended up treating as leader — callers
    /// use this to update their own round-robin guess for next time.
    pub fn leader_endpoint(&self) -> Option<Endpoint> {
        self.ctx.sessions.get(self.ctx.leader_idx).map(|s| s.endpoint())
    }
}

impl StateMachineCtx<MetaQueryCtx, QueryConfigResponse> for MetaQueryRunner {
    async fn execute(&mut self, cancel: &CancellationToken) -> anyhow::Result<QueryConfigResponse> {
        loop {
            let mut state = self
                .state
                .take()
                .expect("MetaQueryRunner polled after completion");
            let transition = tokio::select! {
                _ = cancel.cancelled() => return Err(anyhow!("meta query cancelled")),
                t = state.step(&mut self.ctx) => t,
            };
            match transition {
                Transition::Next(next, ()) => self.state = Some(next),
                Transition::Stay(()) => self.state = Some(state),
                Transition::Done(()) => {
                    return self
                        .ctx
                        .result
                        .take()
                        .unwrap_or(Err(MetaQueryError::Exhausted))
                        .map_err(anyhow::Error::from);
                }
            }
        }
    }
}
