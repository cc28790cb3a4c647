// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tokio_util::sync::CancellationToken;

/// The result of one state-machine step: move to a new state, stay put
/// (re-run the same state, e.g. after a transient wait), or finish.
pub enum Transition<S, R> {
    Next(S, R),
    Stay(R),
    Done(R),
}

/// One state in a state machine driving a `Ctx`.
pub trait StateMachine<Ctx, RespCtx>: Sized {
    type StepResult<'a>: Future<Output = RespCtx> + Send + 'a
    where
        Self: 'a,
        RespCtx: 'a,
        Ctx: 'a;

    fn step<'a>(&'a mut self, ctx: &'a mut Ctx) -> Self::StepResult<'a>;
}

/// Drives a state machine to completion and returns its final result.
/// Implementors hold the current state internally (typically
/// `Option<States>`, `take()`n each iteration) and loop `step()` until a
/// `Transition::Done` is produced.
pub trait StateMachineCtx<Ctx, Res> {
    async fn execute(&mut self, cancel: &CancellationToken) -> anyhow::Result<Res>;
}
