// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Small state-machine scaffolding shared by the meta-query retry loop and
//! the table-handler operator loop.

pub mod common;
pub mod meta_query;

pub use common::{StateMachine, StateMachineCtx, Transition};
pub use meta_query::{MetaQueryError, MetaQueryRunner};
