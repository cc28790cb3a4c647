// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session (§4.C), the replica session pool (§4.D), and the meta session
//! (§4.E): everything that owns a live TCP connection.

pub(crate) mod common;
pub mod meta;
pub mod pool;
pub mod session;

pub use meta::MetaSession;
pub use pool::ReplicaSessionPool;
pub use session::{Session, SessionFailure};
