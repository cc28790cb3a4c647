// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Client-side RPC and routing engine for a partitioned, replicated
//! key-value store: address/identity, wire framing, sessions, the
//! replica session pool, the meta session, and the per-table handler
//! that routes, retries, and refreshes (§2).

pub mod cfg;
pub mod client;
pub mod error;
pub mod net;
pub mod op;
pub mod perf;
pub mod session;
pub mod state_machine;
pub mod table;
pub mod wire;

pub use cfg::ClientOptions;
pub use client::Client;
pub use error::{Error, ErrorKind, Result};
