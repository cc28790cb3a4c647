// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Operator` (§4.G): the small value object carrying one request across
//! however many routing/retry attempts it takes to complete. A single
//! instance is re-routed across attempts; only its session-level sequence
//! id (assigned inside [`crate::session::Session`]) changes per attempt.

use bytes::Bytes;
use tokio::time::Instant;

use crate::{net::Gpid, wire::opcode::OperationCode};

/// One in-flight request as `TableHandler::execute` sees it.
pub struct Operator {
    pub op_code: OperationCode,
    pub hash_key: Bytes,
    pub sort_key: Bytes,
    pub body: Bytes,
    /// Filled in at route time, once the partition is known.
    pub gpid: Option<Gpid>,
    pub deadline: Instant,
    pub attempt: u32,
}

impl Operator {
    pub fn new(
        op_code: OperationCode,
        hash_key: Bytes,
        sort_key: Bytes,
        body: Bytes,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            op_code,
            hash_key,
            sort_key,
            body,
            gpid: None,
            deadline: Instant::now() + timeout,
            attempt: 0,
        }
    }
}
