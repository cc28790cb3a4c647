// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Public error surface of the client.
//!
//! Internal plumbing (session I/O, framing, state machines) returns
//! `anyhow::Result` for convenience, the same as the rest of this crate's
//! ancestry; it is converted into [`Error`] only at the boundary a caller
//! actually sees — `TableHandler`/`MetaSession`/`Client` public methods.

use std::fmt;

use thiserror::Error;

/// Every way a request can fail, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation's deadline elapsed before a usable response arrived.
    Timeout,
    /// Meta reported the table does not exist.
    TableNotFound,
    /// Every configured meta endpoint failed or was exhausted.
    MetaUnreachable,
    /// Transport kept failing against the replica and the deadline does
    /// not leave room for another refresh + retry cycle.
    ReplicaUnreachable,
    /// Caller-supplied routing inputs violate a constraint (e.g. both
    /// hashKey and sortKey empty).
    InvalidArgument,
    /// The session's pending-send buffer was full.
    Overflow,
    /// A non-retryable error code came back from the server, preserved
    /// verbatim.
    ServerError(i32),
    /// The client (or the session carrying this request) was closed while
    /// the operation was in flight.
    Closed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Timeout => write!(f, "operation timed out"),
            ErrorKind::TableNotFound => write!(f, "table not found"),
            ErrorKind::MetaUnreachable => write!(f, "meta cluster unreachable"),
            ErrorKind::ReplicaUnreachable => write!(f, "replica unreachable"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument"),
            ErrorKind::Overflow => write!(f, "session send buffer overflow"),
            ErrorKind::ServerError(code) => write!(f, "server error (code={code})"),
            ErrorKind::Closed => write!(f, "client closed"),
        }
    }
}

/// The error type returned by every public, user-facing API in this crate.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    #[source]
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source(kind: ErrorKind, source: anyhow::Error) -> Self {
        Self {
            kind,
            source: Some(source),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
