// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Operation codes carried in the frame meta section (§6).
//!
//! The real wire protocol this client's ancestry targets names operations
//! by string on the meta path and by a small integer table on the replica
//! path; both directions are modeled here as one enum so `Session::send`
//! has a single type to carry regardless of which cluster it is talking
//! to. The string form is used when framing toward the meta cluster, the
//! numeric form toward a replica.

use core::fmt;

use thiserror::Error;

/// All operation codes this client ever sends.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCode {
    /// Query the partition-to-replica mapping for a table.
    CmQueryConfig = 0x0001,
    RpcRrdbGet = 0x0101,
    RpcRrdbPut = 0x0102,
    RpcRrdbMultiGet = 0x0103,
    RpcRrdbMultiPut = 0x0104,
    RpcRrdbRemove = 0x0105,
    RpcRrdbMultiRemove = 0x0106,
    RpcRrdbIncr = 0x0107,
    RpcRrdbTtl = 0x0108,
    RpcRrdbSortkeyCount = 0x0109,
    RpcRrdbGetScanner = 0x010A,
    RpcRrdbScan = 0x010B,
    RpcRrdbClearScanner = 0x010C,
}

impl OperationCode {
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub const fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            0x0001 => Self::CmQueryConfig,
            0x0101 => Self::RpcRrdbGet,
            0x0102 => Self::RpcRrdbPut,
            0x0103 => Self::RpcRrdbMultiGet,
            0x0104 => Self::RpcRrdbMultiPut,
            0x0105 => Self::RpcRrdbRemove,
            0x0106 => Self::RpcRrdbMultiRemove,
            0x0107 => Self::RpcRrdbIncr,
            0x0108 => Self::RpcRrdbTtl,
            0x0109 => Self::RpcRrdbSortkeyCount,
            0x010A => Self::RpcRrdbGetScanner,
            0x010B => Self::RpcRrdbScan,
            0x010C => Self::RpcRrdbClearScanner,
            _ => return None,
        })
    }

    pub const fn is_meta(self) -> bool {
        matches!(self, Self::CmQueryConfig)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::CmQueryConfig => "RPC_CM_QUERY_PARTITION_CONFIG_BY_INDEX",
            Self::RpcRrdbGet => "RPC_RRDB_RRDB_GET",
            Self::RpcRrdbPut => "RPC_RRDB_RRDB_PUT",
            Self::RpcRrdbMultiGet => "RPC_RRDB_RRDB_MULTI_GET",
            Self::RpcRrdbMultiPut => "RPC_RRDB_RRDB_MULTI_PUT",
            Self::RpcRrdbRemove => "RPC_RRDB_RRDB_REMOVE",
            Self::RpcRrdbMultiRemove => "RPC_RRDB_RRDB_MULTI_REMOVE",
            Self::RpcRrdbIncr => "RPC_RRDB_RRDB_INCR",
            Self::RpcRrdbTtl => "RPC_RRDB_RRDB_TTL",
            Self::RpcRrdbSortkeyCount => "RPC_RRDB_RRDB_SORTKEY_COUNT",
            Self::RpcRrdbGetScanner => "RPC_RRDB_RRDB_GET_SCANNER",
            Self::RpcRrdbScan => "RPC_RRDB_RRDB_SCAN",
            Self::RpcRrdbClearScanner => "RPC_RRDB_RRDB_CLEAR_SCANNER",
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when the frame header carries an operation code this client
/// does not recognize.
#[derive(Debug, Error)]
#[error("unknown operation code: 0x{0:04x}")]
pub struct UnknownOperationCode(pub u16);

impl TryFrom<u16> for OperationCode {
    type Error = UnknownOperationCode;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        Self::from_u16(v).ok_or(UnknownOperationCode(v))
    }
}
