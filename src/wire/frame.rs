// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Length-prefixed frame encode/decode (§4.B).
//!
//! Every frame begins with a fixed 24-byte header
//! (`magic|total_length|header_length|header_crc32|body_crc32|header_version`)
//! followed by a fixed-layout meta section carrying the per-frame fields
//! the spec calls out (operation code, sequence id, timeout, error code,
//! trace id, partition gpid), followed by the opaque body. Everything is
//! big-endian on the wire, mirroring the teacher crate's BHS zero-copy
//! approach but with `zerocopy`'s explicit byte-order wrappers since this
//! protocol is big-endian rather than host-order.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::big_endian::{I32, U16, U32, U64},
};

use crate::{net::Gpid, wire::opcode::OperationCode};

const MAGIC: u32 = 0x5041_4B56; // "PAKV"
const HEADER_VERSION: u32 = 1;

/// Hard ceiling on a single frame's total length. Guards against
/// allocating an attacker/corruption-controlled buffer before any other
/// validation has run.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const FIXED_HEADER_LEN: usize = 24;
const META_LEN: usize = 36;
/// Total length of header bytes that precede the body (fixed header +
/// meta section). The length-prefix field in the fixed header, plus
/// everything the read loop must buffer before it can hand a frame to
/// [`Frame::decode`].
pub const HEADER_LEN: usize = FIXED_HEADER_LEN + META_LEN;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone)]
#[repr(C)]
struct FixedHeader {
    magic: U32,
    total_length: U32,
    header_length: U32,
    header_crc32: U32,
    body_crc32: U32,
    header_version: U32,
}

const FLAG_RESPONSE: u8 = 0b0000_0001;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Clone)]
#[repr(C)]
struct Meta {
    op_code: U16,
    flags: u8,
    _pad: u8,
    seq_id: U64,
    timeout_ms: U32,
    error_code: I32,
    trace_id: U64,
    gpid_app_id: I32,
    gpid_partition_index: I32,
}

/// A decoded frame, or the value handed to [`Frame::encode`] to produce
/// one.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq_id: u64,
    pub op_code: OperationCode,
    pub is_response: bool,
    /// Request-only: caller's remaining budget for this attempt, in ms.
    pub timeout_ms: u32,
    /// Response-only: the server's raw error code (`0` == `ERR_OK`).
    pub error_code: i32,
    pub trace_id: u64,
    /// Request-only: the partition this frame targets.
    pub gpid: Option<Gpid>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("bad magic number")]
    BadMagic,
    #[error("short read: need at least {need} bytes, got {got}")]
    ShortRead { need: usize, got: usize },
    #[error("header crc mismatch")]
    BadHeaderCrc,
    #[error("body crc mismatch")]
    BadBodyCrc,
    #[error("frame of {got} bytes exceeds limit of {limit}")]
    OversizedFrame { got: usize, limit: usize },
    #[error("unknown operation code: {0}")]
    UnknownOpcode(#[from] crate::wire::opcode::UnknownOperationCode),
}

impl Frame {
    /// Reads just the fixed header to learn the frame's total wire length,
    /// so the read loop knows how many more bytes to buffer before
    /// calling [`Frame::decode`]. `buf` must be at least [`HEADER_LEN`]
    /// bytes (the read loop always reads that much up front, since the
    /// meta section is fixed-size).
    pub fn total_length(buf: &[u8]) -> Result<usize, FramingError> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(FramingError::ShortRead {
                need: FIXED_HEADER_LEN,
                got: buf.len(),
            });
        }
        let fixed = FixedHeader::ref_from_bytes(&buf[..FIXED_HEADER_LEN])
            .expect("slice length checked above");
        if fixed.magic.get() != MAGIC {
            return Err(FramingError::BadMagic);
        }
        let total = fixed.total_length.get() as usize;
        if total > MAX_FRAME_LEN {
            return Err(FramingError::OversizedFrame {
                got: total,
                limit: MAX_FRAME_LEN,
            });
        }
        Ok(total)
    }

    /// Decodes a complete frame (header + body) previously assembled by
    /// the read loop using [`Frame::total_length`].
    pub fn decode(buf: &[u8]) -> Result<Frame, FramingError> {
        if buf.len() < HEADER_LEN {
            return Err(FramingError::ShortRead {
                need: HEADER_LEN,
                got: buf.len(),
            });
        }
        let fixed = FixedHeader::ref_from_bytes(&buf[..FIXED_HEADER_LEN])
            .expect("slice length checked above");
        if fixed.magic.get() != MAGIC {
            return Err(FramingError::BadMagic);
        }
        let total = fixed.total_length.get() as usize;
        if total > MAX_FRAME_LEN {
            return Err(FramingError::OversizedFrame {
                got: total,
                limit: MAX_FRAME_LEN,
            });
        }
        if buf.len() < total {
            return Err(FramingError::ShortRead {
                need: total,
                got: buf.len(),
            });
        }

        let expected_header_crc = fixed.header_crc32.get();
        let mut header_for_crc = buf[..HEADER_LEN].to_vec();
        header_for_crc[12..16].fill(0); // zero header_crc32 field before checksumming
        if crc32c::crc32c(&header_for_crc) != expected_header_crc {
            return Err(FramingError::BadHeaderCrc);
        }

        let body = &buf[HEADER_LEN..total];
        if crc32c::crc32c(body) != fixed.body_crc32.get() {
            return Err(FramingError::BadBodyCrc);
        }

        let meta = Meta::ref_from_bytes(&buf[FIXED_HEADER_LEN..HEADER_LEN])
            .expect("slice length checked above");
        let op_code = OperationCode::try_from(meta.op_code.get())?;
        let is_response = meta.flags & FLAG_RESPONSE != 0;
        let gpid = if is_response {
            None
        } else {
            Some(Gpid::new(
                meta.gpid_app_id.get(),
                meta.gpid_partition_index.get(),
            ))
        };

        Ok(Frame {
            seq_id: meta.seq_id.get(),
            op_code,
            is_response,
            timeout_ms: meta.timeout_ms.get(),
            error_code: meta.error_code.get(),
            trace_id: meta.trace_id.get(),
            gpid,
            body: Bytes::copy_from_slice(body),
        })
    }

    /// Encodes this frame into a single contiguous wire buffer.
    pub fn encode(&self) -> Bytes {
        let total = HEADER_LEN + self.body.len();
        let mut out = BytesMut::with_capacity(total);
        out.resize(total, 0);

        let meta = Meta {
            op_code: U16::new(self.op_code.as_u16()),
            flags: if self.is_response { FLAG_RESPONSE } else { 0 },
            _pad: 0,
            seq_id: U64::new(self.seq_id),
            timeout_ms: U32::new(self.timeout_ms),
            error_code: I32::new(self.error_code),
            trace_id: U64::new(self.trace_id),
            gpid_app_id: I32::new(self.gpid.map(|g| g.app_id).unwrap_or(0)),
            gpid_partition_index: I32::new(
                self.gpid.map(|g| g.partition_index).unwrap_or(0),
            ),
        };
        out[FIXED_HEADER_LEN..HEADER_LEN].copy_from_slice(meta.as_bytes());
        out[HEADER_LEN..].copy_from_slice(&self.body);

        let body_crc32 = crc32c::crc32c(&self.body);

        let fixed = FixedHeader {
            magic: U32::new(MAGIC),
            total_length: U32::new(total as u32),
            header_length: U32::new(HEADER_LEN as u32),
            header_crc32: U32::new(0),
            body_crc32: U32::new(body_crc32),
            header_version: U32::new(HEADER_VERSION),
        };
        out[..FIXED_HEADER_LEN].copy_from_slice(fixed.as_bytes());
        let header_crc32 = crc32c::crc32c(&out[..HEADER_LEN]);
        out[12..16].copy_from_slice(&header_crc32.to_be_bytes());

        out.freeze()
    }
}
