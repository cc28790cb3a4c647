// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire framer: length-prefixed frame encode/decode (§4.B), operation
//! codes (§6), server error codes (§4.F, §7), and the meta-query codec
//! (§4.E).

pub mod frame;
pub mod meta_codec;
pub mod opcode;
pub mod server_errors;

pub use frame::{Frame, FramingError, HEADER_LEN};
pub use opcode::OperationCode;
