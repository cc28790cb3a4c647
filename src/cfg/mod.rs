// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Construction configuration (§6). Logging setup is the host
//! application's job (§1 "Out of scope"); this crate only ever calls
//! `tracing::{debug,info,warn,error}!` and lets whatever subscriber the
//! host installed receive it.

pub mod options;

pub use options::ClientOptions;
