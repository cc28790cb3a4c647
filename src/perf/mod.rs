// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Perf counters (§4.I), standing in for the out-of-scope HTTP metrics
//! push while keeping the counters themselves real.

pub mod counters;

pub use counters::PerfCounters;
