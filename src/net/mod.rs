// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Address and identity types: [`Endpoint`], [`Gpid`], [`PartitionConfiguration`],
//! and routing-key derivation.

pub mod address;
pub mod gpid;
pub mod partition;

pub use address::Endpoint;
pub use gpid::{Gpid, routing_partition_index};
pub use partition::PartitionConfiguration;
