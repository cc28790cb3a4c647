// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Global partition id and routing-key derivation (§3 of the spec).

use crc::{Crc, CRC_64_XZ};
use serde::{Deserialize, Serialize};

/// `(app_id, partition_index)`. `app_id` is assigned by meta;
/// `partition_index` is always `< partition_count` for the table it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gpid {
    pub app_id: i32,
    pub partition_index: i32,
}

impl Gpid {
    pub const fn new(app_id: i32, partition_index: i32) -> Self {
        Self {
            app_id,
            partition_index,
        }
    }
}

static ROUTING_CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Hashes the routing key the way the spec mandates: hashKey if non-empty,
/// else sortKey, through the fixed CRC64 variant.
pub fn routing_key_hash(hash_key: &[u8], sort_key: &[u8]) -> u64 {
    let bytes = if !hash_key.is_empty() {
        hash_key
    } else {
        sort_key
    };
    ROUTING_CRC64.checksum(bytes)
}

/// `partition_index = hash & (partition_count - 1)`. Only valid because
/// `TableRouting` enforces `partition_count` is a power of two — callers
/// outside `table::routing` should never call this with an
/// attacker/server-controlled, unchecked `partition_count`.
///
/// # Panics
/// Panics if `partition_count` is zero or not a power of two; this is a
/// programming error (a `TableRouting` should have rejected the
/// configuration earlier), not a runtime condition callers must recover
/// from.
pub fn routing_partition_index(
    hash_key: &[u8],
    sort_key: &[u8],
    partition_count: u32,
) -> u32 {
    assert!(
        partition_count.is_power_of_two(),
        "partition_count must be a power of two, got {partition_count}"
    );
    let hash = routing_key_hash(hash_key, sort_key);
    (hash & u64::from(partition_count - 1)) as u32
}
