// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `TableRouting` (§3): the partition map a [`super::handler::TableHandler`]
//! caches for one table, plus the routing math (§4.F "Route").

use anyhow::{Result, bail};
use tokio::time::Instant;

use crate::{
    net::{Endpoint, Gpid, PartitionConfiguration, routing_partition_index},
    wire::meta_codec::QueryConfigResponse,
};

/// An immutable snapshot of a table's partition map. Published behind a
/// `RwLock<Arc<TableRouting>>` (§5) so readers clone the `Arc` under a
/// read lock and a refresh swaps in a whole new snapshot atomically.
#[derive(Debug, Clone)]
pub struct TableRouting {
    pub app_id: i32,
    pub partition_count: u32,
    pub configs: Vec<PartitionConfiguration>,
    pub last_refresh: Instant,
}

impl TableRouting {
    /// Builds a routing snapshot from a meta `QueryConfigResponse`,
    /// enforcing the invariants §3 requires: `partition_count` is a power
    /// of two, and `configs[i].gpid.partition_index == i`.
    pub fn from_query_response(resp: &QueryConfigResponse) -> Result<Self> {
        if !resp.partition_count.is_power_of_two() {
            bail!(
                "meta returned non-power-of-two partition_count={}",
                resp.partition_count
            );
        }
        if resp.configs.len() as u32 != resp.partition_count {
            bail!(
                "meta returned {} configs but partition_count={}",
                resp.configs.len(),
                resp.partition_count
            );
        }
        let mut configs = resp.configs.clone();
        configs.sort_by_key(|c| c.gpid.partition_index);
        for (i, cfg) in configs.iter().enumerate() {
            if cfg.gpid.partition_index != i as i32 {
                bail!(
                    "meta config gap: expected partition_index {i}, got {}",
                    cfg.gpid.partition_index
                );
            }
        }
        Ok(Self {
            app_id: resp.app_id,
            partition_count: resp.partition_count,
            configs,
            last_refresh: Instant::now(),
        })
    }

    /// Routes `(hashKey, sortKey)` to a `(gpid, primary endpoint)` pair
    /// (§4.F "Route"). An invalid primary in the returned endpoint means
    /// the caller should trigger a refresh rather than send.
    pub fn route(&self, hash_key: &[u8], sort_key: &[u8]) -> (Gpid, Endpoint) {
        let index =
            routing_partition_index(hash_key, sort_key, self.partition_count) as usize;
        let cfg = &self.configs[index];
        (cfg.gpid, cfg.primary)
    }

    pub fn is_stale(&self, min_refresh_interval: std::time::Duration) -> bool {
        self.last_refresh.elapsed() >= min_refresh_interval
    }

    /// Builds the snapshot a refresh should publish: a fresh response
    /// merged against the routing it is replacing, per-partition. A
    /// partition's config is only taken from `resp` when it
    /// [`PartitionConfiguration::supersedes`] the one already cached —
    /// meta returning a regressed ballot for one partition (a stale
    /// secondary answering, or a reordered response) doesn't get to
    /// clobber a newer primary this client already knows about (§3
    /// "Ballot monotonically increases").
    pub fn merge_refresh(&self, resp: &QueryConfigResponse) -> Result<Self> {
        let mut fresh = Self::from_query_response(resp)?;
        for (old, new) in self.configs.iter().zip(fresh.configs.iter_mut()) {
            if !new.supersedes(old) {
                *new = old.clone();
            }
        }
        Ok(fresh)
    }
}
