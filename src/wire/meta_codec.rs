// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire encoding for `CM_QUERY_CONFIG`, the one meta RPC this crate
//! speaks directly (§4.E). Everything else crossing the wire is an
//! opaque, caller-supplied body per the spec's scope — this is the
//! exception because partition discovery is a core responsibility, not a
//! table-operation codec.

use anyhow::{Context, Result, bail};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    net::{Endpoint, Gpid, PartitionConfiguration},
    wire::server_errors::ERR_FORWARD_TO_OTHERS,
};

pub fn encode_query_config_request(table_name: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + table_name.len());
    buf.put_u16(table_name.len() as u16);
    buf.put_slice(table_name.as_bytes());
    buf.freeze()
}

/// The parsed reply to a `CM_QUERY_CONFIG` call. When `err ==
/// ERR_FORWARD_TO_OTHERS`, `forward_hint` carries the endpoint meta wants
/// the caller to retry against next; `configs` is empty in that case.
#[derive(Debug, Clone)]
pub struct QueryConfigResponse {
    pub err: i32,
    pub app_id: i32,
    pub partition_count: u32,
    pub configs: Vec<PartitionConfiguration>,
    pub forward_hint: Option<Endpoint>,
}

fn get_endpoint(buf: &mut impl Buf) -> Result<Endpoint> {
    if buf.remaining() < 6 {
        bail!("truncated endpoint");
    }
    let ip = buf.get_u32();
    let port = buf.get_u16();
    Ok(Endpoint::from_parts(ip, port))
}

pub fn decode_query_config_response(err: i32, body: &[u8]) -> Result<QueryConfigResponse> {
    let mut buf = body;

    if err == ERR_FORWARD_TO_OTHERS {
        let hint = get_endpoint(&mut buf).context("forward hint")?;
        return Ok(QueryConfigResponse {
            err,
            app_id: 0,
            partition_count: 0,
            configs: Vec::new(),
            forward_hint: Some(hint),
        });
    }

    if err != crate::wire::server_errors::ERR_OK {
        return Ok(QueryConfigResponse {
            err,
            app_id: 0,
            partition_count: 0,
            configs: Vec::new(),
            forward_hint: None,
        });
    }

    if buf.remaining() < 12 {
        bail!("truncated query-config response header");
    }
    let app_id = buf.get_i32();
    let partition_count = buf.get_u32();
    let num_configs = buf.get_u32();

    let mut configs = Vec::with_capacity(num_configs as usize);
    for _ in 0..num_configs {
        if buf.remaining() < 8 + 8 + 6 + 2 {
            bail!("truncated partition configuration entry");
        }
        let app_id = buf.get_i32();
        let partition_index = buf.get_i32();
        let ballot = buf.get_i64();
        let primary = get_endpoint(&mut buf)?;
        let num_secondaries = buf.get_u16();
        let mut secondaries = Vec::with_capacity(num_secondaries as usize);
        for _ in 0..num_secondaries {
            secondaries.push(get_endpoint(&mut buf)?);
        }
        if buf.remaining() < 4 {
            bail!("truncated max_replica_count");
        }
        let max_replica_count = buf.get_i32();
        configs.push(PartitionConfiguration {
            gpid: Gpid::new(app_id, partition_index),
            ballot,
            primary,
            secondaries,
            max_replica_count,
        });
    }

    Ok(QueryConfigResponse {
        err,
        app_id,
        partition_count,
        configs,
        forward_hint: None,
    })
}

/// Encodes a full query-config response body, used by the in-process
/// test stub server and by unit tests exercising the decoder.
pub fn encode_query_config_response(resp: &QueryConfigResponse) -> Bytes {
    if let Some(hint) = resp.forward_hint {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u32(hint.ipv4());
        buf.put_u16(hint.port());
        return buf.freeze();
    }
    if resp.err != crate::wire::server_errors::ERR_OK {
        return Bytes::new();
    }

    let mut buf = BytesMut::new();
    buf.put_i32(resp.app_id);
    buf.put_u32(resp.partition_count);
    buf.put_u32(resp.configs.len() as u32);
    for cfg in &resp.configs {
        buf.put_i32(cfg.gpid.app_id);
        buf.put_i32(cfg.gpid.partition_index);
        buf.put_i64(cfg.ballot);
        buf.put_u32(cfg.primary.ipv4());
        buf.put_u16(cfg.primary.port());
        buf.put_u16(cfg.secondaries.len() as u16);
        for sec in &cfg.secondaries {
            buf.put_u32(sec.ipv4());
            buf.put_u16(sec.port());
        }
        buf.put_i32(cfg.max_replica_count);
    }
    buf.freeze()
}
