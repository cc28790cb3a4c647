// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 1 (spec §8): a table with `partition_count = 8` routes
//! `hashKey = "user:42"` to whichever partition the fixed hash lands on,
//! and the request actually reaches that partition's primary.

use bytes::Bytes;
use partkv_client_rs::{
    Client, ClientOptions,
    net::{Endpoint, Gpid, PartitionConfiguration, routing_partition_index},
    wire::{
        Frame, OperationCode,
        meta_codec::{QueryConfigResponse, encode_query_config_response},
        server_errors::ERR_OK,
    },
};

use super::common::{bind_loopback, read_frame, write_frame};

const PARTITION_COUNT: u32 = 8;

fn configs_with_primary_at(target_index: u32, primary: Endpoint) -> Vec<PartitionConfiguration> {
    (0..PARTITION_COUNT)
        .map(|i| PartitionConfiguration {
            gpid: Gpid::new(7, i as i32),
            ballot: 1,
            primary: if i == target_index { primary } else { Endpoint::invalid() },
            secondaries: Vec::new(),
            max_replica_count: 3,
        })
        .collect()
}

#[tokio::test]
async fn routes_to_the_partitions_primary() {
    let hash_key: &[u8] = b"user:42";
    let target_index = routing_partition_index(hash_key, b"", PARTITION_COUNT);

    let (replica_ep, replica_listener) = bind_loopback();
    let (meta_ep, meta_listener) = bind_loopback();
    let configs = configs_with_primary_at(target_index, replica_ep);

    tokio::spawn(async move {
        let (mut stream, _) = meta_listener.accept().await.expect("accept meta");
        while let Ok(req) = read_frame(&mut stream).await {
            let resp = QueryConfigResponse {
                err: ERR_OK,
                app_id: 7,
                partition_count: PARTITION_COUNT,
                configs: configs.clone(),
                forward_hint: None,
            };
            let body = encode_query_config_response(&resp);
            write_frame(
                &mut stream,
                &Frame {
                    seq_id: req.seq_id,
                    op_code: OperationCode::CmQueryConfig,
                    is_response: true,
                    timeout_ms: 0,
                    error_code: ERR_OK,
                    trace_id: req.trace_id,
                    gpid: None,
                    body,
                },
            )
            .await;
        }
    });

    tokio::spawn(async move {
        let (mut stream, _) = replica_listener.accept().await.expect("accept replica");
        while let Ok(req) = read_frame(&mut stream).await {
            assert_eq!(req.gpid.map(|g| g.partition_index), Some(target_index as i32));
            write_frame(
                &mut stream,
                &Frame {
                    seq_id: req.seq_id,
                    op_code: req.op_code,
                    is_response: true,
                    timeout_ms: 0,
                    error_code: ERR_OK,
                    trace_id: req.trace_id,
                    gpid: None,
                    body: Bytes::from_static(b"the-value"),
                },
            )
            .await;
        }
    });

    let client = Client::new(ClientOptions {
        meta_servers: vec![meta_ep],
        operation_timeout_ms: 2000,
        ..ClientOptions::default()
    })
    .expect("valid options");

    let body = client
        .execute(
            "test_table",
            OperationCode::RpcRrdbGet,
            Bytes::from_static(hash_key),
            Bytes::new(),
            Bytes::new(),
        )
        .await
        .expect("execute succeeds");

    assert_eq!(body, Bytes::from_static(b"the-value"));
    client.close().await;
}
