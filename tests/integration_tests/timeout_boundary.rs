// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 3 (spec §8): `operation_timeout_ms = 100`, the replica never
//! answers. The caller gets `Timeout` at roughly t≈100ms and the client
//! does not retry past its own deadline.

use bytes::Bytes;
use partkv_client_rs::{
    Client, ClientOptions, ErrorKind,
    net::Gpid,
    wire::{
        Frame, OperationCode,
        meta_codec::{QueryConfigResponse, encode_query_config_response},
        server_errors::ERR_OK,
    },
};

use super::common::{bind_loopback, read_frame, write_frame};

#[tokio::test]
async fn silent_replica_yields_timeout_at_the_deadline() {
    let (replica_ep, replica_listener) = bind_loopback();
    let (meta_ep, meta_listener) = bind_loopback();

    tokio::spawn(async move {
        let (mut stream, _) = meta_listener.accept().await.expect("accept meta");
        while let Ok(req) = read_frame(&mut stream).await {
            let resp = QueryConfigResponse {
                err: ERR_OK,
                app_id: 3,
                partition_count: 1,
                configs: vec![partkv_client_rs::net::PartitionConfiguration {
                    gpid: Gpid::new(3, 0),
                    ballot: 1,
                    primary: replica_ep,
                    secondaries: Vec::new(),
                    max_replica_count: 3,
                }],
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

    // Accept the connection and read the request, but never reply.
    tokio::spawn(async move {
        let (mut stream, _) = replica_listener.accept().await.expect("accept replica");
        let _ = read_frame(&mut stream).await;
        std::future::pending::<()>().await;
    });

    let client = Client::new(ClientOptions {
        meta_servers: vec![meta_ep],
        operation_timeout_ms: 100,
        ..ClientOptions::default()
    })
    .expect("valid options");

    let started = tokio::time::Instant::now();
    let err = client
        .execute(
            "silent_table",
            OperationCode::RpcRrdbGet,
            Bytes::from_static(b"k"),
            Bytes::new(),
            Bytes::new(),
        )
        .await
        .expect_err("silent replica must time out");

    let elapsed = started.elapsed();
    assert_eq!(*err.kind(), ErrorKind::Timeout);
    assert!(elapsed >= std::time::Duration::from_millis(90), "elapsed={elapsed:?}");
    assert!(elapsed < std::time::Duration::from_millis(1000), "elapsed={elapsed:?}");
    client.close().await;
}
