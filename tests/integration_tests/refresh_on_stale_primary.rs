// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 2 (spec §8): the first send against a stale primary fails
//! with `ERR_INVALID_STATE`; the resulting refresh hands back a new
//! primary with a higher ballot, and the retried send lands there.

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use bytes::Bytes;
use partkv_client_rs::{
    Client, ClientOptions,
    net::{Gpid, PartitionConfiguration},
    wire::{
        Frame, OperationCode,
        meta_codec::{QueryConfigResponse, encode_query_config_response},
        server_errors::{ERR_INVALID_STATE, ERR_OK},
    },
};

use super::common::{bind_loopback, read_frame, write_frame};

#[tokio::test]
async fn refreshes_to_the_new_primary_after_invalid_state() {
    let (replica1_ep, replica1_listener) = bind_loopback();
    let (replica2_ep, replica2_listener) = bind_loopback();
    let (meta_ep, meta_listener) = bind_loopback();

    let meta_calls = Arc::new(AtomicU32::new(0));
    let meta_calls_task = meta_calls.clone();

    tokio::spawn(async move {
        let (mut stream, _) = meta_listener.accept().await.expect("accept meta");
        while let Ok(req) = read_frame(&mut stream).await {
            let call = meta_calls_task.fetch_add(1, Ordering::SeqCst);
            let (primary, ballot) = if call == 0 { (replica1_ep, 1) } else { (replica2_ep, 2) };
            let resp = QueryConfigResponse {
                err: ERR_OK,
                app_id: 9,
                partition_count: 1,
                configs: vec![PartitionConfiguration {
                    gpid: Gpid::new(9, 0),
                    ballot,
                    primary,
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

    // The stale primary answers the first (and only) request it ever
    // sees with ERR_INVALID_STATE.
    tokio::spawn(async move {
        let (mut stream, _) = replica1_listener.accept().await.expect("accept replica1");
        if let Ok(req) = read_frame(&mut stream).await {
            write_frame(
                &mut stream,
                &Frame {
                    seq_id: req.seq_id,
                    op_code: req.op_code,
                    is_response: true,
                    timeout_ms: 0,
                    error_code: ERR_INVALID_STATE,
                    trace_id: req.trace_id,
                    gpid: None,
                    body: Bytes::new(),
                },
            )
            .await;
        }
    });

    tokio::spawn(async move {
        let (mut stream, _) = replica2_listener.accept().await.expect("accept replica2");
        while let Ok(req) = read_frame(&mut stream).await {
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
                    body: Bytes::from_static(b"from-new-primary"),
                },
            )
            .await;
        }
    });

    let client = Client::new(ClientOptions {
        meta_servers: vec![meta_ep],
        operation_timeout_ms: 900,
        min_refresh_interval_ms: 0,
        ..ClientOptions::default()
    })
    .expect("valid options");

    let started = tokio::time::Instant::now();
    let body = client
        .execute(
            "stale_table",
            OperationCode::RpcRrdbGet,
            Bytes::from_static(b"any-key"),
            Bytes::new(),
            Bytes::new(),
        )
        .await
        .expect("execute eventually succeeds against the refreshed primary");

    assert_eq!(body, Bytes::from_static(b"from-new-primary"));
    assert!(started.elapsed() < std::time::Duration::from_millis(3000));
    assert!(meta_calls.load(Ordering::SeqCst) >= 2, "expected an open + a refresh query");
    client.close().await;
}
