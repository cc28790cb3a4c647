// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 5 (spec §8): `meta_servers = [m1, m2, m3]`. `m1` refuses the
//! connection, `m2` answers `ERR_FORWARD_TO_OTHERS` with a hint pointing
//! at `m3`, and `m3` answers `ERR_OK`. The next query should start at
//! `m3` directly.

use std::time::Duration;

use partkv_client_rs::{
    net::{Endpoint, Gpid, PartitionConfiguration},
    session::MetaSession,
    wire::{
        Frame, OperationCode,
        meta_codec::{QueryConfigResponse, encode_query_config_response},
        server_errors::{ERR_FORWARD_TO_OTHERS, ERR_OK},
    },
};
use tokio_util::sync::CancellationToken;

use super::common::{bind_loopback, read_frame, write_frame};

async fn serve_forward_hint(mut stream: tokio::net::TcpStream, hint: Endpoint) {
    if let Ok(req) = read_frame(&mut stream).await {
        let resp = QueryConfigResponse {
            err: ERR_FORWARD_TO_OTHERS,
            app_id: 0,
            partition_count: 0,
            configs: Vec::new(),
            forward_hint: Some(hint),
        };
        let body = encode_query_config_response(&resp);
        write_frame(
            &mut stream,
            &Frame {
                seq_id: req.seq_id,
                op_code: OperationCode::CmQueryConfig,
                is_response: true,
                timeout_ms: 0,
                error_code: ERR_FORWARD_TO_OTHERS,
                trace_id: req.trace_id,
                gpid: None,
                body,
            },
        )
        .await;
    }
}

async fn serve_ok(mut stream: tokio::net::TcpStream) {
    while let Ok(req) = read_frame(&mut stream).await {
        let resp = QueryConfigResponse {
            err: ERR_OK,
            app_id: 11,
            partition_count: 1,
            configs: vec![PartitionConfiguration {
                gpid: Gpid::new(11, 0),
                ballot: 1,
                primary: Endpoint::parse("10.0.0.1", 1).expect("parse"),
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
}

#[tokio::test]
async fn follows_the_forward_hint_and_sticks_to_the_new_leader() {
    // m1: bound then released, so connecting to it always refuses.
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let m1 = Endpoint::parse("127.0.0.1", std_listener.local_addr().expect("addr").port())
        .expect("parse");
    drop(std_listener);

    let (m2, m2_listener) = bind_loopback();
    let (m3, m3_listener) = bind_loopback();

    tokio::spawn(async move {
        let (stream, _) = m2_listener.accept().await.expect("accept m2");
        serve_forward_hint(stream, m3).await;
    });
    tokio::spawn(async move {
        let (stream, _) = m3_listener.accept().await.expect("accept m3");
        serve_ok(stream).await;
    });

    let cancel = CancellationToken::new();
    let meta = MetaSession::new(
        &[m1, m2, m3],
        Duration::from_millis(150),
        Duration::from_millis(100),
        Duration::from_millis(500),
        100,
        Duration::from_millis(300),
        10,
        cancel.clone(),
        &tokio::runtime::Handle::current(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let first = meta.query_config("orders", deadline).await.expect("resolves via m3");
    assert_eq!(first.app_id, 11);

    // A second query should start directly at m3 (no m1/m2 detour).
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let second = meta.query_config("orders", deadline).await.expect("still resolves via m3");
    assert_eq!(second.app_id, 11);

    meta.close().await;
    cancel.cancel();
}
