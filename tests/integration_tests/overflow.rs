// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 4 (spec §8): 101 requests enqueued on a session that cannot
//! connect yet, with the default buffer of 100. The 101st completes
//! synchronously with `Overflow`; the first 100 complete normally once
//! the session connects.

use std::time::Duration;

use bytes::Bytes;
use partkv_client_rs::{
    net::Endpoint,
    session::{Session, SessionFailure},
    wire::{Frame, OperationCode, server_errors::ERR_OK},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::common::{read_frame, write_frame};

#[tokio::test]
async fn the_101st_send_overflows_and_the_first_100_drain_on_connect() {
    // Bind a port, then release it immediately: every connect attempt
    // against it refuses until we rebind below, keeping the session
    // `Disconnected` for as long as we need to fill its send buffer.
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = std_listener.local_addr().expect("local_addr").port();
    drop(std_listener);
    let endpoint = Endpoint::parse("127.0.0.1", port).expect("parse loopback");

    let cancel = CancellationToken::new();
    let session = Session::spawn(
        endpoint,
        false,
        Duration::from_millis(200),
        Duration::from_millis(300),
        Duration::from_secs(5),
        100,
        cancel.clone(),
        &tokio::runtime::Handle::current(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut handles = Vec::with_capacity(100);
    for _ in 0..100 {
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            session
                .send(OperationCode::RpcRrdbGet, Bytes::new(), None, deadline)
                .await
        }));
    }
    // Let every spawned send reach its suspension point (queued, awaiting
    // completion) before probing the buffer with one more.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let overflowed = session
        .send(OperationCode::RpcRrdbGet, Bytes::new(), None, deadline)
        .await;
    assert_eq!(overflowed, Err(SessionFailure::Overflow));

    // Now let the session actually connect and drain its backlog.
    let std_listener = std::net::TcpListener::bind(("127.0.0.1", port)).expect("rebind");
    std_listener.set_nonblocking(true).expect("nonblocking");
    let listener = TcpListener::from_std(std_listener).expect("tokio listener");
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
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
                    body: Bytes::from_static(b"drained"),
                },
            )
            .await;
        }
    });

    for handle in handles {
        let outcome = handle.await.expect("task did not panic");
        assert_eq!(outcome.expect("queued send completes").body, Bytes::from_static(b"drained"));
    }

    cancel.cancel();
}
