// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Scenario 6 (spec §8): two concurrent requests to the same replica get
//! answered out of order by the server; each caller's future still
//! resolves with its own correct payload, correlated by sequence id
//! rather than send order.

use std::time::Duration;

use bytes::Bytes;
use partkv_client_rs::{session::Session, wire::{Frame, OperationCode}};
use tokio_util::sync::CancellationToken;

use super::common::{bind_loopback, read_frame, write_frame};

#[tokio::test]
async fn out_of_order_responses_still_land_on_the_right_future() {
    let (endpoint, listener) = bind_loopback();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let first_req = read_frame(&mut stream).await.expect("first request");
        let second_req = read_frame(&mut stream).await.expect("second request");

        // Answer in reverse of arrival order: a server is free to reorder.
        for req in [second_req, first_req] {
            write_frame(
                &mut stream,
                &Frame {
                    seq_id: req.seq_id,
                    op_code: req.op_code,
                    is_response: true,
                    timeout_ms: 0,
                    error_code: 0,
                    trace_id: req.trace_id,
                    gpid: None,
                    body: req.body,
                },
            )
            .await;
        }
    });

    let cancel = CancellationToken::new();
    let session = Session::spawn(
        endpoint,
        false,
        Duration::from_millis(500),
        Duration::from_millis(200),
        Duration::from_secs(2),
        100,
        cancel.clone(),
        &tokio::runtime::Handle::current(),
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let (first, second) = tokio::join!(
        session.send(OperationCode::RpcRrdbGet, Bytes::from_static(b"first"), None, deadline),
        session.send(OperationCode::RpcRrdbGet, Bytes::from_static(b"second"), None, deadline),
    );

    assert_eq!(first.expect("first completes").body, Bytes::from_static(b"first"));
    assert_eq!(second.expect("second completes").body, Bytes::from_static(b"second"));

    cancel.cancel();
}
