// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal exercise of the client core: opens a table against a meta
//! cluster and issues a single `GET`, printing whatever bytes come back.
//! Request/response bodies are opaque to this crate (§1 "Out of scope"),
//! so this demo sends an empty body and prints the raw reply — a real
//! table API layered on top of `Client` would encode and decode these
//! per operation kind. A CLI front-end is itself out of scope (§1), so
//! arguments are read positionally rather than through a flag parser.

use std::{env, process::ExitCode};

use bytes::Bytes;
use partkv_client_rs::{cfg::ClientOptions, client::Client, net::Endpoint, wire::opcode::OperationCode};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!(
        "usage: kvdemo <meta1:port[,meta2:port,...]> <table> <hash_key> [sort_key]"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logging setup is the host application's job, not the crate's (§1
    // "Out of scope") — this demo is that host, so it installs its own
    // subscriber rather than reaching for a crate-provided one.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let meta_servers_arg = args.next().unwrap_or_else(|| usage());
    let table = args.next().unwrap_or_else(|| usage());
    let hash_key = args.next().unwrap_or_else(|| usage());
    let sort_key = args.next().unwrap_or_default();

    let meta_servers: Result<Vec<Endpoint>, _> =
        meta_servers_arg.split(',').map(str::parse).collect();
    let meta_servers = match meta_servers {
        Ok(v) if !v.is_empty() => v,
        Ok(_) => {
            error!("at least one meta server endpoint is required");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "failed to parse meta server list");
            return ExitCode::FAILURE;
        }
    };

    let opts = ClientOptions {
        meta_servers,
        ..ClientOptions::default()
    };

    let client = match Client::new(opts) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to construct client");
            return ExitCode::FAILURE;
        }
    };

    let result = client
        .execute(
            &table,
            OperationCode::RpcRrdbGet,
            Bytes::from(hash_key.into_bytes()),
            Bytes::from(sort_key.into_bytes()),
            Bytes::new(),
        )
        .await;

    client.close().await;

    match result {
        Ok(body) => {
            info!(len = body.len(), "get succeeded");
            println!("{body:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "get failed");
            ExitCode::FAILURE
        }
    }
}
