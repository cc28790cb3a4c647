// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A typed network endpoint `(ipv4, port)`, stored numerically so it is
//! cheap to hash, compare, and hold as a `DashMap` key.

use std::{
    fmt,
    net::{Ipv4Addr, ToSocketAddrs},
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// A resolved `(ipv4, port)` pair. The all-zero value is the sentinel
/// "invalid" address and never compares equal to a real one other than
/// itself — callers check `is_invalid()` rather than relying on equality
/// with a constructed zero value from elsewhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    ipv4: u32,
    port: u16,
}

impl Endpoint {
    /// The sentinel "no address" value.
    pub const fn invalid() -> Self {
        Self { ipv4: 0, port: 0 }
    }

    pub const fn from_parts(ipv4: u32, port: u16) -> Self {
        Self { ipv4, port }
    }

    pub const fn ipv4(&self) -> u32 {
        self.ipv4
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn is_invalid(&self) -> bool {
        self.ipv4 == 0 && self.port == 0
    }

    /// Resolves `host:port` (or a bare dotted-quad) synchronously, once.
    /// The first IPv4 result wins, matching what the spec requires of
    /// address resolution in this crate (no async DNS machinery for a
    /// value type).
    pub fn parse(host: &str, port: u16) -> Result<Self> {
        if let Ok(addr) = host.parse::<Ipv4Addr>() {
            return Ok(Self::from_parts(u32::from(addr), port));
        }

        let lookup = format!("{host}:{port}");
        let resolved = lookup
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {lookup}"))?;
        for addr in resolved {
            if let std::net::SocketAddr::V4(v4) = addr {
                return Ok(Self::from_parts(u32::from(*v4.ip()), port));
            }
        }
        bail!("{host} resolved to no IPv4 address")
    }

    pub fn to_ipv4_addr(self) -> Ipv4Addr {
        Ipv4Addr::from(self.ipv4)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.to_ipv4_addr(), self.port)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({self})")
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .with_context(|| format!("endpoint '{s}' missing ':port'"))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("endpoint '{s}' has invalid port"))?;
        Self::parse(host, port)
    }
}
