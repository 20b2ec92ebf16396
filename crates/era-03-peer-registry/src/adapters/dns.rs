//! Resolvers for added nodes and seeds.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::ports::{ResolveError, Resolver};

/// Split `host` into a lookup string carrying an explicit port.
///
/// Accepts `ip`, `ip:port`, `[v6]:port`, bare `v6`, `name` and `name:port`.
pub fn with_default_port(host: &str, default_port: u16) -> String {
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => {
            host.to_string()
        }
        _ => format!("{host}:{default_port}"),
    }
}

/// System resolver via `tokio::net::lookup_host`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, default_port: u16) -> Result<Vec<SocketAddr>, ResolveError> {
        let target = with_default_port(host, default_port);
        let entries = tokio::net::lookup_host(target)
            .await
            .map_err(|e| ResolveError::Lookup {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::new();
        let addrs: Vec<SocketAddr> = entries.filter(|addr| seen.insert(*addr)).collect();
        if addrs.is_empty() {
            return Err(ResolveError::NotFound(host.to_string()));
        }
        Ok(addrs)
    }
}

/// Fixed name table. Literal addresses resolve without an entry.
#[derive(Debug, Default)]
pub struct StaticResolver {
    names: RwLock<HashMap<String, Vec<SocketAddr>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, addrs: Vec<SocketAddr>) {
        self.names.write().insert(name.into(), addrs);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, host: &str, default_port: u16) -> Result<Vec<SocketAddr>, ResolveError> {
        if let Some(addrs) = self.names.read().get(host) {
            return Ok(addrs.clone());
        }
        with_default_port(host, default_port)
            .parse::<SocketAddr>()
            .map(|addr| vec![addr])
            .map_err(|_| ResolveError::NotFound(host.to_string()))
    }
}
