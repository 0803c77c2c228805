//! Per-call backend host resolution.
//!
//! Backends are registered under symbolic hosts.  [`SrvResolver`] attempts
//! an SRV lookup first so deployments with service discovery get per-call
//! load balancing; when SRV yields nothing the original host is returned
//! untouched and ordinary DNS happens at the HTTP layer.  The registry is
//! never mutated by resolution — every call re-resolves.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use crate::error::GatewayError;

/// Resolves a symbolic host (`host` or `host:port`) to the concrete
/// authority a single call should target.
///
/// The boolean reports whether an SRV answer (fresh or cached) was used.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> (String, bool);
}

#[async_trait]
impl<T: TargetResolver + ?Sized> TargetResolver for std::sync::Arc<T> {
    async fn resolve(&self, host: &str) -> (String, bool) {
        (**self).resolve(host).await
    }
}

/// "Last successful answer" cache.
///
/// Entries are overwritten on every successful lookup and never expire: a
/// transient SRV failure after an initial success keeps serving the stale
/// answer until the next success replaces it.  There is deliberately no TTL
/// — the refresh cycle re-resolves every backend anyway.
#[derive(Debug, Default)]
pub struct LastGoodCache {
    entries: RwLock<HashMap<String, String>>,
}

impl LastGoodCache {
    pub fn store(&self, host: &str, target: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string(), target.to_string());
    }

    pub fn get(&self, host: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }
}

/// SRV-first resolver backed by the system DNS configuration.
///
/// Hosts that already carry an explicit port skip the SRV attempt — an SRV
/// answer would have nothing to contribute, the port is fixed.  Among the
/// answered records the minimum-priority group is selected and calls
/// round-robin across it, so repeated resolutions of the same name spread
/// over the instances behind it.
pub struct SrvResolver {
    resolver: TokioAsyncResolver,
    cache: LastGoodCache,
    cursor: AtomicUsize,
}

impl SrvResolver {
    /// Build a resolver from `/etc/resolv.conf` (or the platform
    /// equivalent).
    pub fn from_system_conf() -> Result<Self, GatewayError> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| GatewayError::ResolverInit(e.to_string()))?;
        Ok(Self {
            resolver,
            cache: LastGoodCache::default(),
            cursor: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TargetResolver for SrvResolver {
    async fn resolve(&self, host: &str) -> (String, bool) {
        if host.contains(':') {
            return (host.to_string(), false);
        }

        match self.resolver.srv_lookup(host).await {
            Ok(lookup) => {
                let records: Vec<_> = lookup.iter().collect();
                let Some(min_priority) = records.iter().map(|r| r.priority()).min() else {
                    return self.fallback(host);
                };
                let group: Vec<_> = records
                    .iter()
                    .filter(|r| r.priority() == min_priority)
                    .collect();
                let pick = self.cursor.fetch_add(1, Ordering::Relaxed) % group.len();
                let record = group[pick];
                let target = format!(
                    "{}:{}",
                    record.target().to_utf8().trim_end_matches('.'),
                    record.port()
                );
                debug!(host = %host, target = %target, "srv resolved");
                self.cache.store(host, &target);
                (target, true)
            }
            Err(_) => self.fallback(host),
        }
    }
}

impl SrvResolver {
    fn fallback(&self, host: &str) -> (String, bool) {
        match self.cache.get(host) {
            Some(cached) => {
                debug!(host = %host, target = %cached, "srv lookup failed, using last answer");
                (cached, true)
            }
            None => (host.to_string(), false),
        }
    }
}

/// Resolver that never rewrites hosts.
///
/// Used when the system resolver configuration cannot be loaded, and by
/// tests that want fully deterministic routing.
pub struct PassthroughResolver;

#[async_trait]
impl TargetResolver for PassthroughResolver {
    async fn resolve(&self, host: &str) -> (String, bool) {
        (host.to_string(), false)
    }
}
