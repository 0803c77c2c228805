//! The gateway's view of discovered backend services.
//!
//! A [`ServiceRegistry`] maps service names to [`RegistryEntry`]s under a
//! readers-writer lock.  Writers (discovery, refresh) replace entries
//! atomically per key; readers doing per-request routing take the shared
//! lock only long enough to clone out the `Arc`'d service snapshot, so no
//! lock is ever held across an await point.  The mapping is never shrunk
//! during normal operation.

use relay_kernel::schema::{Method, Service};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// One discovered backend service.
///
/// `service` is an immutable snapshot: readers that cloned the `Arc` out of
/// the registry may keep using it after the entry has been overwritten by a
/// refresh.  `original_url` is the URL exactly as configured, retained so a
/// refresh can redo the whole discovery including SRV resolution;
/// `via_srv` records whether the host resolved through an SRV record at
/// registration time.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub service: Arc<Service>,
    pub url: Url,
    pub original_url: String,
    pub via_srv: bool,
}

/// A successful route lookup: the entry plus the matched method record.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub entry: RegistryEntry,
    pub method: Method,
}

/// Why a method string failed to route.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The method string does not contain a `.` separator.
    #[error("service/method request ill-formed: {0:?}")]
    IllFormed(String),
    /// No service is registered under the prefix.
    #[error("no remote service for {0:?}")]
    UnknownService(String),
    /// The service exists but does not expose the method.
    #[error("remote service cannot handle method {0:?}")]
    UnknownMethod(String),
}

/// Concurrent map of service name → [`RegistryEntry`].
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every service under its name, overwriting same-named entries.
    ///
    /// The write lock is taken once for the whole batch, so readers observe
    /// either none or all of an introspection fetch.
    pub fn insert_all(
        &self,
        services: Vec<Service>,
        url: &Url,
        original_url: &str,
        via_srv: bool,
    ) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for service in services {
            let name = service.name.clone();
            entries.insert(
                name,
                RegistryEntry {
                    service: Arc::new(service),
                    url: url.clone(),
                    original_url: original_url.to_string(),
                    via_srv,
                },
            );
        }
    }

    /// Resolve a wire method string (`"Service.Method"`, split on the first
    /// `.`) to its registry entry and method record.
    pub fn lookup(&self, method_str: &str) -> Result<RouteTarget, LookupError> {
        let mut parts = method_str.splitn(2, '.');
        let (service_name, method_name) = match (parts.next(), parts.next()) {
            (Some(s), Some(m)) => (s, m),
            _ => return Err(LookupError::IllFormed(method_str.to_string())),
        };

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(service_name)
            .ok_or_else(|| LookupError::UnknownService(method_str.to_string()))?;
        let method = entry
            .service
            .methods
            .get(method_name)
            .ok_or_else(|| LookupError::UnknownMethod(method_str.to_string()))?;
        Ok(RouteTarget {
            entry: entry.clone(),
            method: method.clone(),
        })
    }

    /// Snapshot of the distinct original URLs, for the periodic refresh.
    pub fn original_urls(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        entries
            .values()
            .filter(|e| seen.insert(e.original_url.clone()))
            .map(|e| e.original_url.clone())
            .collect()
    }

    /// Names of all registered services.
    pub fn service_names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
