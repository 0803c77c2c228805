//! Runtime error type for `relay-gateway`.
//!
//! [`GatewayError`] covers failures that occur after configuration has been
//! validated: network errors, upstream decode failures, resolver setup.
//! Definition-time failures (schema extraction, registration) are
//! represented by [`relay_kernel::SchemaError`] and live in the kernel
//! crate.

use relay_kernel::ErrorObject;
use thiserror::Error;

/// Runtime error type for the gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// A backend URL could not be parsed or is missing a host.
    #[error("invalid backend url '{0}'")]
    InvalidUrl(String),

    /// The introspection fetch against a backend failed at the network level.
    #[error("introspection fetch from '{url}' failed: {source}")]
    Discovery {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A backend answered an introspection fetch with a non-success status.
    #[error("upstream '{url}' returned HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    /// A network-level error while forwarding a call to a backend.
    #[error("network error forwarding to '{url}': {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The system resolver configuration could not be loaded.
    #[error("resolver initialisation failed: {0}")]
    ResolverInit(String),

    /// JSON (de)serialisation error inside the gateway.
    #[error("serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A protocol-level error, framed for the client by the codec.
    #[error(transparent)]
    Rpc(#[from] ErrorObject),

    /// Generic internal error with a human-readable message.
    #[error("internal gateway error: {0}")]
    Internal(String),
}
