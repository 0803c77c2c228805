//! Definition-time errors for the relay kernel.
//!
//! [`SchemaError`] covers every failure mode that can be detected while a
//! service is being *described* — unsupported types, unexported names,
//! duplicate methods — before any network I/O occurs.  Runtime failures
//! (connection refused, upstream decode, …) belong in the gateway crate.

use thiserror::Error;

/// Registration / schema-extraction error type.
///
/// Extraction is total: any variant here fails the registration as a whole.
/// A service is never left half-described.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    /// A map type uses a key type other than `string`.
    #[error("unsupported map key type '{0}': map keys must be strings")]
    UnsupportedMapKey(&'static str),

    /// A service name override was empty.
    #[error("service name cannot be empty")]
    EmptyServiceName,

    /// The service's type name does not start with an uppercase letter.
    #[error("service type name '{0}' is not exported")]
    NameNotExported(String),

    /// A method name does not start with an uppercase letter.
    #[error("method name '{0}' is not exported")]
    MethodNotExported(String),

    /// A method with this name has already been registered on the service.
    #[error("method '{0}' is already registered")]
    DuplicateMethod(String),
}
