//! Typed service registration.
//!
//! A [`ServiceBuilder`] collects a service's methods, walking each method's
//! argument and reply types into schema records *before* anything is
//! installed — a failed walk rejects the whole service and leaves the
//! server untouched.  Handlers are stored as type-erased async dispatchers
//! that deserialize params, run the typed closure, and re-serialize the
//! reply.

use http::{HeaderMap, Method as HttpMethod, Uri};
use relay_kernel::rpc::ErrorObject;
use relay_kernel::schema::{is_exported, short_type_name, Method, Reflect, Service};
use relay_kernel::SchemaError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The HTTP-request view every method handler receives.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: HttpMethod,
    pub uri: Uri,
    pub headers: HeaderMap,
}

pub(crate) type MethodFuture =
    Pin<Box<dyn Future<Output = Result<Box<RawValue>, ErrorObject>> + Send>>;

/// Type-erased method handler: raw params in, raw result out.
pub(crate) type MethodDispatcher =
    Box<dyn Fn(Arc<RequestHead>, Option<Box<RawValue>>) -> MethodFuture + Send + Sync>;

/// Accumulates one service's schema and dispatch table.
///
/// The handler contract is enforced by the generic bounds on
/// [`method`](Self::method): handlers receive the request head and a
/// deserialized argument value, and return `Result<Reply, ErrorObject>`.
/// Both the argument and the reply type must implement [`Reflect`] so the
/// method is introspectable.
pub struct ServiceBuilder {
    pub(crate) schema: Service,
    pub(crate) handlers: HashMap<String, MethodDispatcher>,
}

impl std::fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("schema", &self.schema)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceBuilder {
    /// A service with an explicit name override.
    pub fn named(name: &str) -> Result<Self, SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::EmptyServiceName);
        }
        Ok(Self {
            schema: Service::new(name),
            handlers: HashMap::new(),
        })
    }

    /// A service named after the receiver type `T` (unqualified).
    ///
    /// Fails when the type name is not in exported form (first character
    /// uppercase) — such a name could never appear in a published schema.
    pub fn of<T: ?Sized>() -> Result<Self, SchemaError> {
        let name = short_type_name::<T>();
        if !is_exported(name) {
            return Err(SchemaError::NameNotExported(name.to_string()));
        }
        Self::named(name)
    }

    /// Register a method.
    ///
    /// The schema walk of `A` and `R` runs first; on failure nothing is
    /// recorded and the error names the offending type shape.
    pub fn method<A, R, F, Fut>(mut self, name: &str, handler: F) -> Result<Self, SchemaError>
    where
        A: Reflect + DeserializeOwned + Send + 'static,
        R: Reflect + Serialize + Send + 'static,
        F: Fn(Arc<RequestHead>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ErrorObject>> + Send + 'static,
    {
        if !is_exported(name) {
            return Err(SchemaError::MethodNotExported(name.to_string()));
        }
        if self.schema.methods.contains_key(name) {
            return Err(SchemaError::DuplicateMethod(name.to_string()));
        }

        let args = A::descriptor()?;
        let returns = R::descriptor()?;

        let handler = Arc::new(handler);
        let dispatcher: MethodDispatcher = Box::new(move |head, params| {
            let handler = handler.clone();
            Box::pin(async move {
                let raw = params
                    .ok_or_else(|| ErrorObject::invalid_request("request is missing params"))?;
                let args: A = serde_json::from_str(raw.get())
                    .map_err(|e| ErrorObject::invalid_params(e.to_string()))?;
                let reply = handler(head, args).await?;
                serde_json::value::to_raw_value(&reply)
                    .map_err(|e| ErrorObject::internal(e.to_string()))
            })
        });

        self.schema.methods.insert(
            name.to_string(),
            Method {
                name: name.to_string(),
                args,
                returns,
            },
        );
        self.handlers.insert(name.to_string(), dispatcher);
        Ok(self)
    }

    /// The service's name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}
