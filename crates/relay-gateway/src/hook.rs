//! Request hook contract.
//!
//! A hook is invoked once per routed request, just before the gateway
//! forwards it.  Through the [`RpcContext`] it can inspect the method and
//! arguments, rewrite either, or answer the client itself — the gateway
//! discriminates on the context's latched responded flag after the hook
//! returns, never on a return value, so "hook responded" is ordinary data
//! flow rather than control flow.

use crate::context::RpcContext;
use async_trait::async_trait;

/// User-supplied per-request interposition point.
///
/// Implementations must be `Send + Sync`: the gateway shares one hook
/// instance across all request tasks.  The context must not be retained
/// past the call.
#[async_trait]
pub trait RequestHook: Send + Sync {
    async fn on_request(&self, ctx: &mut RpcContext);
}

/// Plain synchronous closures are hooks too.
#[async_trait]
impl<F> RequestHook for F
where
    F: Fn(&mut RpcContext) + Send + Sync,
{
    async fn on_request(&self, ctx: &mut RpcContext) {
        self(ctx)
    }
}
