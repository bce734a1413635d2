use std::sync::Arc;

use sprpc_common::protocol::error::Result;
use sprpc_common::protocol::{MethodCall, Schema};

use crate::client::XmlRpcClient;

type BuildFn<A> = dyn Fn(A) -> MethodCall + Send + Sync;

/// A method call paired with the schema for its result.
///
/// Produced by [`BoundMethod::build`] and consumed by
/// [`XmlRpcClient::multicall`].
pub struct TypedMethodCall<R> {
    pub call: MethodCall,
    pub schema: Schema<R>,
}

impl<R> Clone for TypedMethodCall<R> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
            schema: self.schema.clone(),
        }
    }
}

impl<R> std::fmt::Debug for TypedMethodCall<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedMethodCall")
            .field("call", &self.call)
            .finish_non_exhaustive()
    }
}

/// A reusable typed method: arguments `A` in, a decoded `R` out.
///
/// Multi-argument methods take their arguments as a tuple.
pub struct BoundMethod<A, R> {
    client: XmlRpcClient,
    build: Arc<BuildFn<A>>,
    schema: Schema<R>,
}

impl<A, R> Clone for BoundMethod<A, R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            build: Arc::clone(&self.build),
            schema: self.schema.clone(),
        }
    }
}

impl<A, R: 'static> BoundMethod<A, R> {
    pub(crate) fn new(client: XmlRpcClient, build: Arc<BuildFn<A>>, schema: Schema<R>) -> Self {
        Self {
            client,
            build,
            schema,
        }
    }

    /// Round-trips the call immediately and decodes its result.
    pub async fn call(&self, args: A) -> Result<R> {
        let call = (self.build)(args);
        let value = self.client.call(&call).await?;
        self.schema.decode(&value)
    }

    /// Builds the call without sending it, for batching.
    pub fn build(&self, args: A) -> TypedMethodCall<R> {
        TypedMethodCall {
            call: (self.build)(args),
            schema: self.schema.clone(),
        }
    }
}
