//! Ordered interceptors wrapped around method invocation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Identifies the method an invocation targets, passed to every
/// middleware layer so generic interceptors (timing, logging, retry) can
/// be written without per-method codegen hooks.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// The service this method belongs to.
    pub service: String,
    /// The method name.
    pub method: String,
}

/// A boxed, type-erased async invoker: given a method descriptor and the
/// serialized positional arguments, produces the serialized result.
pub type Invoker = Arc<
    dyn Fn(MethodDescriptor, Bytes) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send>>
        + Send
        + Sync,
>;

/// A single interceptor: receives the next invoker in the chain and
/// returns a new invoker that wraps it.
pub trait Middleware: Send + Sync {
    /// Wrap `next`, returning a new invoker.
    fn wrap(&self, next: Invoker) -> Invoker;
}

impl<F> Middleware for F
where
    F: Fn(Invoker) -> Invoker + Send + Sync,
{
    fn wrap(&self, next: Invoker) -> Invoker {
        self(next)
    }
}

/// An ordered list of interceptors, composed right-fold: the innermost
/// invoker calls the handler, and each outer layer may observe args,
/// await the result, and transform it.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// An empty chain: `compose` returns `handler` unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a layer. Layers added first are outermost.
    #[must_use]
    pub fn with(mut self, layer: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    /// Compose the chain around `handler`, outermost layer first.
    #[must_use]
    pub fn compose(&self, handler: Invoker) -> Invoker {
        self.layers
            .iter()
            .rev()
            .fold(handler, |next, layer| layer.wrap(next))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn identity_handler() -> Invoker {
        Arc::new(|_desc, args| Box::pin(async move { Ok(args) }))
    }

    #[tokio::test]
    async fn empty_chain_calls_handler_directly() {
        let chain = MiddlewareChain::new();
        let invoker = chain.compose(identity_handler());
        let desc = MethodDescriptor {
            service: "Demo".to_string(),
            method: "ping".to_string(),
        };
        let result = invoker(desc, Bytes::from_static(b"args")).await.unwrap();
        assert_eq!(&result[..], b"args");
    }

    #[tokio::test]
    async fn layers_run_outermost_first_and_wrap_the_handler() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let make_layer = |name: &'static str, order: Arc<std::sync::Mutex<Vec<&'static str>>>| {
            move |next: Invoker| -> Invoker {
                let order = order.clone();
                Arc::new(move |desc: MethodDescriptor, args: Bytes| {
                    order.lock().unwrap().push(name);
                    let next = next.clone();
                    Box::pin(async move { next(desc, args).await })
                })
            }
        };

        let chain = MiddlewareChain::new()
            .with(make_layer("outer", order.clone()))
            .with(make_layer("inner", order.clone()));

        let invoker = chain.compose(identity_handler());
        let desc = MethodDescriptor {
            service: "Demo".to_string(),
            method: "ping".to_string(),
        };
        invoker(desc, Bytes::new()).await.unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn a_layer_can_short_circuit_without_calling_next() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let short_circuit = move |_next: Invoker| -> Invoker {
            let calls = calls_clone.clone();
            Arc::new(move |_desc, _args| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok(Bytes::from_static(b"short-circuited")) })
            })
        };

        let chain = MiddlewareChain::new().with(short_circuit);
        let invoker = chain.compose(identity_handler());
        let desc = MethodDescriptor {
            service: "Demo".to_string(),
            method: "ping".to_string(),
        };
        let result = invoker(desc, Bytes::from_static(b"args")).await.unwrap();
        assert_eq!(&result[..], b"short-circuited");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
