//! Tower adapter for caller-owned client stacks.
//!
//! Attaches the interception protocol to a client instance's middleware
//! chain: the outbound phase runs synchronously before the inner service is
//! called, the inbound phase on the resolved response. Inner service errors
//! pass through untouched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{Request, Response};
use tower::{Layer, Service};

use super::Interceptor;

/// Layer attaching trace-context interception to an HTTP client service.
#[derive(Clone)]
pub struct TraceContextLayer {
    interceptor: Arc<Interceptor>,
}

impl TraceContextLayer {
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self { interceptor }
    }
}

impl<S> Layer<S> for TraceContextLayer {
    type Service = TraceContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceContextService {
            inner,
            interceptor: self.interceptor.clone(),
        }
    }
}

/// Service wrapper applying the outbound/inbound phases around the inner
/// call.
#[derive(Clone)]
pub struct TraceContextService<S> {
    inner: S,
    interceptor: Arc<Interceptor>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceContextService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        // Injection completes before the inner future is even created.
        let target = request.uri().to_string();
        self.interceptor.outbound(&target, request.headers_mut());

        let interceptor = self.interceptor.clone();
        let future = self.inner.call(request);
        Box::pin(async move {
            let response = future.await?;
            interceptor.inbound(response.headers());
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::context::correlation::CorrelationStore;
    use crate::context::origin::{HostPattern, OriginPolicy};
    use crate::interceptor::{TRACEPARENT, X_CORRELATION_ID};

    /// Stub client service that reflects the request headers back in the
    /// response and returns a correlation identifier of its own.
    struct ReflectService;

    impl Service<Request<()>> for ReflectService {
        type Response = Response<()>;
        type Error = Infallible;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, request: Request<()>) -> Self::Future {
            Box::pin(async move {
                let mut builder = Response::builder()
                    .status(200)
                    .header(X_CORRELATION_ID, "reflected-id");
                for (name, value) in request.headers() {
                    builder = builder.header(format!("x-echo-{}", name), value.clone());
                }
                Ok(builder.body(()).unwrap())
            })
        }
    }

    fn interceptor(patterns: &[&str]) -> (Arc<CorrelationStore>, Arc<Interceptor>) {
        let store = Arc::new(CorrelationStore::in_memory());
        let policy = OriginPolicy::new(
            Url::parse("http://app.internal").unwrap(),
            patterns.iter().map(HostPattern::new).collect(),
        );
        let interceptor = Arc::new(Interceptor::new(store.clone(), policy, true));
        (store, interceptor)
    }

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_layer_injects_and_adopts() {
        let (store, interceptor) = interceptor(&[]);
        let service = TraceContextLayer::new(interceptor).layer(ReflectService);

        let response = service.oneshot(get("http://api.internal/users")).await.unwrap();

        let echoed = format!("x-echo-{}", TRACEPARENT);
        assert!(response.headers().contains_key(echoed.as_str()));
        // The reflected identifier replaced the generated one.
        assert_eq!(store.current().as_deref(), Some("reflected-id"));
    }

    #[tokio::test]
    async fn test_layer_respects_origin_policy() {
        let (_, interceptor) = interceptor(&["example.com"]);
        let service = TraceContextLayer::new(interceptor).layer(ReflectService);

        let response = service.oneshot(get("https://evil.com/exfil")).await.unwrap();

        let echoed = format!("x-echo-{}", TRACEPARENT);
        assert!(!response.headers().contains_key(echoed.as_str()));
    }
}
