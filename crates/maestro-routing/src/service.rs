use async_trait::async_trait;
use maestro_core::{ChatRequest, ChatResponse, MaestroResult};

/// Callback receiving partial content chunks from a streaming dispatch.
pub type StreamChunkHandler<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// The contract a backend service must satisfy to be routable.
///
/// Concrete vendor adapters (HTTP request/response mapping, streaming byte
/// parsing) live outside this library; the router only consumes this
/// capability surface.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Registry name of the service.
    fn name(&self) -> &str;

    /// Vendor label (informational).
    fn vendor(&self) -> &str;

    /// The largest request, in estimated tokens, this service accepts.
    fn max_token_limit(&self) -> usize;

    /// Whether the service cannot be used without an API key.
    fn requires_api_key(&self) -> bool;

    /// Whether an API key is configured.
    fn has_api_key(&self) -> bool;

    /// Dispatches a request and returns the complete response.
    async fn send_request(&self, request: &ChatRequest) -> MaestroResult<ChatResponse>;

    /// Dispatches a request, invoking `on_chunk` for each partial content
    /// chunk, and returns the aggregated response.
    async fn send_streaming_request(
        &self,
        request: &ChatRequest,
        on_chunk: StreamChunkHandler<'_>,
    ) -> MaestroResult<ChatResponse>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use maestro_core::MaestroError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A scriptable in-memory service for unit tests.
    pub(crate) struct StubService {
        pub(crate) name: String,
        pub(crate) vendor: String,
        pub(crate) max_tokens: usize,
        pub(crate) requires_key: bool,
        pub(crate) key_present: bool,
        pub(crate) fail: bool,
        pub(crate) calls: AtomicU32,
    }

    impl StubService {
        pub(crate) fn ok(name: &str, max_tokens: usize) -> Self {
            Self {
                name: name.to_string(),
                vendor: "stub".to_string(),
                max_tokens,
                requires_key: false,
                key_present: false,
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn failing(name: &str, max_tokens: usize) -> Self {
            Self {
                fail: true,
                ..Self::ok(name, max_tokens)
            }
        }

        pub(crate) fn keyed(name: &str, max_tokens: usize, key_present: bool) -> Self {
            Self {
                requires_key: true,
                key_present,
                ..Self::ok(name, max_tokens)
            }
        }

        pub(crate) fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelService for StubService {
        fn name(&self) -> &str {
            &self.name
        }

        fn vendor(&self) -> &str {
            &self.vendor
        }

        fn max_token_limit(&self) -> usize {
            self.max_tokens
        }

        fn requires_api_key(&self) -> bool {
            self.requires_key
        }

        fn has_api_key(&self) -> bool {
            self.key_present
        }

        async fn send_request(&self, _request: &ChatRequest) -> MaestroResult<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MaestroError::Routing(format!("{} unavailable", self.name)))
            } else {
                Ok(ChatResponse::new(format!("ok:{}", self.name)))
            }
        }

        async fn send_streaming_request(
            &self,
            request: &ChatRequest,
            on_chunk: StreamChunkHandler<'_>,
        ) -> MaestroResult<ChatResponse> {
            let response = self.send_request(request).await?;
            on_chunk(&response.content);
            Ok(response)
        }
    }
}
