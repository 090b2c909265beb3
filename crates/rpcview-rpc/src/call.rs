//! Call objects returned by client contract methods.
//!
//! Each call object owns its own request/response channels; the client that
//! created it is only borrowed for the duration of the method that starts it.

use std::future::{Future, IntoFuture};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::{Metadata, Status};

// ============================================================================
// Call Options
// ============================================================================

/// Per-call options: ambient metadata and the cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    metadata: Metadata,
    cancellation: CancellationToken,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

// ============================================================================
// Outbound request stream
// ============================================================================

/// Outbound half of a client- or duplex-streaming call.
///
/// Writes are strictly ordered; `complete` half-closes the stream and any
/// later write fails.
#[async_trait]
pub trait RequestSink<T: Send + 'static>: Send {
    /// Send one request element.
    async fn write(&mut self, message: T) -> Result<(), Status>;

    /// Signal that no more elements will be written.
    async fn complete(&mut self) -> Result<(), Status>;
}

pub type BoxRequestSink<T> = Box<dyn RequestSink<T>>;

/// Inbound half of a server- or duplex-streaming call.
pub type ResponseStream<T> = BoxStream<'static, Result<T, Status>>;

// ============================================================================
// Call shapes
// ============================================================================

/// Single request, single response.
pub struct UnaryCall<Resp> {
    response: BoxFuture<'static, Result<Resp, Status>>,
}

impl<Resp: Send + 'static> UnaryCall<Resp> {
    pub fn new<F>(response: F) -> Self
    where
        F: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            response: response.boxed(),
        }
    }

    /// A call that completes immediately with `response`.
    pub fn ready(response: Resp) -> Self {
        Self::new(futures::future::ready(Ok(response)))
    }

    /// A call that fails immediately with `status`.
    pub fn failed(status: Status) -> Self {
        Self::new(futures::future::ready(Err(status)))
    }
}

impl<Resp> IntoFuture for UnaryCall<Resp> {
    type Output = Result<Resp, Status>;
    type IntoFuture = BoxFuture<'static, Result<Resp, Status>>;

    fn into_future(self) -> Self::IntoFuture {
        self.response
    }
}

/// Streamed requests, single response.
pub struct ClientStreamingCall<Req, Resp> {
    request_stream: BoxRequestSink<Req>,
    response: BoxFuture<'static, Result<Resp, Status>>,
}

impl<Req: Send + 'static, Resp: Send + 'static> ClientStreamingCall<Req, Resp> {
    pub fn new<F>(request_stream: BoxRequestSink<Req>, response: F) -> Self
    where
        F: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            request_stream,
            response: response.boxed(),
        }
    }

    pub fn into_parts(self) -> (BoxRequestSink<Req>, BoxFuture<'static, Result<Resp, Status>>) {
        (self.request_stream, self.response)
    }
}

/// Single request, streamed responses.
pub struct ServerStreamingCall<Resp> {
    response_stream: ResponseStream<Resp>,
}

impl<Resp: Send + 'static> ServerStreamingCall<Resp> {
    pub fn new<S>(response_stream: S) -> Self
    where
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            response_stream: Box::pin(response_stream),
        }
    }

    /// A call whose response stream yields `items` and then ends.
    pub fn from_items(items: Vec<Resp>) -> Self {
        Self::new(futures::stream::iter(items.into_iter().map(Ok)))
    }

    pub fn into_stream(self) -> ResponseStream<Resp> {
        self.response_stream
    }
}

/// Streamed requests, streamed responses.
pub struct DuplexStreamingCall<Req, Resp> {
    request_stream: BoxRequestSink<Req>,
    response_stream: ResponseStream<Resp>,
}

impl<Req: Send + 'static, Resp: Send + 'static> DuplexStreamingCall<Req, Resp> {
    pub fn new<S>(request_stream: BoxRequestSink<Req>, response_stream: S) -> Self
    where
        S: Stream<Item = Result<Resp, Status>> + Send + 'static,
    {
        Self {
            request_stream,
            response_stream: Box::pin(response_stream),
        }
    }

    pub fn into_parts(self) -> (BoxRequestSink<Req>, ResponseStream<Resp>) {
        (self.request_stream, self.response_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_unary_ready_and_failed() {
        assert_eq!(UnaryCall::ready(7u32).await, Ok(7));
        let err = UnaryCall::<u32>::failed(Status::internal("boom")).await.unwrap_err();
        assert_eq!(err.message(), "boom");
    }

    #[tokio::test]
    async fn test_server_streaming_from_items() {
        let call = ServerStreamingCall::from_items(vec!["a", "b"]);
        let items: Vec<_> = call.into_stream().collect().await;
        assert_eq!(items, vec![Ok("a"), Ok("b")]);
    }

    #[test]
    fn test_call_options_carry_metadata() {
        let token = CancellationToken::new();
        let options = CallOptions::new()
            .with_metadata(Metadata::new().with("testkey", "testvalue"))
            .with_cancellation(token.clone());
        assert_eq!(options.metadata().get("testkey"), Some("testvalue"));
        token.cancel();
        assert!(options.cancellation().is_cancelled());
    }
}
