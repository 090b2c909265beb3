//! In-process call objects backed by async handlers.
//!
//! A loopback handler plays the service side of a call: it receives the
//! request (or request stream), the caller's metadata and cancellation, and
//! produces the response (or writes a response stream). Handlers for
//! streaming shapes run as their own tokio task, so these constructors must be
//! called from within a runtime.
//!
//! Every handler is raced against the call's cancellation token; a cancelled
//! call reports [`Code::Cancelled`](crate::Code::Cancelled).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    CallOptions, ClientStreamingCall, DuplexStreamingCall, Metadata, RequestSink,
    ServerStreamingCall, Status, UnaryCall,
};

// ============================================================================
// Service-side handles
// ============================================================================

/// What a loopback handler sees of the caller.
#[derive(Debug, Clone)]
pub struct ServerContext {
    metadata: Metadata,
    cancellation: CancellationToken,
}

impl ServerContext {
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Request stream as received by a handler.
pub struct RequestReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> RequestReceiver<T> {
    /// Next request element, `None` once the client completed the stream.
    pub async fn message(&mut self) -> Option<T> {
        self.rx.next().await
    }
}

impl<T> Stream for RequestReceiver<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_next_unpin(cx)
    }
}

/// Response stream as written by a handler.
pub struct ResponseSender<T> {
    tx: mpsc::UnboundedSender<Result<T, Status>>,
}

impl<T> ResponseSender<T> {
    pub fn send(&self, message: T) -> Result<(), Status> {
        self.tx
            .unbounded_send(Ok(message))
            .map_err(|_| Status::cancelled("client dropped the response stream"))
    }
}

/// Client-side writer feeding a [`RequestReceiver`].
struct ChannelSink<T> {
    tx: Option<mpsc::UnboundedSender<T>>,
}

#[async_trait]
impl<T: Send + 'static> RequestSink<T> for ChannelSink<T> {
    async fn write(&mut self, message: T) -> Result<(), Status> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Status::internal("request stream already completed"))?;
        tx.unbounded_send(message)
            .map_err(|_| Status::unavailable("server closed the request stream"))
    }

    async fn complete(&mut self) -> Result<(), Status> {
        self.tx.take();
        Ok(())
    }
}

fn server_context(options: &CallOptions) -> ServerContext {
    ServerContext {
        metadata: options.metadata().clone(),
        cancellation: options.cancellation().clone(),
    }
}

async fn until_cancelled<T, F>(token: CancellationToken, handler: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Status::cancelled_by_client()),
        result = handler => result,
    }
}

fn request_channel<T>() -> (Box<ChannelSink<T>>, RequestReceiver<T>) {
    let (tx, rx) = mpsc::unbounded();
    (Box::new(ChannelSink { tx: Some(tx) }), RequestReceiver { rx })
}

// ============================================================================
// Call constructors
// ============================================================================

/// Single request, single response.
pub fn unary<Req, Resp, F, Fut>(request: Req, options: &CallOptions, handler: F) -> UnaryCall<Resp>
where
    Resp: Send + 'static,
    F: FnOnce(Req, ServerContext) -> Fut,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    let ctx = server_context(options);
    let token = ctx.cancellation.clone();
    UnaryCall::new(until_cancelled(token, handler(request, ctx)))
}

/// Streamed requests, single response. The handler runs concurrently with
/// the client's writes.
pub fn client_streaming<Req, Resp, F, Fut>(
    options: &CallOptions,
    handler: F,
) -> ClientStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: FnOnce(RequestReceiver<Req>, ServerContext) -> Fut,
    Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
{
    let (sink, requests) = request_channel();
    let ctx = server_context(options);
    let token = ctx.cancellation.clone();
    let task = tokio::spawn(until_cancelled(token, handler(requests, ctx)));

    ClientStreamingCall::new(sink, async move {
        task.await
            .map_err(|e| Status::internal(format!("handler task failed: {e}")))?
    })
}

/// Single request, streamed responses. The stream ends when the handler
/// returns; a handler error becomes the final stream item.
pub fn server_streaming<Req, Resp, F, Fut>(
    request: Req,
    options: &CallOptions,
    handler: F,
) -> ServerStreamingCall<Resp>
where
    Resp: Send + 'static,
    F: FnOnce(Req, ResponseSender<Resp>, ServerContext) -> Fut,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded();
    let ctx = server_context(options);
    let token = ctx.cancellation.clone();
    let handler = handler(request, ResponseSender { tx: tx.clone() }, ctx);

    tokio::spawn(async move {
        if let Err(status) = until_cancelled(token, handler).await {
            debug!(%status, "loopback handler ended with error");
            let _ = tx.unbounded_send(Err(status));
        }
    });

    ServerStreamingCall::new(rx)
}

/// Streamed requests, streamed responses.
pub fn duplex_streaming<Req, Resp, F, Fut>(
    options: &CallOptions,
    handler: F,
) -> DuplexStreamingCall<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: FnOnce(RequestReceiver<Req>, ResponseSender<Resp>, ServerContext) -> Fut,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    let (sink, requests) = request_channel();
    let (tx, rx) = mpsc::unbounded();
    let ctx = server_context(options);
    let token = ctx.cancellation.clone();
    let handler = handler(requests, ResponseSender { tx: tx.clone() }, ctx);

    tokio::spawn(async move {
        if let Err(status) = until_cancelled(token, handler).await {
            debug!(%status, "loopback handler ended with error");
            let _ = tx.unbounded_send(Err(status));
        }
    });

    DuplexStreamingCall::new(sink, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;

    #[tokio::test]
    async fn test_unary_sees_metadata() {
        let options = CallOptions::new().with_metadata(Metadata::new().with("testkey", "testvalue"));
        let call = unary("ping", &options, |req, ctx| async move {
            Ok(format!("{req}:{}", ctx.metadata().get("testkey").unwrap_or_default()))
        });
        assert_eq!(call.await.unwrap(), "ping:testvalue");
    }

    #[tokio::test]
    async fn test_client_streaming_aggregates() {
        let call = client_streaming(&CallOptions::new(), |mut requests, _ctx| async move {
            let mut names = Vec::new();
            while let Some(name) = requests.message().await {
                names.push(name);
            }
            Ok(names.join(","))
        });
        let (mut sink, response) = call.into_parts();
        sink.write("a").await.unwrap();
        sink.write("b").await.unwrap();
        sink.complete().await.unwrap();
        assert!(sink.write("c").await.is_err());
        assert_eq!(response.await.unwrap(), "a,b");
    }

    #[tokio::test]
    async fn test_server_streaming_error_is_last_item() {
        let call = server_streaming(3u32, &CallOptions::new(), |count, tx, _ctx| async move {
            for i in 0..count {
                tx.send(i)?;
            }
            Err(Status::internal("done badly"))
        });
        let items: Vec<_> = call.into_stream().collect().await;
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], Ok(2));
        assert_eq!(items[3].as_ref().unwrap_err().code(), Code::Internal);
    }

    #[tokio::test]
    async fn test_duplex_echo() {
        let call = duplex_streaming(&CallOptions::new(), |mut requests, tx, _ctx| async move {
            while let Some(n) = requests.message().await {
                tx.send(n * 2)?;
            }
            Ok::<(), Status>(())
        });
        let (mut sink, responses) = call.into_parts();
        sink.write(1u32).await.unwrap();
        sink.write(2).await.unwrap();
        sink.complete().await.unwrap();
        let items: Vec<_> = responses.collect().await;
        assert_eq!(items, vec![Ok(2), Ok(4)]);
    }

    #[tokio::test]
    async fn test_cancellation_reports_cancelled() {
        let token = CancellationToken::new();
        let options = CallOptions::new().with_cancellation(token.clone());
        let call = unary((), &options, |_, _ctx| async move {
            futures::future::pending::<Result<(), Status>>().await
        });
        token.cancel();
        let err = call.await.unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
    }
}
