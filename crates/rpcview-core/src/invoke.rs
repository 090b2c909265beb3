//! Generic invocation layer: one routine per call shape.
//!
//! Every routine takes a thunk that starts the underlying call and an
//! [`Invocation`] carrying the request text, call options, serializer, pacing
//! and the response sink. Routines never return errors: any failure is turned
//! into its textual description and handed to the sink, so the response area
//! doubles as the error surface.
//!
//! ```text
//!   unary             parse ─▶ call ─▶ sink(resp)
//!   client_streaming  parse list ─▶ write, pace, write ... complete ─▶ sink(resp)
//!   server_streaming  parse ─▶ call ─▶ sink(r1) sink(r1\nr2) ...
//!   duplex_streaming  parse list ─▶ writes ‖ reads ─▶ sink(r1) sink(r1\nr2) ...
//! ```
//!
//! Cancellation is cooperative. Each routine checks the call's token at every
//! suspension point and unwinds once it fires, reporting the RPC layer's
//! `Cancelled` status like any other failure. Streamed shapes append a
//! failure after the text already delivered, so partial output stays.

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use rpcview_rpc::{
    BoxRequestSink, CallOptions, CancellationToken, ClientStreamingCall, DuplexStreamingCall,
    ResponseStream, ServerStreamingCall, Status, UnaryCall,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::codec::SerializerOptions;
use crate::constants::{DEFAULT_WRITE_INTERVAL, RESPONSE_SEPARATOR};
use crate::error::InvokeError;

/// Receives serialized response text. Streaming shapes pass the whole
/// accumulated text on every call.
pub type ResponseSink = Arc<dyn Fn(String) + Send + Sync>;

/// Client-side pacing between outbound stream writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub write_interval: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            write_interval: DEFAULT_WRITE_INTERVAL,
        }
    }
}

impl Pacing {
    /// Write stream elements back to back.
    pub fn none() -> Self {
        Self {
            write_interval: Duration::ZERO,
        }
    }
}

/// One call's worth of input to an invocation routine.
pub struct Invocation {
    pub request: String,
    pub options: CallOptions,
    pub serializer: SerializerOptions,
    pub pacing: Pacing,
    pub sink: ResponseSink,
}

impl Invocation {
    fn cancellation(&self) -> CancellationToken {
        self.options.cancellation().clone()
    }

    fn deliver(&self, text: String) {
        (self.sink)(text);
    }
}

/// Response text one routine run has delivered so far.
struct Transcript<'a> {
    inv: &'a Invocation,
    text: Mutex<String>,
}

impl<'a> Transcript<'a> {
    fn new(inv: &'a Invocation) -> Self {
        Self {
            inv,
            text: Mutex::new(String::new()),
        }
    }

    /// Add `chunk` after the text so far and deliver the whole.
    fn append(&self, chunk: &str) {
        let text = {
            let mut text = self.text.lock();
            if !text.is_empty() {
                text.push_str(RESPONSE_SEPARATOR);
            }
            text.push_str(chunk);
            text.clone()
        };
        self.inv.deliver(text);
    }

    /// Route a failed outcome to the sink.
    fn finish(&self, outcome: Result<(), InvokeError>) {
        let Err(error) = outcome else {
            return;
        };
        if self.inv.options.cancellation().is_cancelled() {
            debug!(%error, "call unwound after cancellation");
        } else {
            warn!(%error, "call failed");
        }
        self.append(&error.to_string());
    }
}

// ============================================================================
// Routines
// ============================================================================

/// Single request, single response.
pub async fn unary<Req, Resp, F>(start: F, invocation: Invocation)
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Req, CallOptions) -> UnaryCall<Resp>,
{
    let transcript = Transcript::new(&invocation);
    let outcome = run_unary(start, &transcript).await;
    transcript.finish(outcome);
}

async fn run_unary<Req, Resp, F>(start: F, out: &Transcript<'_>) -> Result<(), InvokeError>
where
    Req: DeserializeOwned,
    Resp: Serialize,
    F: FnOnce(Req, CallOptions) -> UnaryCall<Resp>,
{
    let inv = out.inv;
    let token = inv.cancellation();
    let request: Req = inv.serializer.from_text(&inv.request)?;
    let call = start(request, inv.options.clone());
    let response = unless_cancelled(&token, call.into_future()).await?;
    out.append(&inv.serializer.to_text(&response?)?);
    Ok(())
}

/// Streamed requests, single response.
pub async fn client_streaming<Req, Resp, F>(start: F, invocation: Invocation)
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: FnOnce(CallOptions) -> ClientStreamingCall<Req, Resp>,
{
    let transcript = Transcript::new(&invocation);
    let outcome = run_client_streaming(start, &transcript).await;
    transcript.finish(outcome);
}

async fn run_client_streaming<Req, Resp, F>(start: F, out: &Transcript<'_>) -> Result<(), InvokeError>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: FnOnce(CallOptions) -> ClientStreamingCall<Req, Resp>,
{
    let inv = out.inv;
    let token = inv.cancellation();
    let requests: Vec<Req> = inv.serializer.from_text(&inv.request)?;
    let (mut request_stream, response) = start(inv.options.clone()).into_parts();

    write_requests(&mut request_stream, requests, inv.pacing, &token).await?;

    let response = unless_cancelled(&token, response).await?;
    out.append(&inv.serializer.to_text(&response?)?);
    Ok(())
}

/// Single request, streamed responses.
pub async fn server_streaming<Req, Resp, F>(start: F, invocation: Invocation)
where
    Req: DeserializeOwned,
    Resp: Serialize + Send + 'static,
    F: FnOnce(Req, CallOptions) -> ServerStreamingCall<Resp>,
{
    let transcript = Transcript::new(&invocation);
    let outcome = run_server_streaming(start, &transcript).await;
    transcript.finish(outcome);
}

async fn run_server_streaming<Req, Resp, F>(start: F, out: &Transcript<'_>) -> Result<(), InvokeError>
where
    Req: DeserializeOwned,
    Resp: Serialize + Send + 'static,
    F: FnOnce(Req, CallOptions) -> ServerStreamingCall<Resp>,
{
    let inv = out.inv;
    let token = inv.cancellation();
    let request: Req = inv.serializer.from_text(&inv.request)?;
    let responses = start(request, inv.options.clone()).into_stream();
    read_responses(responses, out, &token).await
}

/// Streamed requests, streamed responses. Writes and reads proceed
/// concurrently; each direction is strictly ordered on its own.
pub async fn duplex_streaming<Req, Resp, F>(start: F, invocation: Invocation)
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: FnOnce(CallOptions) -> DuplexStreamingCall<Req, Resp>,
{
    let transcript = Transcript::new(&invocation);
    let outcome = run_duplex_streaming(start, &transcript).await;
    transcript.finish(outcome);
}

async fn run_duplex_streaming<Req, Resp, F>(start: F, out: &Transcript<'_>) -> Result<(), InvokeError>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: FnOnce(CallOptions) -> DuplexStreamingCall<Req, Resp>,
{
    let inv = out.inv;
    let token = inv.cancellation();
    let requests: Vec<Req> = inv.serializer.from_text(&inv.request)?;
    let (mut request_stream, responses) = start(inv.options.clone()).into_parts();

    tokio::try_join!(
        write_requests(&mut request_stream, requests, inv.pacing, &token),
        read_responses(responses, out, &token),
    )?;
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Race `fut` against the call's token. A fired token yields the same
/// `Cancelled` status the RPC layer reports for the call.
async fn unless_cancelled<F: Future>(
    token: &CancellationToken,
    fut: F,
) -> Result<F::Output, InvokeError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Status::cancelled_by_client().into()),
        output = fut => Ok(output),
    }
}

/// Write every request in order, pausing `pacing` between writes, then
/// half-close the stream. Stops early (without completing) on cancellation.
async fn write_requests<Req: Send + 'static>(
    request_stream: &mut BoxRequestSink<Req>,
    requests: Vec<Req>,
    pacing: Pacing,
    token: &CancellationToken,
) -> Result<(), InvokeError> {
    let total = requests.len();
    for (index, request) in requests.into_iter().enumerate() {
        if index > 0 && !pacing.write_interval.is_zero() {
            unless_cancelled(token, tokio::time::sleep(pacing.write_interval)).await?;
        }
        if token.is_cancelled() {
            return Err(Status::cancelled_by_client().into());
        }
        request_stream.write(request).await?;
        debug!(index, total, "request element written");
    }
    request_stream.complete().await?;
    Ok(())
}

/// Read response elements until the stream ends or the call is cancelled,
/// delivering the accumulated text after each one.
async fn read_responses<Resp: Serialize + Send + 'static>(
    mut responses: ResponseStream<Resp>,
    out: &Transcript<'_>,
    token: &CancellationToken,
) -> Result<(), InvokeError> {
    while let Some(item) = unless_cancelled(token, responses.next()).await? {
        out.append(&out.inv.serializer.to_text(&item?)?);
    }
    Ok(())
}
