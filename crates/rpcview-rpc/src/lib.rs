//! Typed RPC call surface for rpcview.
//!
//! rpcview never talks to a transport directly. A client contract exposes
//! typed call methods that hand back one of four call objects:
//!
//! ```text
//!   UnaryCall<Resp>                   request ──▶ response
//!   ClientStreamingCall<Req, Resp>    request* ──▶ response
//!   ServerStreamingCall<Resp>         request ──▶ response*
//!   DuplexStreamingCall<Req, Resp>    request* ──▶ response*
//! ```
//!
//! Every call takes [`CallOptions`] carrying the ambient [`Metadata`] and the
//! cancellation token for that call. Failures are reported as [`Status`].
//!
//! The [`loopback`] module builds call objects from in-process handlers, which
//! is how stub clients and demo services are written.

mod call;
pub mod loopback;
mod metadata;
mod status;

pub use call::{
    BoxRequestSink, CallOptions, ClientStreamingCall, DuplexStreamingCall, RequestSink,
    ResponseStream, ServerStreamingCall, UnaryCall,
};
pub use metadata::{Metadata, MetadataEntry};
pub use status::{Code, Status};

/// Re-exported so contracts don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
