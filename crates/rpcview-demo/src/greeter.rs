//! In-process greeter service and its client contract.
//!
//! The client calls straight into loopback handlers, so the demo needs no
//! network. Streaming handlers pause `element_delay` between elements to make
//! incremental rendering visible.

use std::time::Duration;

use futures::StreamExt;
use rpcview_core::{Member, RpcContract, TypeInfo};
use rpcview_rpc::loopback::{self, RequestReceiver, ResponseSender, ServerContext};
use rpcview_rpc::{
    CallOptions, ClientStreamingCall, DuplexStreamingCall, ServerStreamingCall, Status, UnaryCall,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-element pause of the streaming handlers.
pub const DEFAULT_ELEMENT_DELAY: Duration = Duration::from_millis(1000);

const RHYME: [&str; 10] = [
    "One, Two...",
    "Freddy is coming for you!",
    "Three, Four...",
    "Better lock your door!",
    "Five, Six...",
    "Grab your crucifix!",
    "Seven, Eight...",
    "Gonna stay up late!",
    "Nine, Ten...",
    "Never sleep again!",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub message: String,
}

impl HelloResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GreeterClient {
    element_delay: Duration,
}

impl Default for GreeterClient {
    fn default() -> Self {
        Self::new(DEFAULT_ELEMENT_DELAY)
    }
}

impl GreeterClient {
    pub fn new(element_delay: Duration) -> Self {
        Self { element_delay }
    }

    pub fn say_hello(&self, request: HelloRequest, options: CallOptions) -> UnaryCall<HelloResponse> {
        loopback::unary(request, &options, |request, ctx| async move {
            debug!(name = %request.name, metadata = ctx.metadata().len(), "say_hello");
            Ok(HelloResponse::new(format!("Hello {}", request.name)))
        })
    }

    /// Same call with a caller-supplied deadline. Listed so the contract has
    /// an overload; the component keeps the shorter form.
    pub fn say_hello_with_deadline(
        &self,
        request: HelloRequest,
        options: CallOptions,
        _deadline: Option<Duration>,
    ) -> UnaryCall<HelloResponse> {
        self.say_hello(request, options)
    }

    pub fn greet_everyone(&self, options: CallOptions) -> ClientStreamingCall<HelloRequest, HelloResponse> {
        loopback::client_streaming(&options, |requests, _ctx| greet_everyone(requests))
    }

    pub fn recite(&self, request: HelloRequest, options: CallOptions) -> ServerStreamingCall<HelloResponse> {
        let delay = self.element_delay;
        loopback::server_streaming(request, &options, move |request, tx, ctx| {
            recite(request, tx, ctx, delay)
        })
    }

    pub fn chat(&self, options: CallOptions) -> DuplexStreamingCall<HelloRequest, HelloResponse> {
        let delay = self.element_delay;
        loopback::duplex_streaming(&options, move |requests, tx, _ctx| chat(requests, tx, delay))
    }

    pub fn element_delay(&self) -> Duration {
        self.element_delay
    }
}

impl RpcContract for GreeterClient {
    fn members() -> Vec<Member<Self>> {
        vec![
            Member::unary("say_hello", |c: &Self, req, opts| c.say_hello(req, opts)),
            Member::unary("say_hello", |c: &Self, req, opts| {
                c.say_hello_with_deadline(req, opts, None)
            })
            .with_param::<Option<Duration>>(),
            Member::client_streaming("greet_everyone", |c: &Self, opts| c.greet_everyone(opts)),
            Member::server_streaming("recite", |c: &Self, req, opts| c.recite(req, opts)),
            Member::duplex_streaming("chat", |c: &Self, opts| c.chat(opts)),
            Member::helper("element_delay", vec![], TypeInfo::of::<Duration>()),
        ]
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn greet_everyone(requests: RequestReceiver<HelloRequest>) -> Result<HelloResponse, Status> {
    let names: Vec<String> = requests.map(|request| request.name).collect().await;
    Ok(HelloResponse::new(format!("Hello {}", names.join(", "))))
}

async fn recite(
    request: HelloRequest,
    tx: ResponseSender<HelloResponse>,
    ctx: ServerContext,
    delay: Duration,
) -> Result<(), Status> {
    for (i, line) in RHYME.iter().enumerate() {
        if ctx.is_cancelled() {
            break;
        }
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        let message = if request.name.is_empty() {
            line.to_string()
        } else {
            format!("{}, {line}", request.name)
        };
        tx.send(HelloResponse::new(message))?;
    }
    Ok(())
}

async fn chat(
    mut requests: RequestReceiver<HelloRequest>,
    tx: ResponseSender<HelloResponse>,
    delay: Duration,
) -> Result<(), Status> {
    let mut replies = Vec::new();
    while let Some(request) = requests.message().await {
        let line = RHYME[replies.len() % RHYME.len()];
        replies.push(format!("{}, {line}", request.name));
    }
    for (i, reply) in replies.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        tx.send(HelloResponse::new(reply))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcview_core::{CallShape, classify};
    use rpcview_rpc::RequestSink;

    #[test]
    fn test_contract_classifies_four_shapes() {
        let ops = classify::<GreeterClient>().unwrap();
        let shapes: Vec<CallShape> = ops.iter().map(|op| op.shape).collect();
        assert_eq!(
            shapes,
            vec![
                CallShape::UnaryCall,
                CallShape::ClientStreaming,
                CallShape::ServerStreaming,
                CallShape::DuplexStreaming,
            ]
        );
        assert_eq!(ops[0].params, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recite_yields_ten_lines() {
        let client = GreeterClient::default();
        let lines: Vec<_> = client
            .recite(HelloRequest::default(), CallOptions::new())
            .into_stream()
            .collect()
            .await;
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[1], Ok(HelloResponse::new("Freddy is coming for you!")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_pairs_names_with_rhyme() {
        let client = GreeterClient::new(Duration::from_millis(10));
        let (mut sink, responses) = client.chat(CallOptions::new()).into_parts();
        sink.write(HelloRequest { name: "Nancy".into() }).await.unwrap();
        sink.write(HelloRequest { name: "Glen".into() }).await.unwrap();
        sink.complete().await.unwrap();
        let replies: Vec<_> = responses.collect().await;
        assert_eq!(
            replies,
            vec![
                Ok(HelloResponse::new("Nancy, One, Two...")),
                Ok(HelloResponse::new("Glen, Freddy is coming for you!")),
            ]
        );
    }

    #[tokio::test]
    async fn test_greet_everyone_joins_names() {
        let client = GreeterClient::default();
        let (mut sink, response) = client.greet_everyone(CallOptions::new()).into_parts();
        sink.write(HelloRequest { name: "a".into() }).await.unwrap();
        sink.write(HelloRequest { name: "b".into() }).await.unwrap();
        sink.complete().await.unwrap();
        assert_eq!(response.await.unwrap().message, "Hello a, b");
    }
}
