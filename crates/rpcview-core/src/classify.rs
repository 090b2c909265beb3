//! Call-shape classification of contract members.
//!
//! Members are grouped by (shape, name) in discovery order. A group with
//! several overloads keeps the one with the fewest parameters; two overloads
//! tied on that count are ambiguous and fail the contract.

use indexmap::IndexMap;
use strum::{Display, EnumIter};
use tracing::debug;

use crate::contract::{Binding, Member, Returns, RpcContract, Signature, TypeInfo};
use crate::error::SynthesisError;

/// The four RPC interaction patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum CallShape {
    /// Single request, single response.
    #[strum(to_string = "UNARY CALL")]
    UnaryCall,
    /// Streamed requests, single response.
    #[strum(to_string = "CLIENT STREAMING")]
    ClientStreaming,
    /// Single request, streamed responses.
    #[strum(to_string = "SERVER STREAMING")]
    ServerStreaming,
    /// Streamed requests, streamed responses.
    #[strum(to_string = "DUPLEX STREAMING")]
    DuplexStreaming,
}

impl CallShape {
    /// Normalized label shown in panel headers.
    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Class name used on every node of a panel of this shape.
    pub fn css_class(&self) -> &'static str {
        match self {
            CallShape::UnaryCall => "unaryCall",
            CallShape::ClientStreaming => "clientStreaming",
            CallShape::ServerStreaming => "serverStreaming",
            CallShape::DuplexStreaming => "duplexStreaming",
        }
    }

    pub fn streams_requests(&self) -> bool {
        matches!(self, CallShape::ClientStreaming | CallShape::DuplexStreaming)
    }

    pub fn streams_responses(&self) -> bool {
        matches!(self, CallShape::ServerStreaming | CallShape::DuplexStreaming)
    }
}

/// One classified, invocable member of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub shape: CallShape,
    /// Request value type (element type for streamed requests).
    pub request: TypeInfo,
    /// Response value type (element type for streamed responses).
    pub response: TypeInfo,
    /// Parameter count of the overload that was kept.
    pub params: usize,
}

/// An operation together with the typed behavior of the member it came from.
pub(crate) struct Classified<C> {
    pub operation: Operation,
    pub binding: Binding<C>,
}

/// Classify the members of `C`, in discovery order.
pub fn classify<C: RpcContract>() -> Result<Vec<Operation>, SynthesisError> {
    let classified = classify_members(C::contract_name(), C::members())?;
    Ok(classified.into_iter().map(|c| c.operation).collect())
}

/// Determine shape and payload types from a signature, if it is a call.
fn shape_of(signature: &Signature) -> Option<(CallShape, TypeInfo, TypeInfo)> {
    match signature.returns {
        Returns::UnaryCall { response } => {
            let request = *signature.params.first()?;
            Some((CallShape::UnaryCall, request, response))
        }
        Returns::ClientStreamingCall { request, response } => {
            Some((CallShape::ClientStreaming, request, response))
        }
        Returns::ServerStreamingCall { response } => {
            let request = *signature.params.first()?;
            Some((CallShape::ServerStreaming, request, response))
        }
        Returns::DuplexStreamingCall { request, response } => {
            Some((CallShape::DuplexStreaming, request, response))
        }
        Returns::Other(_) => None,
    }
}

pub(crate) fn classify_members<C>(
    contract: &str,
    members: Vec<Member<C>>,
) -> Result<Vec<Classified<C>>, SynthesisError> {
    let mut groups: IndexMap<(CallShape, String), Vec<Classified<C>>> = IndexMap::new();

    for member in members {
        let (name, signature, binding) = member.into_parts();
        let (Some((shape, request, response)), Some(binding)) = (shape_of(&signature), binding)
        else {
            debug!(contract, member = %name, "skipping non-call member");
            continue;
        };
        let operation = Operation {
            name: name.clone(),
            shape,
            request,
            response,
            params: signature.params.len(),
        };
        groups
            .entry((shape, name))
            .or_default()
            .push(Classified { operation, binding });
    }

    let mut operations = Vec::with_capacity(groups.len());
    for ((shape, name), overloads) in groups {
        let Some(min_params) = overloads.iter().map(|c| c.operation.params).min() else {
            continue;
        };
        let mut fewest: Vec<Classified<C>> = overloads
            .into_iter()
            .filter(|c| c.operation.params == min_params)
            .collect();
        if fewest.len() > 1 {
            return Err(SynthesisError::AmbiguousOverload {
                contract: contract.to_string(),
                operation: name,
                shape,
                params: min_params,
                count: fewest.len(),
            });
        }
        if let Some(chosen) = fewest.pop() {
            debug!(contract, operation = %name, %shape, params = min_params, "classified operation");
            operations.push(chosen);
        }
    }

    if operations.is_empty() {
        return Err(SynthesisError::NotARpcContract {
            contract: contract.to_string(),
        });
    }
    Ok(operations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcview_rpc::{
        CallOptions, ClientStreamingCall, DuplexStreamingCall, ServerStreamingCall, UnaryCall,
        loopback,
    };
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use strum::IntoEnumIterator;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct HelloRequest {
        name: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct HelloReply {
        message: String,
    }

    struct TestClient;

    impl TestClient {
        fn unary(&self, req: HelloRequest, _: CallOptions) -> UnaryCall<HelloReply> {
            UnaryCall::ready(HelloReply { message: req.name })
        }

        fn client_stream(&self, options: CallOptions) -> ClientStreamingCall<HelloRequest, HelloReply> {
            loopback::client_streaming(&options, |_, _| async { Ok(HelloReply::default()) })
        }

        fn server_stream(&self, _: HelloRequest, _: CallOptions) -> ServerStreamingCall<HelloReply> {
            ServerStreamingCall::from_items(vec![])
        }

        fn duplex(&self, options: CallOptions) -> DuplexStreamingCall<HelloRequest, HelloReply> {
            loopback::duplex_streaming(&options, |_, _, _| async { Ok(()) })
        }
    }

    impl RpcContract for TestClient {
        fn members() -> Vec<Member<Self>> {
            vec![
                Member::unary("unary_call", |c: &Self, req, opts| c.unary(req, opts))
                    .with_param::<Option<Duration>>(),
                Member::unary("unary_call", |c: &Self, req, opts| c.unary(req, opts)),
                Member::helper("with_host", vec![TypeInfo::of::<String>()], TypeInfo::of::<Self>()),
                Member::client_streaming("client_streaming", |c: &Self, opts| c.client_stream(opts)),
                Member::server_streaming("server_streaming", |c: &Self, req, opts| {
                    c.server_stream(req, opts)
                }),
                Member::duplex_streaming("duplex_streaming", |c: &Self, opts| c.duplex(opts)),
            ]
        }
    }

    struct NotAClient;

    impl RpcContract for NotAClient {
        fn members() -> Vec<Member<Self>> {
            vec![Member::helper("connect", vec![], TypeInfo::of::<()>())]
        }
    }

    struct AmbiguousClient;

    impl RpcContract for AmbiguousClient {
        fn members() -> Vec<Member<Self>> {
            vec![
                Member::unary("ping", |_: &Self, req: HelloRequest, _| {
                    UnaryCall::ready(HelloReply { message: req.name })
                }),
                Member::unary("ping", |_: &Self, _: HelloRequest, _| {
                    UnaryCall::ready(HelloReply::default())
                }),
            ]
        }
    }

    #[test]
    fn test_classifies_all_four_shapes_in_order() {
        let ops = classify::<TestClient>().unwrap();
        let shapes: Vec<CallShape> = ops.iter().map(|o| o.shape).collect();
        assert_eq!(shapes, CallShape::iter().collect::<Vec<_>>());
        let names: Vec<&str> = ops.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["unary_call", "client_streaming", "server_streaming", "duplex_streaming"]
        );
    }

    #[test]
    fn test_overload_with_fewest_params_wins() {
        let ops = classify::<TestClient>().unwrap();
        assert_eq!(ops[0].params, 2);
    }

    #[test]
    fn test_extracts_payload_types() {
        for op in classify::<TestClient>().unwrap() {
            assert_eq!(op.request, TypeInfo::of::<HelloRequest>(), "{}", op.name);
            assert_eq!(op.response, TypeInfo::of::<HelloReply>(), "{}", op.name);
        }
    }

    #[test]
    fn test_helpers_only_is_not_a_contract() {
        let err = classify::<NotAClient>().unwrap_err();
        assert!(matches!(err, SynthesisError::NotARpcContract { ref contract } if contract == "NotAClient"));
    }

    #[test]
    fn test_tied_overloads_are_ambiguous() {
        let err = classify::<AmbiguousClient>().unwrap_err();
        match err {
            SynthesisError::AmbiguousOverload { operation, count, params, .. } => {
                assert_eq!(operation, "ping");
                assert_eq!(count, 2);
                assert_eq!(params, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shape_labels_and_classes() {
        assert_eq!(CallShape::UnaryCall.label(), "UNARY CALL");
        assert_eq!(CallShape::DuplexStreaming.to_string(), "DUPLEX STREAMING");
        assert_eq!(CallShape::ClientStreaming.css_class(), "clientStreaming");
        assert!(CallShape::ClientStreaming.streams_requests());
        assert!(!CallShape::ClientStreaming.streams_responses());
    }
}
