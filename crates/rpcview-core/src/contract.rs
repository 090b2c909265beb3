//! Client contract descriptions.
//!
//! Rust has no runtime reflection, so a client type describes itself: an
//! [`RpcContract`] lists its public callable [`Member`]s, each with a
//! [`Signature`] the classifier can inspect. Call members are built with the
//! generic constructors ([`Member::unary`] and friends), which record the
//! request/response types in the signature and capture a typed invoker at the
//! same time. Anything else a client exposes can be listed with
//! [`Member::helper`]; the classifier skips it.
//!
//! ```ignore
//! impl RpcContract for GreeterClient {
//!     fn members() -> Vec<Member<Self>> {
//!         vec![
//!             Member::unary("say_hello", |c: &Self, req, opts| c.say_hello(req, opts)),
//!             Member::server_streaming("lines", |c: &Self, req, opts| c.lines(req, opts)),
//!             Member::helper("endpoint", vec![], TypeInfo::of::<String>()),
//!         ]
//!     }
//! }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rpcview_rpc::{
    CallOptions, ClientStreamingCall, DuplexStreamingCall, ServerStreamingCall, UnaryCall,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{self, SerializerOptions};
use crate::invoke::{self, Invocation};

// ============================================================================
// Type descriptors
// ============================================================================

/// Name and identity of a Rust type appearing in a contract signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    name: &'static str,
    id: TypeId,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (`Vec<a::B>` keeps its arguments).
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }
}

/// What a member hands back when called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    /// `UnaryCall<response>`
    UnaryCall { response: TypeInfo },
    /// `ClientStreamingCall<request, response>`
    ClientStreamingCall { request: TypeInfo, response: TypeInfo },
    /// `ServerStreamingCall<response>`
    ServerStreamingCall { response: TypeInfo },
    /// `DuplexStreamingCall<request, response>`
    DuplexStreamingCall { request: TypeInfo, response: TypeInfo },
    /// Anything that is not a call object.
    Other(TypeInfo),
}

/// Parameter list and return kind of a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<TypeInfo>,
    pub returns: Returns,
}

// ============================================================================
// Members
// ============================================================================

/// Bounds a request payload must satisfy: parsed from text, and default
/// constructible so a request template can be generated.
pub trait RequestMessage: Serialize + DeserializeOwned + Default + Send + 'static {}

impl<T> RequestMessage for T where T: Serialize + DeserializeOwned + Default + Send + 'static {}

/// Bounds a response payload must satisfy.
pub trait ResponseMessage: Serialize + Send + 'static {}

impl<T> ResponseMessage for T where T: Serialize + Send + 'static {}

/// Starts one call against a shared client and drives it to the end.
pub(crate) type Invoker<C> = Arc<dyn Fn(Arc<C>, Invocation) -> BoxFuture<'static, ()> + Send + Sync>;

/// Produces the initial request text for an operation.
pub(crate) type TemplateFn = fn(&SerializerOptions) -> serde_json::Result<String>;

/// Typed behavior captured when a call member is described.
pub(crate) struct Binding<C> {
    pub invoke: Invoker<C>,
    pub template: TemplateFn,
}

/// One public callable member of a client contract.
pub struct Member<C> {
    name: String,
    signature: Signature,
    binding: Option<Binding<C>>,
}

impl<C> Member<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn param_count(&self) -> usize {
        self.signature.params.len()
    }

    /// Append a parameter type. Used to describe convenience overloads that
    /// take more arguments than the canonical form.
    pub fn with_param<T: ?Sized + 'static>(mut self) -> Self {
        self.signature.params.push(TypeInfo::of::<T>());
        self
    }

    /// A member that is not an RPC call (builders, accessors, ...).
    pub fn helper(name: impl Into<String>, params: Vec<TypeInfo>, returns: TypeInfo) -> Self {
        Self {
            name: name.into(),
            signature: Signature {
                params,
                returns: Returns::Other(returns),
            },
            binding: None,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Signature, Option<Binding<C>>) {
        (self.name, self.signature, self.binding)
    }
}

impl<C: Send + Sync + 'static> Member<C> {
    /// `fn(&self, Req, CallOptions) -> UnaryCall<Resp>`
    pub fn unary<Req, Resp, F>(name: impl Into<String>, call: F) -> Self
    where
        Req: RequestMessage,
        Resp: ResponseMessage,
        F: Fn(&C, Req, CallOptions) -> UnaryCall<Resp> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let invoke: Invoker<C> = Arc::new(move |client: Arc<C>, invocation: Invocation| {
            let call = call.clone();
            invoke::unary(
                move |request, options| call(&client, request, options),
                invocation,
            )
            .boxed()
        });
        Self {
            name: name.into(),
            signature: Signature {
                params: vec![TypeInfo::of::<Req>(), TypeInfo::of::<CallOptions>()],
                returns: Returns::UnaryCall {
                    response: TypeInfo::of::<Resp>(),
                },
            },
            binding: Some(Binding {
                invoke,
                template: codec::single_template::<Req>,
            }),
        }
    }

    /// `fn(&self, CallOptions) -> ClientStreamingCall<Req, Resp>`
    pub fn client_streaming<Req, Resp, F>(name: impl Into<String>, call: F) -> Self
    where
        Req: RequestMessage,
        Resp: ResponseMessage,
        F: Fn(&C, CallOptions) -> ClientStreamingCall<Req, Resp> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let invoke: Invoker<C> = Arc::new(move |client: Arc<C>, invocation: Invocation| {
            let call = call.clone();
            invoke::client_streaming(
                move |options| call(&client, options),
                invocation,
            )
            .boxed()
        });
        Self {
            name: name.into(),
            signature: Signature {
                params: vec![TypeInfo::of::<CallOptions>()],
                returns: Returns::ClientStreamingCall {
                    request: TypeInfo::of::<Req>(),
                    response: TypeInfo::of::<Resp>(),
                },
            },
            binding: Some(Binding {
                invoke,
                template: codec::list_template::<Req>,
            }),
        }
    }

    /// `fn(&self, Req, CallOptions) -> ServerStreamingCall<Resp>`
    pub fn server_streaming<Req, Resp, F>(name: impl Into<String>, call: F) -> Self
    where
        Req: RequestMessage,
        Resp: ResponseMessage,
        F: Fn(&C, Req, CallOptions) -> ServerStreamingCall<Resp> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let invoke: Invoker<C> = Arc::new(move |client: Arc<C>, invocation: Invocation| {
            let call = call.clone();
            invoke::server_streaming(
                move |request, options| call(&client, request, options),
                invocation,
            )
            .boxed()
        });
        Self {
            name: name.into(),
            signature: Signature {
                params: vec![TypeInfo::of::<Req>(), TypeInfo::of::<CallOptions>()],
                returns: Returns::ServerStreamingCall {
                    response: TypeInfo::of::<Resp>(),
                },
            },
            binding: Some(Binding {
                invoke,
                template: codec::single_template::<Req>,
            }),
        }
    }

    /// `fn(&self, CallOptions) -> DuplexStreamingCall<Req, Resp>`
    pub fn duplex_streaming<Req, Resp, F>(name: impl Into<String>, call: F) -> Self
    where
        Req: RequestMessage,
        Resp: ResponseMessage,
        F: Fn(&C, CallOptions) -> DuplexStreamingCall<Req, Resp> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let invoke: Invoker<C> = Arc::new(move |client: Arc<C>, invocation: Invocation| {
            let call = call.clone();
            invoke::duplex_streaming(
                move |options| call(&client, options),
                invocation,
            )
            .boxed()
        });
        Self {
            name: name.into(),
            signature: Signature {
                params: vec![TypeInfo::of::<CallOptions>()],
                returns: Returns::DuplexStreamingCall {
                    request: TypeInfo::of::<Req>(),
                    response: TypeInfo::of::<Resp>(),
                },
            },
            binding: Some(Binding {
                invoke,
                template: codec::list_template::<Req>,
            }),
        }
    }
}

// ============================================================================
// Contract
// ============================================================================

/// A client type whose call members can be turned into panels.
///
/// The host injects one shared instance per mounted component; every
/// operation of the contract calls through that instance.
pub trait RpcContract: Send + Sync + Sized + 'static {
    /// Name shown in the contract header.
    fn contract_name() -> &'static str {
        TypeInfo::of::<Self>().short_name()
    }

    /// The contract's own public callable members, in declaration order.
    fn members() -> Vec<Member<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod wire {
        #[derive(Default, serde::Serialize, serde::Deserialize)]
        pub struct Ping;
    }

    #[test]
    fn test_short_name_strips_module_path() {
        assert_eq!(TypeInfo::of::<wire::Ping>().short_name(), "Ping");
        assert_eq!(TypeInfo::of::<u32>().short_name(), "u32");
        assert!(TypeInfo::of::<Vec<wire::Ping>>().short_name().starts_with("Vec<"));
    }

    #[test]
    fn test_constructors_record_signature() {
        struct Client;
        let unary = Member::unary("ping", |_: &Client, req: wire::Ping, _| UnaryCall::ready(req));
        assert_eq!(unary.param_count(), 2);
        assert_eq!(unary.signature().params[0], TypeInfo::of::<wire::Ping>());
        assert_eq!(
            unary.signature().returns,
            Returns::UnaryCall { response: TypeInfo::of::<wire::Ping>() }
        );

        let overload = Member::unary("ping", |_: &Client, req: wire::Ping, _| UnaryCall::ready(req))
            .with_param::<Option<std::time::Duration>>();
        assert_eq!(overload.param_count(), 3);

        let helper = Member::<Client>::helper("endpoint", vec![], TypeInfo::of::<String>());
        assert!(matches!(helper.signature().returns, Returns::Other(_)));
        assert!(helper.binding.is_none());
    }
}
