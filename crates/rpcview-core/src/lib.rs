//! rpcview core: interactive call panels synthesized from RPC client contracts.
//!
//! Given a set of client contracts, rpcview classifies every call member into
//! one of four shapes, builds a component template with one panel per
//! operation, and drives calls through a generic invocation layer that writes
//! results back into panel state.
//!
//! ```ignore
//! let template = ComponentBuilder::new()
//!     .with_config(RpcViewConfig::load_default())
//!     .contract::<GreeterClient>()
//!     .build()?;
//!
//! let services = Services::new().with_client(GreeterClient::connect(...));
//! let component = template.mount(&services)?;
//!
//! component.execute(0)?;
//! component.wait_idle(0).await?;
//! println!("{}", component.response_text(0)?);
//! ```

pub mod classify;
pub mod codec;
pub mod component;
pub mod config;
pub mod constants;
pub mod contract;
pub mod error;
pub mod invoke;
mod layout;
pub mod metadata;
pub mod render;
pub mod services;

pub use classify::{CallShape, Operation, classify};
pub use codec::SerializerOptions;
pub use component::{Component, ComponentBuilder, ComponentTemplate};
pub use config::{PacingConfig, RpcViewConfig};
pub use contract::{Member, RequestMessage, ResponseMessage, Returns, RpcContract, Signature, TypeInfo};
pub use error::{ComponentError, ConfigError, InvokeError, MountError, SynthesisError};
pub use invoke::{Invocation, Pacing, ResponseSink};
pub use metadata::{EmptyMetadata, MetadataProvider, StaticMetadata};
pub use render::{
    Action, ActionKind, AttributeValue, MarkupSink, RecordingSink, RenderFrame, RenderSink,
    Sequence, TwoWayBinding,
};
pub use services::Services;

/// Re-exported so hosts can write contracts against a single crate.
pub use rpcview_rpc as rpc;
