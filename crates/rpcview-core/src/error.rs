//! Error types for synthesis, mounting and invocation.

use rpcview_rpc::Status;
use thiserror::Error;

use crate::CallShape;

/// Construction-time failures. These abort building the component for the
/// supplied contract set.
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// A contract exposes no member matching any of the four call shapes.
    #[error("{contract} probably is not an RPC client contract: no unary or streaming call members found")]
    NotARpcContract { contract: String },

    /// The whole contract collection yielded zero operations.
    #[error("no RPC operations found in the supplied contracts")]
    NoOperationsFound,

    /// Two overloads share a name, shape and the minimal parameter count.
    #[error("{contract}::{operation} has {count} {shape} overloads with {params} parameters; cannot pick one")]
    AmbiguousOverload {
        contract: String,
        operation: String,
        shape: CallShape,
        params: usize,
        count: usize,
    },

    /// The default request value could not be serialized into a template.
    #[error("failed to build request template for {operation}: {source}")]
    Template {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while mounting a component template.
#[derive(Error, Debug)]
pub enum MountError {
    /// The host registered no bound client for a contract.
    #[error("no client registered for contract {0}")]
    MissingClient(String),

    /// Mounting happened outside a tokio runtime; calls could not be spawned.
    #[error("component must be mounted inside a tokio runtime")]
    NoRuntime,
}

/// Failures of a single action dispatch.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ComponentError {
    #[error("no panel with index {0}")]
    UnknownPanel(usize),
}

/// Per-call failures. Never escapes the invocation layer; its text is what
/// the response area shows.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// Request text did not parse, or a response did not serialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport or remote side failed the call.
    #[error("call failed: {0}")]
    Call(#[from] Status),
}

/// Failures while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}
