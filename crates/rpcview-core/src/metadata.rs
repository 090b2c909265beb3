//! Ambient metadata providers.
//!
//! A component asks its provider for metadata once per call, right before the
//! call starts, so providers may hand out fresh values (rotating tokens, trace
//! ids) every time.

use rpcview_rpc::Metadata;

pub trait MetadataProvider: Send + Sync {
    fn metadata(&self) -> Metadata;
}

/// Provider with nothing to add. Used when the host registers none.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMetadata;

impl MetadataProvider for EmptyMetadata {
    fn metadata(&self) -> Metadata {
        Metadata::new()
    }
}

/// Provider returning the same entries for every call.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata(pub Metadata);

impl MetadataProvider for StaticMetadata {
    fn metadata(&self) -> Metadata {
        self.0.clone()
    }
}

impl<F> MetadataProvider for F
where
    F: Fn() -> Metadata + Send + Sync,
{
    fn metadata(&self) -> Metadata {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_closure_provider_runs_per_call() {
        let counter = AtomicU32::new(0);
        let provider = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Metadata::new().with("seq", n.to_string())
        };
        assert_eq!(provider.metadata().get("seq"), Some("0"));
        assert_eq!(provider.metadata().get("seq"), Some("1"));
    }

    #[test]
    fn test_static_and_empty() {
        let fixed = StaticMetadata(Metadata::new().with("testkey", "testvalue"));
        assert_eq!(fixed.metadata().get("testkey"), Some("testvalue"));
        assert!(EmptyMetadata.metadata().is_empty());
    }
}
