//! Host injection surface.
//!
//! The host registers one bound client per contract (looked up by type at
//! mount time) and, optionally, a metadata provider. Nothing here is owned by
//! the component: clients are shared `Arc`s so several mounted instances can
//! call through the same connection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::metadata::{EmptyMetadata, MetadataProvider};

#[derive(Clone, Default)]
pub struct Services {
    clients: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("clients", &self.clients.len())
            .field("metadata_provider", &self.metadata.is_some())
            .finish()
    }
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bound client. Replaces any client of the same type.
    pub fn insert<C: Send + Sync + 'static>(&mut self, client: C) -> &mut Self {
        self.insert_arc(Arc::new(client))
    }

    pub fn insert_arc<C: Send + Sync + 'static>(&mut self, client: Arc<C>) -> &mut Self {
        self.clients.insert(TypeId::of::<C>(), client);
        self
    }

    /// Builder form of [`Services::insert`].
    pub fn with_client<C: Send + Sync + 'static>(mut self, client: C) -> Self {
        self.insert(client);
        self
    }

    pub fn get<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.clients
            .get(&TypeId::of::<C>())
            .cloned()
            .and_then(|client| client.downcast::<C>().ok())
    }

    pub fn set_metadata_provider(&mut self, provider: impl MetadataProvider + 'static) -> &mut Self {
        self.metadata = Some(Arc::new(provider));
        self
    }

    pub fn with_metadata_provider(mut self, provider: impl MetadataProvider + 'static) -> Self {
        self.set_metadata_provider(provider);
        self
    }

    /// The registered provider, or one that adds nothing.
    pub fn metadata_provider(&self) -> Arc<dyn MetadataProvider> {
        self.registered_metadata_provider()
            .unwrap_or_else(|| Arc::new(EmptyMetadata))
    }

    pub(crate) fn registered_metadata_provider(&self) -> Option<Arc<dyn MetadataProvider>> {
        self.metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcview_rpc::Metadata;

    struct Greeter(&'static str);

    #[test]
    fn test_clients_by_type() {
        let services = Services::new().with_client(Greeter("a"));
        assert_eq!(services.get::<Greeter>().map(|g| g.0), Some("a"));
        assert!(services.get::<String>().is_none());
    }

    #[test]
    fn test_default_provider_is_empty() {
        let services = Services::new();
        assert!(services.metadata_provider().metadata().is_empty());

        let services = services.with_metadata_provider(|| Metadata::new().with("testkey", "testvalue"));
        assert_eq!(services.metadata_provider().metadata().get("testkey"), Some("testvalue"));
    }
}
