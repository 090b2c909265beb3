//! Component synthesis and the mounted component.
//!
//! ## Architecture
//!
//! ```text
//! ComponentBuilder ──build()──▶ ComponentTemplate ──mount(&Services)──▶ Component
//!   contracts                    operations (discovery order)          panel state per op
//!                                request templates                     bound call per op
//!                                typed invokers per contract           render notifications
//! ```
//!
//! The template is the stateless "component type": it knows every operation,
//! its request template and how to start a call of its shape, but holds no
//! panel state. Each [`Component`] mounted from it owns its own panels, so
//! concurrently mounted instances never share state.
//!
//! Actions (execute, cancel, clear, toggle visibility) are plain methods keyed
//! by panel index; a host wiring a real UI forwards the [`Action`]s it finds in
//! the render description to [`Component::dispatch`].
//!
//! Call tasks report back through a response sink that writes the panel's
//! response text and bumps a `watch` counter. Hosts re-render when the counter
//! changes; the invocation layer itself never touches the renderer.

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rpcview_rpc::{CallOptions, CancellationToken, Metadata};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span};

use crate::classify::{Classified, Operation, classify_members};
use crate::codec::SerializerOptions;
use crate::config::RpcViewConfig;
use crate::contract::{Invoker, RpcContract};
use crate::error::{ComponentError, MountError, SynthesisError};
use crate::invoke::{Invocation, Pacing, ResponseSink};
use crate::layout::{ContractView, PanelView, render_component};
use crate::metadata::{MetadataProvider, StaticMetadata};
use crate::render::{Action, ActionKind, MarkupSink, RenderSink, TwoWayBinding};
use crate::services::Services;

/// A call bound to a concrete client, ready to run one invocation.
type PanelCall = Arc<dyn Fn(Invocation) -> BoxFuture<'static, ()> + Send + Sync>;

// ============================================================================
// Builder
// ============================================================================

type DescribeFn = fn(&SerializerOptions) -> Result<ContractDescriptor, SynthesisError>;

/// Collects contracts and settings, then classifies everything at once.
#[derive(Default)]
pub struct ComponentBuilder {
    config: RpcViewConfig,
    contracts: Vec<DescribeFn>,
}

impl ComponentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RpcViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a client contract. Panels appear in the order contracts are added.
    pub fn contract<C: RpcContract>(mut self) -> Self {
        self.contracts.push(describe::<C>);
        self
    }

    /// Classify every contract and build the template.
    ///
    /// Fails on the first contract that is not an RPC client or has an
    /// ambiguous overload, and when the whole set yields no operation.
    pub fn build(self) -> Result<ComponentTemplate, SynthesisError> {
        let serializer = self.config.serialization;
        let mut contracts = Vec::with_capacity(self.contracts.len());
        let mut operations = Vec::new();

        for describe in self.contracts {
            let descriptor = describe(&serializer)?;
            contracts.push(ContractSlot {
                name: descriptor.name,
                first_panel: operations.len(),
                panel_count: descriptor.operations.len(),
                binder: descriptor.binder,
            });
            operations.extend(descriptor.operations);
        }

        if operations.is_empty() {
            return Err(SynthesisError::NoOperationsFound);
        }

        info!(
            contracts = contracts.len(),
            operations = operations.len(),
            "component template built"
        );

        let default_metadata = self.config.metadata();
        Ok(ComponentTemplate {
            inner: Arc::new(TemplateInner {
                serializer,
                pacing: self.config.pacing(),
                default_metadata,
                contracts,
                operations,
            }),
        })
    }
}

/// Classified operations of one contract plus the means to bind them.
struct ContractDescriptor {
    name: &'static str,
    operations: Vec<OperationSlot>,
    binder: Arc<dyn ContractBinder>,
}

fn describe<C: RpcContract>(serializer: &SerializerOptions) -> Result<ContractDescriptor, SynthesisError> {
    let name = C::contract_name();
    let classified = classify_members(name, C::members())?;

    let mut operations = Vec::with_capacity(classified.len());
    let mut invokers = Vec::with_capacity(classified.len());
    for Classified { operation, binding } in classified {
        let request_template =
            (binding.template)(serializer).map_err(|source| SynthesisError::Template {
                operation: operation.name.clone(),
                source,
            })?;
        operations.push(OperationSlot {
            operation,
            request_template,
        });
        invokers.push(binding.invoke);
    }

    Ok(ContractDescriptor {
        name,
        operations,
        binder: Arc::new(TypedBinder::<C> { invokers }),
    })
}

/// Binds a contract's operations to the client the host registered for it.
trait ContractBinder: Send + Sync {
    fn bind(&self, services: &Services) -> Result<Vec<PanelCall>, MountError>;
}

struct TypedBinder<C> {
    invokers: Vec<Invoker<C>>,
}

impl<C: RpcContract> ContractBinder for TypedBinder<C> {
    fn bind(&self, services: &Services) -> Result<Vec<PanelCall>, MountError> {
        let client = services
            .get::<C>()
            .ok_or_else(|| MountError::MissingClient(C::contract_name().to_string()))?;

        Ok(self
            .invokers
            .iter()
            .map(|invoker| {
                let invoker = invoker.clone();
                let client = client.clone();
                Arc::new(move |invocation: Invocation| invoker(client.clone(), invocation))
                    as PanelCall
            })
            .collect())
    }
}

// ============================================================================
// Template
// ============================================================================

struct OperationSlot {
    operation: Operation,
    request_template: String,
}

struct ContractSlot {
    name: &'static str,
    first_panel: usize,
    panel_count: usize,
    binder: Arc<dyn ContractBinder>,
}

struct TemplateInner {
    serializer: SerializerOptions,
    pacing: Pacing,
    default_metadata: Metadata,
    contracts: Vec<ContractSlot>,
    operations: Vec<OperationSlot>,
}

/// The built, stateless component type. Cheap to clone.
#[derive(Clone)]
pub struct ComponentTemplate {
    inner: Arc<TemplateInner>,
}

impl std::fmt::Debug for ComponentTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTemplate")
            .field("contracts", &self.contract_names())
            .field("operations", &self.inner.operations.len())
            .finish()
    }
}

impl ComponentTemplate {
    /// Every operation, in panel order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.inner.operations.iter().map(|slot| &slot.operation)
    }

    pub fn operation(&self, index: usize) -> Option<&Operation> {
        self.inner.operations.get(index).map(|slot| &slot.operation)
    }

    /// Panel index of the first operation named `name`.
    pub fn panel_index(&self, name: &str) -> Option<usize> {
        self.operations().position(|op| op.name == name)
    }

    /// Initial request text of a panel.
    pub fn request_template(&self, index: usize) -> Option<&str> {
        self.inner
            .operations
            .get(index)
            .map(|slot| slot.request_template.as_str())
    }

    pub fn contract_names(&self) -> Vec<&'static str> {
        self.inner.contracts.iter().map(|c| c.name).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.operations.is_empty()
    }

    /// Create a component instance with fresh panel state, bound to the
    /// clients registered in `services`. Must run inside a tokio runtime.
    pub fn mount(&self, services: &Services) -> Result<Component, MountError> {
        let runtime = Handle::try_current().map_err(|_| MountError::NoRuntime)?;

        let mut calls = Vec::with_capacity(self.len());
        for contract in &self.inner.contracts {
            calls.extend(contract.binder.bind(services)?);
        }

        let panels = self
            .inner
            .operations
            .iter()
            .zip(calls)
            .map(|(slot, call)| Panel {
                call,
                state: Mutex::new(PanelState::new(slot.request_template.clone())),
            })
            .collect();

        let metadata = services
            .registered_metadata_provider()
            .unwrap_or_else(|| Arc::new(StaticMetadata(self.inner.default_metadata.clone())));
        let (renders, _) = watch::channel(0);

        info!(panels = self.len(), "component mounted");
        Ok(Component {
            inner: Arc::new(ComponentInner {
                template: self.inner.clone(),
                panels,
                metadata,
                runtime,
                renders,
            }),
        })
    }
}

// ============================================================================
// Mounted component
// ============================================================================

struct PanelState {
    request_text: String,
    response_text: String,
    visible: bool,
    /// Present only while a call is in flight.
    cancellation: Option<CancellationToken>,
    /// Bumped on every execute and clear; stale deliveries compare against it.
    generation: u64,
}

impl PanelState {
    fn new(request_text: String) -> Self {
        Self {
            request_text,
            response_text: String::new(),
            visible: false,
            cancellation: None,
            generation: 0,
        }
    }
}

struct Panel {
    call: PanelCall,
    state: Mutex<PanelState>,
}

struct ComponentInner {
    template: Arc<TemplateInner>,
    panels: Vec<Panel>,
    metadata: Arc<dyn MetadataProvider>,
    runtime: Handle,
    renders: watch::Sender<u64>,
}

impl ComponentInner {
    fn notify_render(&self) {
        self.renders.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Mark the call of `generation` finished, unless a newer call replaced it.
    fn finish_call(&self, index: usize, generation: u64) {
        let Some(panel) = self.panels.get(index) else {
            return;
        };
        {
            let mut state = panel.state.lock();
            if state.generation != generation {
                return;
            }
            state.cancellation = None;
        }
        self.notify_render();
    }
}

/// A mounted component: one panel per operation. Cheap to clone; clones share
/// the same panels.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("panels", &self.inner.panels.len())
            .finish()
    }
}

impl Component {
    pub fn template(&self) -> ComponentTemplate {
        ComponentTemplate {
            inner: self.inner.template.clone(),
        }
    }

    pub fn panel_count(&self) -> usize {
        self.inner.panels.len()
    }

    fn panel(&self, index: usize) -> Result<&Panel, ComponentError> {
        self.inner
            .panels
            .get(index)
            .ok_or(ComponentError::UnknownPanel(index))
    }

    fn operation(&self, index: usize) -> Result<&Operation, ComponentError> {
        self.inner
            .template
            .operations
            .get(index)
            .map(|slot| &slot.operation)
            .ok_or(ComponentError::UnknownPanel(index))
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    /// Start a call with the panel's current request text.
    ///
    /// Any call already in flight on this panel is cancelled first and the
    /// response area is cleared. The call itself runs as a spawned task; this
    /// returns immediately.
    pub fn execute(&self, index: usize) -> Result<(), ComponentError> {
        let panel = self.panel(index)?;
        let operation = self.operation(index)?;

        let (token, generation, request) = {
            let mut state = panel.state.lock();
            if let Some(previous) = state.cancellation.take() {
                debug!(panel = index, operation = %operation.name, "cancelling previous call");
                previous.cancel();
            }
            state.response_text.clear();
            state.generation += 1;
            let token = CancellationToken::new();
            state.cancellation = Some(token.clone());
            (token, state.generation, state.request_text.clone())
        };

        let template = &self.inner.template;
        let invocation = Invocation {
            request,
            options: CallOptions::new()
                .with_metadata(self.inner.metadata.metadata())
                .with_cancellation(token),
            serializer: template.serializer,
            pacing: template.pacing,
            sink: response_sink(Arc::downgrade(&self.inner), index, generation),
        };

        let span = info_span!(
            "rpc_call",
            panel = index,
            operation = %operation.name,
            shape = %operation.shape,
        );
        let call = (panel.call)(invocation);
        let owner = Arc::downgrade(&self.inner);
        self.inner.runtime.spawn(
            async move {
                debug!("call started");
                call.await;
                debug!("call finished");
                if let Some(inner) = owner.upgrade() {
                    inner.finish_call(index, generation);
                }
            }
            .instrument(span),
        );
        Ok(())
    }

    /// Cancel the in-flight call, if any. Text already delivered stays, and the
    /// call's `Cancelled` status is still shown once it unwinds.
    pub fn cancel(&self, index: usize) -> Result<(), ComponentError> {
        let panel = self.panel(index)?;
        let mut state = panel.state.lock();
        if let Some(token) = state.cancellation.take() {
            debug!(panel = index, "call cancelled");
            token.cancel();
        }
        Ok(())
    }

    /// Cancel the in-flight call, if any, and empty the response area. The
    /// cancelled call can no longer write to the panel.
    pub fn clear(&self, index: usize) -> Result<(), ComponentError> {
        let panel = self.panel(index)?;
        let mut state = panel.state.lock();
        if let Some(token) = state.cancellation.take() {
            token.cancel();
        }
        state.generation += 1;
        state.response_text.clear();
        Ok(())
    }

    pub fn toggle_visibility(&self, index: usize) -> Result<(), ComponentError> {
        let panel = self.panel(index)?;
        let mut state = panel.state.lock();
        state.visible = !state.visible;
        Ok(())
    }

    /// Run an action found in the render description.
    pub fn dispatch(&self, action: Action) -> Result<(), ComponentError> {
        match action.kind {
            ActionKind::Execute => self.execute(action.panel),
            ActionKind::Cancel => self.cancel(action.panel),
            ActionKind::Clear => self.clear(action.panel),
            ActionKind::ToggleVisibility => self.toggle_visibility(action.panel),
        }
    }

    /// Apply an edit event from a bound input.
    pub fn input(&self, binding: TwoWayBinding, value: impl Into<String>) -> Result<(), ComponentError> {
        match binding {
            TwoWayBinding::RequestText { panel } => self.set_request_text(panel, value),
        }
    }

    /// Cancel every in-flight call. Panels keep their text.
    pub fn teardown(&self) {
        for (index, panel) in self.inner.panels.iter().enumerate() {
            if let Some(token) = panel.state.lock().cancellation.take() {
                debug!(panel = index, "call cancelled by teardown");
                token.cancel();
            }
        }
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    pub fn set_request_text(&self, index: usize, text: impl Into<String>) -> Result<(), ComponentError> {
        self.panel(index)?.state.lock().request_text = text.into();
        Ok(())
    }

    pub fn request_text(&self, index: usize) -> Result<String, ComponentError> {
        Ok(self.panel(index)?.state.lock().request_text.clone())
    }

    pub fn response_text(&self, index: usize) -> Result<String, ComponentError> {
        Ok(self.panel(index)?.state.lock().response_text.clone())
    }

    pub fn is_visible(&self, index: usize) -> Result<bool, ComponentError> {
        Ok(self.panel(index)?.state.lock().visible)
    }

    pub fn is_in_flight(&self, index: usize) -> Result<bool, ComponentError> {
        Ok(self.panel(index)?.state.lock().cancellation.is_some())
    }

    // ------------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------------

    /// Re-render notifications. The value changes whenever a call delivers
    /// response text or finishes.
    pub fn subscribe_renders(&self) -> watch::Receiver<u64> {
        self.inner.renders.subscribe()
    }

    /// Wait until the panel has no call in flight.
    pub async fn wait_idle(&self, index: usize) -> Result<(), ComponentError> {
        let mut renders = self.subscribe_renders();
        while self.is_in_flight(index)? {
            if renders.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Describe every panel into `sink`.
    pub fn render(&self, sink: &mut dyn RenderSink) {
        let template = &self.inner.template;
        let contracts: Vec<ContractView> = template
            .contracts
            .iter()
            .map(|contract| ContractView {
                name: contract.name,
                panels: (contract.first_panel..contract.first_panel + contract.panel_count)
                    .filter_map(|index| self.panel_view(index))
                    .collect(),
            })
            .collect();
        render_component(sink, &contracts);
    }

    /// Current render description as HTML.
    pub fn markup(&self) -> String {
        let mut sink = MarkupSink::new();
        self.render(&mut sink);
        sink.into_markup()
    }

    fn panel_view(&self, index: usize) -> Option<PanelView> {
        let operation = &self.inner.template.operations.get(index)?.operation;
        let state = self.inner.panels.get(index)?.state.lock();
        Some(PanelView {
            index,
            name: operation.name.clone(),
            shape: operation.shape,
            request_text: state.request_text.clone(),
            response_text: state.response_text.clone(),
            visible: state.visible,
        })
    }
}

/// Sink handed to the invocation layer for one call. Deliveries after the
/// call was replaced by a newer one or cleared are dropped.
fn response_sink(owner: Weak<ComponentInner>, index: usize, generation: u64) -> ResponseSink {
    Arc::new(move |text: String| {
        let Some(inner) = owner.upgrade() else {
            return;
        };
        let Some(panel) = inner.panels.get(index) else {
            return;
        };
        {
            let mut state = panel.state.lock();
            if state.generation != generation {
                debug!(panel = index, "dropping stale delivery");
                return;
            }
            state.response_text = text;
        }
        inner.notify_render();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Member;
    use rpcview_rpc::UnaryCall;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Ping {
        text: String,
    }

    struct EchoClient;

    impl RpcContract for EchoClient {
        fn members() -> Vec<Member<Self>> {
            vec![Member::unary("echo", |_: &Self, req: Ping, _| UnaryCall::ready(req))]
        }
    }

    fn template() -> ComponentTemplate {
        ComponentBuilder::new().contract::<EchoClient>().build().unwrap()
    }

    #[test]
    fn test_build_collects_templates() {
        let template = template();
        assert_eq!(template.len(), 1);
        assert_eq!(template.contract_names(), vec!["EchoClient"]);
        assert_eq!(template.request_template(0), Some("{\n  \"text\": \"\"\n}"));
        assert_eq!(template.panel_index("echo"), Some(0));
    }

    #[test]
    fn test_empty_builder_finds_nothing() {
        let err = ComponentBuilder::new().build().unwrap_err();
        assert!(matches!(err, SynthesisError::NoOperationsFound));
    }

    #[test]
    fn test_mount_needs_runtime() {
        let services = Services::new().with_client(EchoClient);
        let err = template().mount(&services).unwrap_err();
        assert!(matches!(err, MountError::NoRuntime));
    }

    #[tokio::test]
    async fn test_mounts_share_no_state() {
        let template = template();
        let services = Services::new().with_client(EchoClient);
        let a = template.mount(&services).unwrap();
        let b = template.mount(&services).unwrap();
        a.set_request_text(0, "changed").unwrap();
        a.toggle_visibility(0).unwrap();
        assert_eq!(b.request_text(0).unwrap(), "{\n  \"text\": \"\"\n}");
        assert!(!b.is_visible(0).unwrap());
    }

    #[tokio::test]
    async fn test_unknown_panel() {
        let component = template().mount(&Services::new().with_client(EchoClient)).unwrap();
        assert_eq!(component.execute(7), Err(ComponentError::UnknownPanel(7)));
        assert_eq!(component.cancel(1), Err(ComponentError::UnknownPanel(1)));
    }

    #[tokio::test]
    async fn test_input_binding_updates_request_text() {
        let component = template().mount(&Services::new().with_client(EchoClient)).unwrap();
        component
            .input(TwoWayBinding::RequestText { panel: 0 }, r#"{"text":"typed"}"#)
            .unwrap();
        component.execute(0).unwrap();
        component.wait_idle(0).await.unwrap();
        assert!(component.response_text(0).unwrap().contains("typed"));
    }
}
