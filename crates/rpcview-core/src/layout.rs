//! Panel layout: how a component describes itself to a [`RenderSink`].
//!
//! ```text
//! div.clients
//! └─ div.client                      (one per contract)
//!    ├─ div.clientHeader / div.clientDescription
//!    └─ div.clientMethods
//!       └─ region(panel index)       (one per operation)
//!          └─ div.methodData
//!             ├─ div.methodHeader    onclick → toggle visibility
//!             └─ div.methodBody      "hidden" unless visible
//!                ├─ textarea.requestValue   value + oninput binding
//!                ├─ button execute / clear / cancel
//!                └─ pre.responseValue
//! ```
//!
//! Shared blocks number their instructions with a running counter. Inside a
//! panel region the numbering restarts at zero, so every panel has the same
//! sequence layout regardless of how many came before it.

use crate::classify::CallShape;
use crate::constants::CONTRACT_DESCRIPTION;
use crate::render::{Action, ActionKind, AttributeValue, RenderSink, Sequence, TwoWayBinding};

/// Snapshot of one panel taken for a single render pass.
#[derive(Debug, Clone)]
pub(crate) struct PanelView {
    pub index: usize,
    pub name: String,
    pub shape: CallShape,
    pub request_text: String,
    pub response_text: String,
    pub visible: bool,
}

/// Panels of one contract, in discovery order.
#[derive(Debug, Clone)]
pub(crate) struct ContractView {
    pub name: &'static str,
    pub panels: Vec<PanelView>,
}

pub(crate) fn render_component(sink: &mut dyn RenderSink, contracts: &[ContractView]) {
    let mut seq: Sequence = 0;
    let mut next = || {
        let current = seq;
        seq += 1;
        current
    };

    sink.open_element(next(), "div");
    sink.add_attribute(next(), "class", "clients".into());

    for contract in contracts {
        sink.open_element(next(), "div");
        sink.add_attribute(next(), "class", "client".into());
        let header = html_escape::encode_text(contract.name);
        sink.add_markup(next(), &format!("<div class=\"clientHeader\">{header}</div>"));
        sink.add_markup(
            next(),
            &format!("<div class=\"clientDescription\">{CONTRACT_DESCRIPTION}</div>"),
        );
        sink.open_element(next(), "div");
        sink.add_attribute(next(), "class", "clientMethods".into());

        for panel in &contract.panels {
            render_panel(sink, panel);
        }

        sink.close_element();
        sink.close_element();
    }

    sink.close_element();
}

fn render_panel(sink: &mut dyn RenderSink, panel: &PanelView) {
    let class = panel.shape.css_class();
    let action = |kind| AttributeValue::Action(Action::new(panel.index, kind));

    sink.open_region(panel.index as Sequence);

    sink.open_element(0, "div");
    sink.add_attribute(1, "class", format!("methodData {class}").into());

    sink.open_element(2, "div");
    sink.add_attribute(3, "class", "methodHeader".into());
    sink.add_attribute(4, "onclick", action(ActionKind::ToggleVisibility));
    sink.add_markup(
        5,
        &format!("<div class=\"methodType {class}\">{}</div>", panel.shape.label()),
    );
    let name = html_escape::encode_text(&panel.name);
    sink.add_markup(6, &format!("<div class=\"methodDescription\">{name} method</div>"));
    sink.close_element();

    let body_class = if panel.visible {
        format!("methodBody {class}")
    } else {
        format!("methodBody {class} hidden")
    };
    sink.open_element(7, "div");
    sink.add_attribute(8, "class", body_class.into());
    sink.add_markup(9, "<p class=\"requestLabel\">Request values: </p>");

    sink.open_element(10, "textarea");
    sink.add_attribute(11, "class", format!("requestValue {class}").into());
    sink.add_attribute(12, "value", panel.request_text.clone().into());
    sink.add_attribute(
        13,
        "oninput",
        AttributeValue::Binding(TwoWayBinding::RequestText { panel: panel.index }),
    );
    sink.close_element();

    let buttons = [
        (14, "execute", "Execute", ActionKind::Execute),
        (18, "clear", "Clear", ActionKind::Clear),
        (22, "cancel", "Cancel", ActionKind::Cancel),
    ];
    for (base, role, caption, kind) in buttons {
        sink.open_element(base, "button");
        sink.add_attribute(base + 1, "class", format!("requestButton {role} {class}").into());
        sink.add_attribute(base + 2, "onclick", action(kind));
        sink.add_markup(base + 3, caption);
        sink.close_element();
    }

    sink.add_markup(26, "<p class=\"responseLabel\">Response value: </p>");
    sink.open_element(27, "pre");
    sink.add_attribute(28, "class", format!("responseValue {class}").into());
    sink.add_content(29, &panel.response_text);
    sink.close_element();

    sink.close_element();
    sink.close_element();
    sink.close_region();
}
