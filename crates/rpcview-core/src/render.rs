//! Render description: the instruction stream a host UI tree-builder consumes.
//!
//! A component never draws anything itself. It describes its panels as a flat
//! sequence of open/close/attribute/content instructions into a
//! [`RenderSink`]; the host's renderer does the rest. Two sinks ship with the
//! crate: [`RecordingSink`] keeps the raw instructions (tests, diffing hosts)
//! and [`MarkupSink`] turns them into HTML text.

use std::fmt::Write as _;

/// Source-position key of an instruction. Stable across renders so a
/// diffing renderer can match nodes.
pub type Sequence = u32;

// ============================================================================
// Attribute values
// ============================================================================

/// Per-panel user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Execute,
    Cancel,
    Clear,
    ToggleVisibility,
}

/// An action bound to one panel, ready to be dispatched back to the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Action {
    pub panel: usize,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(panel: usize, kind: ActionKind) -> Self {
        Self { panel, kind }
    }
}

/// Two-way binding target. Edit events on the bound input write straight back
/// into the panel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwoWayBinding {
    RequestText { panel: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    /// Event callback (e.g. `onclick`).
    Action(Action),
    /// Edit callback coupled to a state slot (e.g. `oninput`).
    Binding(TwoWayBinding),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<Action> for AttributeValue {
    fn from(action: Action) -> Self {
        AttributeValue::Action(action)
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Structured tree-builder interface.
pub trait RenderSink {
    fn open_region(&mut self, seq: Sequence);
    fn close_region(&mut self);
    fn open_element(&mut self, seq: Sequence, tag: &str);
    fn close_element(&mut self);
    fn add_attribute(&mut self, seq: Sequence, name: &str, value: AttributeValue);
    /// Plain text; the sink is responsible for escaping it.
    fn add_content(&mut self, seq: Sequence, text: &str);
    /// Literal markup, inserted as-is.
    fn add_markup(&mut self, seq: Sequence, markup: &str);
}

/// One recorded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFrame {
    OpenRegion(Sequence),
    CloseRegion,
    OpenElement { seq: Sequence, tag: String },
    CloseElement,
    Attribute { seq: Sequence, name: String, value: AttributeValue },
    Content { seq: Sequence, text: String },
    Markup { seq: Sequence, markup: String },
}

/// Sink that keeps every instruction in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    frames: Vec<RenderFrame>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RenderFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RenderFrame> {
        self.frames
    }

    /// Sequences of every opened region, in order.
    pub fn regions(&self) -> Vec<Sequence> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                RenderFrame::OpenRegion(seq) => Some(*seq),
                _ => None,
            })
            .collect()
    }

    /// First action attribute `attribute` on an element whose class list
    /// contains every one of `classes`.
    pub fn find_action(&self, classes: &[&str], attribute: &str) -> Option<Action> {
        self.walk_elements(|element| {
            if !element.has_classes(classes) {
                return None;
            }
            element.attributes.iter().find_map(|(name, value)| match value {
                AttributeValue::Action(action) if name == attribute => Some(*action),
                _ => None,
            })
        })
    }

    /// Concatenated direct text content of the first element carrying every
    /// one of `classes`.
    pub fn content_of(&self, classes: &[&str]) -> Option<String> {
        self.walk_elements(|element| element.has_classes(classes).then(|| element.text.clone()))
    }

    /// Text value of attribute `attribute` on the first element carrying every
    /// one of `classes`.
    pub fn attribute_of(&self, classes: &[&str], attribute: &str) -> Option<String> {
        self.walk_elements(|element| {
            if !element.has_classes(classes) {
                return None;
            }
            element.attributes.iter().find_map(|(name, value)| match value {
                AttributeValue::Text(text) if name == attribute => Some(text.clone()),
                _ => None,
            })
        })
    }

    /// Rebuild elements from the flat stream and hand each closed element to
    /// `visit` until it returns a value.
    fn walk_elements<T>(&self, mut visit: impl FnMut(&RecordedElement) -> Option<T>) -> Option<T> {
        let mut stack: Vec<RecordedElement> = Vec::new();
        for frame in &self.frames {
            match frame {
                RenderFrame::OpenElement { .. } => stack.push(RecordedElement::default()),
                RenderFrame::Attribute { name, value, .. } => {
                    if let Some(element) = stack.last_mut() {
                        element.attributes.push((name.clone(), value.clone()));
                    }
                }
                RenderFrame::Content { text, .. } => {
                    if let Some(element) = stack.last_mut() {
                        element.text.push_str(text);
                    }
                }
                RenderFrame::CloseElement => {
                    if let Some(found) = stack.pop().and_then(|element| visit(&element)) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[derive(Default)]
struct RecordedElement {
    attributes: Vec<(String, AttributeValue)>,
    text: String,
}

impl RecordedElement {
    fn has_classes(&self, classes: &[&str]) -> bool {
        self.attributes.iter().any(|(name, value)| match value {
            AttributeValue::Text(list) if name == "class" => {
                classes.iter().all(|c| list.split_whitespace().any(|have| have == *c))
            }
            _ => false,
        })
    }
}

impl RenderSink for RecordingSink {
    fn open_region(&mut self, seq: Sequence) {
        self.frames.push(RenderFrame::OpenRegion(seq));
    }

    fn close_region(&mut self) {
        self.frames.push(RenderFrame::CloseRegion);
    }

    fn open_element(&mut self, seq: Sequence, tag: &str) {
        self.frames.push(RenderFrame::OpenElement {
            seq,
            tag: tag.to_string(),
        });
    }

    fn close_element(&mut self) {
        self.frames.push(RenderFrame::CloseElement);
    }

    fn add_attribute(&mut self, seq: Sequence, name: &str, value: AttributeValue) {
        self.frames.push(RenderFrame::Attribute {
            seq,
            name: name.to_string(),
            value,
        });
    }

    fn add_content(&mut self, seq: Sequence, text: &str) {
        self.frames.push(RenderFrame::Content {
            seq,
            text: text.to_string(),
        });
    }

    fn add_markup(&mut self, seq: Sequence, markup: &str) {
        self.frames.push(RenderFrame::Markup {
            seq,
            markup: markup.to_string(),
        });
    }
}

// ============================================================================
// Markup
// ============================================================================

/// Sink producing HTML text. Callback and binding attributes have no textual
/// form and are left out.
#[derive(Debug, Default)]
pub struct MarkupSink {
    out: String,
    open_tags: Vec<String>,
    start_tag_pending: bool,
}

impl MarkupSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markup(&self) -> &str {
        &self.out
    }

    pub fn into_markup(self) -> String {
        self.out
    }

    fn finish_start_tag(&mut self) {
        if self.start_tag_pending {
            self.out.push('>');
            self.start_tag_pending = false;
        }
    }
}

impl RenderSink for MarkupSink {
    fn open_region(&mut self, _seq: Sequence) {}

    fn close_region(&mut self) {}

    fn open_element(&mut self, _seq: Sequence, tag: &str) {
        self.finish_start_tag();
        let _ = write!(self.out, "<{tag}");
        self.open_tags.push(tag.to_string());
        self.start_tag_pending = true;
    }

    fn close_element(&mut self) {
        self.finish_start_tag();
        if let Some(tag) = self.open_tags.pop() {
            let _ = write!(self.out, "</{tag}>");
        }
    }

    fn add_attribute(&mut self, _seq: Sequence, name: &str, value: AttributeValue) {
        if !self.start_tag_pending {
            return;
        }
        if let AttributeValue::Text(text) = value {
            let _ = write!(
                self.out,
                " {name}=\"{}\"",
                html_escape::encode_double_quoted_attribute(&text)
            );
        }
    }

    fn add_content(&mut self, _seq: Sequence, text: &str) {
        self.finish_start_tag();
        self.out.push_str(&html_escape::encode_text(text));
    }

    fn add_markup(&mut self, _seq: Sequence, markup: &str) {
        self.finish_start_tag();
        self.out.push_str(markup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(sink: &mut dyn RenderSink) {
        sink.open_element(0, "button");
        sink.add_attribute(1, "class", "requestButton execute".into());
        sink.add_attribute(2, "onclick", Action::new(3, ActionKind::Execute).into());
        sink.add_content(3, "Run <now>");
        sink.close_element();
    }

    #[test]
    fn test_markup_escapes_and_skips_callbacks() {
        let mut sink = MarkupSink::new();
        button(&mut sink);
        assert_eq!(
            sink.markup(),
            "<button class=\"requestButton execute\">Run &lt;now&gt;</button>"
        );
    }

    #[test]
    fn test_markup_nests_elements() {
        let mut sink = MarkupSink::new();
        sink.open_region(0);
        sink.open_element(0, "div");
        sink.add_markup(1, "<p>hi</p>");
        sink.open_element(2, "pre");
        sink.close_element();
        sink.close_element();
        sink.close_region();
        assert_eq!(sink.into_markup(), "<div><p>hi</p><pre></pre></div>");
    }

    #[test]
    fn test_recording_finds_actions_by_class() {
        let mut sink = RecordingSink::new();
        button(&mut sink);
        assert_eq!(
            sink.find_action(&["execute"], "onclick"),
            Some(Action::new(3, ActionKind::Execute))
        );
        assert_eq!(sink.find_action(&["cancel"], "onclick"), None);
        assert_eq!(sink.content_of(&["requestButton"]).as_deref(), Some("Run <now>"));
    }

    #[test]
    fn test_markup_escapes_attribute_quotes() {
        let mut sink = MarkupSink::new();
        sink.open_element(0, "textarea");
        sink.add_attribute(1, "value", r#"{"name": "<a> & b"}"#.into());
        sink.close_element();
        assert_eq!(
            sink.into_markup(),
            "<textarea value=\"{&quot;name&quot;: &quot;&lt;a&gt; &amp; b&quot;}\"></textarea>"
        );
    }
}
