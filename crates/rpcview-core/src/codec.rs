//! Text ⇄ typed value conversion for request and response payloads.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serialization configuration shared by every panel of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerOptions {
    /// Pretty-print JSON with indentation.
    pub pretty: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl SerializerOptions {
    pub fn to_text<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
    }

    pub fn from_text<T: DeserializeOwned>(&self, text: &str) -> serde_json::Result<T> {
        serde_json::from_str(text)
    }
}

/// Request template for single-request shapes: one default value.
pub(crate) fn single_template<T>(options: &SerializerOptions) -> serde_json::Result<String>
where
    T: Default + Serialize,
{
    options.to_text(&T::default())
}

/// Request template for streaming-request shapes: a one-element list.
pub(crate) fn list_template<T>(options: &SerializerOptions) -> serde_json::Result<String>
where
    T: Default + Serialize,
{
    options.to_text(&vec![T::default()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Serialize, Deserialize, Debug, PartialEq)]
    struct HelloRequest {
        name: String,
        count: u32,
    }

    #[test]
    fn test_single_template_is_pretty_default() {
        let text = single_template::<HelloRequest>(&SerializerOptions::default()).unwrap();
        assert_eq!(text, "{\n  \"name\": \"\",\n  \"count\": 0\n}");
    }

    #[test]
    fn test_list_template_has_one_element() {
        let options = SerializerOptions { pretty: false };
        let text = list_template::<HelloRequest>(&options).unwrap();
        assert_eq!(text, r#"[{"name":"","count":0}]"#);
        let parsed: Vec<HelloRequest> = options.from_text(&text).unwrap();
        assert_eq!(parsed, vec![HelloRequest::default()]);
    }
}
