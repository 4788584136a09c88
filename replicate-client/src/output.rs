use serde_json::Value;

/// Raw `output` field of a finished prediction.
///
/// Image models return an array of URLs, language models an array of streamed
/// text chunks; both are exposed here without the caller caring which.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput(Value);

impl ModelOutput {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// First element of an array output, or the output itself
    pub fn first(&self) -> &Value {
        match &self.0 {
            Value::Array(items) => items.first().unwrap_or(&Value::Null),
            other => other,
        }
    }

    /// Array outputs joined with no separator, strings as-is, anything else as JSON text
    pub fn text(&self) -> String {
        match &self.0 {
            Value::Array(items) => items.iter().map(value_text).collect(),
            other => value_text(other),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
