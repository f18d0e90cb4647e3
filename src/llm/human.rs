use serde_json::Value;

/// User message wrapper.
#[derive(Debug, Clone)]
pub struct HumanMessage {
    /// Plain-text message content.
    pub content: String,
}

impl HumanMessage {
    /// Creates a plain-text human message.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Converts the message to JSON wire format.
    pub fn to_json(&self) -> Value {
        Value::String(self.content.clone())
    }
}
