use crate::llm::tools::ToolCall;

/// Assistant message returned by chat models.
#[derive(Debug, Clone)]
pub struct AIMessage {
    /// Natural language content.
    pub content: String,
    /// Tool call requests emitted by the model, if any.
    pub tool_calls: Vec<ToolCall>,
}
