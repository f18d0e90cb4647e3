use std::error::Error;
use std::fmt;

use serde_json::{json, Map, Value};

/// One declared function parameter.
///
/// `default` uses `None` as the "no default declared" sentinel, so a declared
/// falsy default (0, "", false) still marks the parameter optional.
#[derive(Debug, Clone)]
pub struct ToolParam {
    /// Parameter name.
    pub name: String,
    /// Declared type name. `None` renders as "any".
    pub type_name: Option<String>,
    /// Declared default value, if any.
    pub default: Option<Value>,
}

impl ToolParam {
    /// Builds a typed parameter with no default.
    pub fn required(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            default: None,
        }
    }

    /// Builds a typed parameter carrying a declared default.
    pub fn optional(
        name: impl Into<String>,
        type_name: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            default: Some(default),
        }
    }

    /// Builds a parameter with no type annotation and no default.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            default: None,
        }
    }

    /// Attaches a declared default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Declared surface of one callable function.
#[derive(Debug, Clone)]
pub struct ToolFunction {
    /// Function name.
    pub name: String,
    /// Function description. `None` serializes as JSON null, never "".
    pub description: Option<String>,
    /// Parameter definitions, in declaration order.
    pub params: Vec<ToolParam>,
}

impl ToolFunction {
    /// Creates a function definition with no description and no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: Vec::new(),
        }
    }

    /// Sets the function description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends one parameter definition.
    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.params.push(param);
        self
    }

    fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut param_def = Map::new();
            param_def.insert(
                "type".to_string(),
                Value::String(
                    param
                        .type_name
                        .clone()
                        .unwrap_or_else(|| "any".to_string()),
                ),
            );
            param_def.insert(
                "default".to_string(),
                param.default.clone().unwrap_or(Value::Null),
            );
            properties.insert(param.name.clone(), Value::Object(param_def));
            if param.default.is_none() {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String("object".to_string()));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), Value::Array(required));
        Value::Object(schema)
    }
}

/// Tool wrapper matching the chat-completions function-calling schema.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Function declaration.
    pub function: ToolFunction,
}

impl ToolDefinition {
    /// Wraps a function definition as a tool.
    pub fn from_function(function: ToolFunction) -> Self {
        Self { function }
    }

    /// Serializes the tool declaration to JSON.
    pub fn to_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.function.name,
                "description": self.function.description,
                "parameters": self.function.to_schema(),
            }
        })
    }
}

/// Tool call emitted by a model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Provider-generated call id.
    pub id: String,
    /// Tool/function name.
    pub name: String,
    /// Arguments payload.
    pub args: Value,
}

impl ToolCall {
    /// Arguments rendered as the wire string form.
    pub fn args_as_string(&self) -> String {
        match &self.args {
            Value::String(value) => value.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
        }
    }

    /// Serializes a tool call payload to provider JSON format.
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.args_as_string(),
            }
        })
    }
}

/// Errors at the tool registration and dispatch boundary.
#[derive(Debug)]
pub enum ToolError {
    /// A tool call named a function absent from the registry.
    UnknownTool { name: String },
    /// A second tool was registered under an existing name.
    DuplicateTool { name: String },
    /// The call's arguments payload was not a JSON object.
    MalformedArguments { tool: String },
    /// A required argument was absent from the payload.
    MissingArgument { tool: String, param: String },
    /// An argument was present but had the wrong shape.
    InvalidArgument {
        tool: String,
        param: String,
        expected: &'static str,
    },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTool { name } => write!(f, "unknown tool '{name}'"),
            Self::DuplicateTool { name } => write!(f, "tool '{name}' is already registered"),
            Self::MalformedArguments { tool } => {
                write!(f, "tool '{tool}' arguments are not a JSON object")
            }
            Self::MissingArgument { tool, param } => {
                write!(f, "tool '{tool}' is missing required argument '{param}'")
            }
            Self::InvalidArgument {
                tool,
                param,
                expected,
            } => write!(f, "tool '{tool}' argument '{param}' is not a {expected}"),
        }
    }
}

impl Error for ToolError {}

/// Handler invoked when a registered tool is dispatched.
pub type ToolHandler = Box<dyn Fn(&Map<String, Value>) -> Result<Value, ToolError> + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Closed mapping from tool name to handler.
///
/// Names are validated at registration time; dispatching an unregistered
/// name is a defined error.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registers a tool definition with its handler.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: ToolHandler,
    ) -> Result<(), ToolError> {
        let name = &definition.function.name;
        if self.tools.iter().any(|tool| tool.definition.function.name == *name) {
            return Err(ToolError::DuplicateTool { name: name.clone() });
        }
        self.tools.push(RegisteredTool {
            definition,
            handler,
        });
        Ok(())
    }

    /// Returns the registered definitions, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition.clone()).collect()
    }

    /// Looks up the call's function name and invokes its handler.
    pub fn dispatch(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.definition.function.name == call.name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
            })?;
        let args = call
            .args
            .as_object()
            .ok_or_else(|| ToolError::MalformedArguments {
                tool: call.name.clone(),
            })?;
        (tool.handler)(args)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tool has been registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Extracts a numeric argument from a dispatch payload.
pub fn number_arg(tool: &str, args: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
    let value = args.get(name).ok_or_else(|| ToolError::MissingArgument {
        tool: tool.to_string(),
        param: name.to_string(),
    })?;
    value.as_f64().ok_or_else(|| ToolError::InvalidArgument {
        tool: tool.to_string(),
        param: name.to_string(),
        expected: "number",
    })
}
