use serde_json::{json, Map, Value};

use crate::api::{ChatToolDefinition, ChatToolFunction};

/// JSON-schema primitive a parameter or return value maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    String,
    Boolean,
    Number,
    Integer,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Boolean => "boolean",
            JsonType::Number => "number",
            JsonType::Integer => "integer",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub json_type: JsonType,
    pub description: String,
    pub enum_values: Vec<String>,
    pub required: bool,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, json_type: JsonType) -> Self {
        Self {
            name: name.into(),
            json_type,
            description: String::new(),
            enum_values: Vec::new(),
            required: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn enum_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema describing a callable function, independent of how it is invoked.
///
/// Construction is deterministic: building the same descriptor twice yields
/// structurally equal values, which matters because schemas are re-sent to
/// the model on every turn.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    name: String,
    display_name: Option<String>,
    description: String,
    parameters: Vec<ParameterSpec>,
    return_type: JsonType,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: String::new(),
            parameters: Vec::new(),
            return_type: JsonType::Object,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Name shown to the model instead of the registry key.
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Appends a parameter. Parameter names are unique within a descriptor;
    /// a duplicate replaces the earlier declaration in place.
    pub fn parameter(mut self, parameter: ParameterSpec) -> Self {
        if let Some(existing) = self
            .parameters
            .iter_mut()
            .find(|spec| spec.name == parameter.name)
        {
            *existing = parameter;
        } else {
            self.parameters.push(parameter);
        }
        self
    }

    pub fn return_type(mut self, return_type: JsonType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name the model sees: the display name if set, else the registry key.
    pub fn effective_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn returns(&self) -> JsonType {
        self.return_type
    }

    /// Renders the `{type, properties, required}` parameter schema expected
    /// by function-calling APIs.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in &self.parameters {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(parameter.json_type.as_str()));
            if !parameter.description.is_empty() {
                property.insert("description".to_string(), json!(parameter.description));
            }
            if !parameter.enum_values.is_empty() {
                property.insert("enum".to_string(), json!(parameter.enum_values));
            }
            properties.insert(parameter.name.clone(), Value::Object(property));
            if parameter.required {
                required.push(parameter.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Renders the full wire definition sent with a chat request.
    pub fn to_tool_definition(&self) -> ChatToolDefinition {
        ChatToolDefinition {
            kind: "function".to_string(),
            function: ChatToolFunction {
                name: self.effective_name().to_string(),
                description: if self.description.is_empty() {
                    None
                } else {
                    Some(self.description.clone())
                },
                parameters: self.parameters_schema(),
            },
        }
    }
}
