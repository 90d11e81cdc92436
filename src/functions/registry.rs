use serde_json::{Map, Value};

use crate::api::ChatToolDefinition;
use crate::core::error::FunctionError;
use crate::functions::schema::{FunctionDescriptor, JsonType};

type InvokeThunk = Box<dyn Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync>;

enum Invocation {
    /// Capability-erased thunk captured at registration time.
    Thunk(InvokeThunk),
    /// Schema only; an external orchestrator executes the call.
    Declarative,
}

struct FunctionEntry {
    descriptor: FunctionDescriptor,
    invocation: Invocation,
}

/// Catalog of invocable functions, their schemas, and invocation thunks.
///
/// Populated once per session (or turn) before any parser is constructed and
/// read-only during parsing; multiple parser instances may share it by
/// reference.
#[derive(Default)]
pub struct FunctionRegistry {
    entries: Vec<FunctionEntry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable function. The thunk receives arguments already
    /// coerced to the declared parameter types, in declaration order.
    pub fn register<F>(&mut self, descriptor: FunctionDescriptor, thunk: F) -> Result<(), FunctionError>
    where
        F: Fn(Vec<Value>) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.insert(descriptor, Invocation::Thunk(Box::new(thunk)))
    }

    /// Registers a schema-only descriptor for a host-declared pseudo-function
    /// executed by the orchestrator rather than the registry.
    pub fn register_declarative(
        &mut self,
        descriptor: FunctionDescriptor,
    ) -> Result<(), FunctionError> {
        self.insert(descriptor, Invocation::Declarative)
    }

    fn insert(
        &mut self,
        descriptor: FunctionDescriptor,
        invocation: Invocation,
    ) -> Result<(), FunctionError> {
        let name = descriptor.effective_name();
        if self.entries.iter().any(|e| e.descriptor.effective_name() == name) {
            return Err(FunctionError::AlreadyRegistered(name.to_string()));
        }
        self.entries.push(FunctionEntry {
            descriptor,
            invocation,
        });
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<&FunctionEntry, FunctionError> {
        self.entries
            .iter()
            .find(|e| e.descriptor.effective_name() == name)
            .ok_or_else(|| FunctionError::NotFound(name.to_string()))
    }

    pub fn resolve(&self, name: &str) -> Result<&FunctionDescriptor, FunctionError> {
        self.entry(name).map(|e| &e.descriptor)
    }

    /// Case-insensitive lookup returning the canonical registered name.
    pub fn resolve_ci(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .map(|e| e.descriptor.effective_name())
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Registered names ordered by descending length, so prefix matching can
    /// scan longest-first and the longest exact match wins.
    pub fn names_by_length_desc(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .map(|e| e.descriptor.effective_name())
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names
    }

    /// Wire definitions for every registered function, in registration order.
    pub fn tool_definitions(&self) -> Vec<ChatToolDefinition> {
        self.entries
            .iter()
            .map(|e| e.descriptor.to_tool_definition())
            .collect()
    }

    /// Maps an invoke event's named arguments onto declared parameter order.
    /// Unknown keys are ignored; parameters absent from the map become null.
    pub fn positional_args(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Vec<Value>, FunctionError> {
        let descriptor = self.resolve(name)?;
        Ok(descriptor
            .parameters()
            .iter()
            .map(|parameter| arguments.get(&parameter.name).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// Invokes a callable entry with positional arguments in declared
    /// parameter order, coercing each value to its declared type first.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, FunctionError> {
        let entry = self.entry(name)?;
        let thunk = match &entry.invocation {
            Invocation::Thunk(thunk) => thunk,
            Invocation::Declarative => {
                return Err(FunctionError::UnsupportedOperation(name.to_string()))
            }
        };
        let parameters = entry.descriptor.parameters();
        if args.len() > parameters.len() {
            return Err(FunctionError::MalformedArguments {
                function: name.to_string(),
                detail: format!(
                    "expected at most {} arguments, got {}",
                    parameters.len(),
                    args.len()
                ),
            });
        }
        let coerced = args
            .into_iter()
            .zip(parameters)
            .map(|(value, parameter)| {
                coerce(value, parameter.json_type).map_err(|detail| {
                    FunctionError::MalformedArguments {
                        function: name.to_string(),
                        detail: format!("parameter \"{}\": {detail}", parameter.name),
                    }
                })
            })
            .collect::<Result<Vec<Value>, FunctionError>>()?;
        thunk(coerced)
    }
}

/// Deserializes a loosely-typed JSON value into the parameter's exact
/// declared type. Null passes through untouched for optional parameters.
fn coerce(value: Value, target: JsonType) -> Result<Value, String> {
    if value.is_null() {
        return Ok(value);
    }
    match target {
        JsonType::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("cannot convert {other} to string")),
        },
        JsonType::Boolean => match value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(format!("cannot convert \"{s}\" to boolean")),
            },
            other => Err(format!("cannot convert {other} to boolean")),
        },
        JsonType::Integer => match &value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        Ok(Value::from(f as i64))
                    } else {
                        Err(format!("{f} has a fractional part"))
                    }
                } else {
                    Err(format!("{n} is out of integer range"))
                }
            }
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("cannot convert \"{s}\" to integer")),
            other => Err(format!("cannot convert {other} to integer")),
        },
        JsonType::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("cannot convert \"{s}\" to number")),
            other => Err(format!("cannot convert {other} to number")),
        },
        JsonType::Array => match value {
            Value::Array(_) => Ok(value),
            other => Err(format!("cannot convert {other} to array")),
        },
        JsonType::Object => match value {
            Value::Object(_) => Ok(value),
            other => Err(format!("cannot convert {other} to object")),
        },
    }
}
