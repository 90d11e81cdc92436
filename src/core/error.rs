use std::error::Error;
use std::fmt;

/// Errors raised by the function registry.
///
/// `NotFound` and `UnsupportedOperation` indicate a registry/parser mismatch
/// and are fatal to the calling turn; retrying the turn cannot fix them.
#[derive(Debug)]
pub enum FunctionError {
    /// No function with the given name is registered.
    NotFound(String),
    /// Invocation was attempted on a declarative-only entry.
    UnsupportedOperation(String),
    /// A function with the given name is already registered.
    AlreadyRegistered(String),
    /// An argument value could not be coerced to the declared parameter type.
    MalformedArguments { function: String, detail: String },
}

impl fmt::Display for FunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionError::NotFound(name) => write!(f, "function \"{name}\" not found"),
            FunctionError::UnsupportedOperation(name) => {
                write!(f, "function \"{name}\" is declarative-only and cannot be invoked")
            }
            FunctionError::AlreadyRegistered(name) => {
                write!(f, "function \"{name}\" is already registered")
            }
            FunctionError::MalformedArguments { function, detail } => {
                write!(f, "malformed arguments for \"{function}\": {detail}")
            }
        }
    }
}

impl Error for FunctionError {}

/// Errors raised while interpreting a provider stream.
#[derive(Debug)]
pub enum ParseError {
    /// Accumulated function-call argument text failed to parse as a JSON
    /// object at call-completion time. A malformed call cannot be safely
    /// dispatched, so this is surfaced to the caller rather than swallowed.
    MalformedArguments {
        function: String,
        source: serde_json::Error,
    },
    /// A content payload type cannot be represented where only text is
    /// supported.
    UnsupportedContent(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedArguments { function, source } => {
                write!(f, "malformed arguments for \"{function}\": {source}")
            }
            ParseError::UnsupportedContent(kind) => {
                write!(f, "unsupported content type: {kind}")
            }
        }
    }
}

impl Error for ParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseError::MalformedArguments { source, .. } => Some(source),
            ParseError::UnsupportedContent(_) => None,
        }
    }
}
