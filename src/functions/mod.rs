pub mod registry;
pub mod schema;

pub use registry::FunctionRegistry;
pub use schema::{FunctionDescriptor, JsonType, ParameterSpec};
