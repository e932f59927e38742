//! Tool registry and built-in tools.

mod builtin;
mod registry;

pub use builtin::builtin_registry;
pub use registry::{ToolDef, ToolFn, ToolRegistry};
