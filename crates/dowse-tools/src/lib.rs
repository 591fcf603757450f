mod registry;
mod tool;
mod builtin;

pub use registry::{RegistryError, ToolRegistry, ToolRegistryBuilder};
pub use tool::{Tool, ToolError, ToolInput};
pub use builtin::{func::FnTool, shell::ShellTool};
