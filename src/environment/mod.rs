//! Environment Manager Module
//!
//! Handles integration with conda/mamba/micromamba: locating the binary,
//! building its command lines and reading its environment registry.

pub mod commands;
pub mod registry;
pub mod tool;

pub use commands::ManagerCommands;
pub use registry::{env_exists, parse_env_list, ActiveEnvStack, EnvEntry};
pub use tool::{resolve_tool, ToolKind, ToolLocation, ToolLocator, ToolSource};
