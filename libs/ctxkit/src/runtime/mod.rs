mod hierarchy;
mod host_runtime;
mod runner;

pub use hierarchy::{ContextHierarchy, HierarchyError};
pub use host_runtime::HostRuntime;
pub use runner::{run, RunOptions, ShutdownOptions};
