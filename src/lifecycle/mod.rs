//! Process lifecycle: one shutdown scope shared by every long-running task.

pub mod shutdown;

pub use shutdown::Shutdown;
