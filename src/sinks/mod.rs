//! Pluggable destinations that durably record events.

mod console;
mod file;
mod memory;
mod sink;

pub use console::ConsoleSink;
pub use file::JsonlFileSink;
pub use memory::MemorySink;
pub use sink::Sink;
