mod in_memory;
mod log;

pub use in_memory::InMemoryLog;
pub use in_memory::InMemoryLogFactory;
pub use log::Log;
pub use log::LogFactory;
