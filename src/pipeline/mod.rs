//! Pipeline module - prompt construction, retry policy and the checkpointed processor.

mod processor;
mod prompt;
mod retry;

pub use processor::*;
pub use prompt::*;
pub use retry::*;
