//! Line-oriented transport between stdio and the pipeline.

pub mod framing;
pub mod stdio;

pub use framing::{Command, PositionResult};
pub use stdio::StdioTransport;
