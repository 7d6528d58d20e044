//! Per-request context passed to tool calls.

use crate::logging::Logger;

/// Per-request context: the logger named after the tool being called.
#[derive(Clone)]
pub struct ToolContext {
    pub logger: Logger,
}

impl ToolContext {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}
