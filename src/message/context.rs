//! Per-request session context.

use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifies one request as it moves through the gateway.
#[derive(Debug, Clone)]
pub struct SessionContext {
    id: Uuid,
    started: Instant,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Time since ingress created the context.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.id)
    }
}
