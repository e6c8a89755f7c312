//! Request Context
//!
//! Context carried from the HTTP boundary down through the service and
//! the store. Holds the request id and the deadline every store call
//! must honor.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Context carried through every service and store call
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    /// Instant after which the request must be abandoned
    deadline: Instant,
}

impl RequestContext {
    /// Create a context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Create a context with an explicit deadline
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            deadline,
        }
    }

    /// The deadline of this request
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, `None` once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|d| !d.is_zero())
    }
}
