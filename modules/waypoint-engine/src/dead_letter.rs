use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use waypoint_events::Event;

use crate::bus::RuleId;
use crate::traits::DeadLetterSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The handler returned an error.
    Error(String),
    /// The handler did not finish within the bus timeout.
    TimedOut(Duration),
    /// The handler panicked.
    Panicked(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Error(e) => write!(f, "error: {e}"),
            FailureReason::TimedOut(d) => write!(f, "timed out after {}ms", d.as_millis()),
            FailureReason::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// One failed handler invocation.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub rule: RuleId,
    pub handler: String,
    pub event: Event,
    pub reason: FailureReason,
    pub failed_at: DateTime<Utc>,
}

/// In-memory sink for testing and inspection.
#[derive(Default)]
pub struct MemoryDeadLetters {
    letters: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded letters (for test assertions).
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl DeadLetterSink for MemoryDeadLetters {
    fn record(&self, letter: DeadLetter) {
        if let Ok(mut letters) = self.letters.lock() {
            letters.push(letter);
        }
    }
}
