//! Event bus.
//!
//! Rules pair a declarative `EventPattern` with a `Handler`. Publishing an
//! event runs every matching handler concurrently in its own task; events a
//! handler returns re-enter the bus. Handlers are isolated: one failing,
//! timing out, or panicking never affects the others.
//!
//! There is no retry. Failed invocations are logged and optionally handed to
//! a `DeadLetterSink`.

pub mod bus;
pub mod dead_letter;
pub mod error;
pub mod traits;

pub use bus::{BusOptions, BusStats, EventBus, RuleId, RuleInfo};
pub use error::BusError;
pub use dead_letter::{DeadLetter, FailureReason, MemoryDeadLetters};
pub use traits::{DeadLetterSink, Handler};
