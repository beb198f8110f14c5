//! Fire-and-forget notification collaborator.
//!
//! The core emits notification requests on membership invites, low card
//! balances, large transactions and auto-recharge signals; delivery and its
//! guarantees are the collaborator's responsibility. Sinks must never fail
//! the business operation that emitted the request.

pub mod sink;

pub use sink::{InMemorySink, LogSink, Notification, NotificationKind, NotificationSink};
