//! Field keys and event names shared by every structured log line
//!
//! The `log_op_*` macros and the test capture layer both key on these, so a
//! rename here is a breaking change for log consumers.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";

/// Lifecycle of one facade, store or replay operation
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

/// An integrity fault reported through the telemetry sink
pub const EVENT_ANOMALY: &str = "anomaly";
