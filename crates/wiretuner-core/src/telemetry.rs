//! Anomaly reporting sink
//!
//! Integrity faults found while loading or replaying are reported here in
//! addition to being returned to the caller. Reporting never blocks and never
//! fails.

use crate::errors::ExError;
use std::sync::mpsc::Sender;
use std::sync::Mutex;
use wiretuner_core_types::schema::EVENT_ANOMALY;
use wiretuner_core_types::SequenceRange;

/// One integrity fault as seen by telemetry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub code: &'static str,
    pub message: String,
    pub document_id: Option<String>,
    pub range: Option<SequenceRange>,
    /// True when a fallback produced a usable result anyway
    pub recovered: bool,
}

impl Anomaly {
    pub fn from_error(err: &ExError, recovered: bool) -> Self {
        Self {
            code: err.code(),
            message: err.message().to_string(),
            document_id: err.document_id().map(str::to_string),
            range: err.range(),
            recovered,
        }
    }
}

/// Fire-and-forget receiver of anomalies
pub trait AnomalySink: Send + Sync {
    fn report(&self, anomaly: &Anomaly);
}

/// Logs anomalies at warn level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnomalySink for TracingSink {
    fn report(&self, anomaly: &Anomaly) {
        tracing::warn!(
            component = module_path!(),
            event = EVENT_ANOMALY,
            code = anomaly.code,
            document_id = anomaly.document_id.as_deref().unwrap_or(""),
            range = %anomaly.range.map(|r| r.to_string()).unwrap_or_default(),
            recovered = anomaly.recovered,
            "{}",
            anomaly.message
        );
    }
}

/// Forwards anomalies to a channel; a closed receiver is ignored
pub struct ChannelSink {
    sender: Mutex<Sender<Anomaly>>,
}

impl ChannelSink {
    pub fn new(sender: Sender<Anomaly>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl AnomalySink for ChannelSink {
    fn report(&self, anomaly: &Anomaly) {
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(anomaly.clone());
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AnomalySink for NullSink {
    fn report(&self, _anomaly: &Anomaly) {}
}
