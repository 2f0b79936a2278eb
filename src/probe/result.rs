use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Why a probe did not confirm a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The target answered negatively or not at all: non-zero exit,
    /// zero replies, refused connection.
    Unreachable,
    /// The watchdog or socket timeout expired.
    Timeout,
    /// The probe could not be carried out (launch failure, resolution
    /// failure, worker failure, cancellation).
    Fault,
    /// TCP probe requested without a port.
    MissingPort,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResultError {
    #[error("Packet loss must be between 0 and 100, got {0}")]
    PacketLoss(f64),
    #[error("Response time cannot be negative, got {0}")]
    ResponseTime(f64),
}

/// Outcome of a single probe. Immutable once built.
///
/// `success` is never set directly: it is `true` exactly when at least one
/// reply was received.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    host: String,
    success: bool,
    response_time_ms: Option<f64>,
    packet_loss_percent: Option<f64>,
    error_message: Option<String>,
    failure: Option<FailureKind>,
    timestamp: DateTime<Utc>,
    packets_sent: u32,
    packets_received: u32,
}

impl ProbeResult {
    /// Builds a result from measured packet counts.
    ///
    /// When no reply was received the result is a failure of kind
    /// [`FailureKind::Unreachable`].
    pub fn measured(
        host: impl Into<String>,
        packets_sent: u32,
        packets_received: u32,
        packet_loss_percent: f64,
        response_time_ms: Option<f64>,
    ) -> Result<Self, ResultError> {
        let success = packets_received > 0;
        Self {
            host: host.into(),
            success,
            response_time_ms,
            packet_loss_percent: Some(packet_loss_percent),
            error_message: None,
            failure: (!success).then_some(FailureKind::Unreachable),
            timestamp: Utc::now(),
            packets_sent,
            packets_received,
        }
        .validated()
    }

    /// Builds a failed result: nothing received, 100% loss.
    pub fn failed(
        host: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
        packets_sent: u32,
    ) -> Self {
        Self {
            host: host.into(),
            success: false,
            response_time_ms: None,
            packet_loss_percent: Some(100.0),
            error_message: Some(message.into()),
            failure: Some(kind),
            timestamp: Utc::now(),
            packets_sent,
            packets_received: 0,
        }
    }

    /// Records the time spent on a failed attempt.
    pub fn with_response_time(mut self, response_time_ms: f64) -> Result<Self, ResultError> {
        self.response_time_ms = Some(response_time_ms);
        self.validated()
    }

    fn validated(self) -> Result<Self, ResultError> {
        if let Some(loss) = self.packet_loss_percent {
            if !(0.0..=100.0).contains(&loss) {
                return Err(ResultError::PacketLoss(loss));
            }
        }
        if let Some(rtt) = self.response_time_ms {
            if rtt.is_nan() || rtt < 0.0 {
                return Err(ResultError::ResponseTime(rtt));
            }
        }
        Ok(self)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn response_time_ms(&self) -> Option<f64> {
        self.response_time_ms
    }

    pub fn packet_loss_percent(&self) -> Option<f64> {
        self.packet_loss_percent
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn packets_sent(&self) -> u32 {
        self.packets_sent
    }

    pub fn packets_received(&self) -> u32 {
        self.packets_received
    }

    /// Compares every field except the capture timestamp.
    pub fn same_outcome(&self, other: &ProbeResult) -> bool {
        self.host == other.host
            && self.success == other.success
            && self.response_time_ms == other.response_time_ms
            && self.packet_loss_percent == other.packet_loss_percent
            && self.error_message == other.error_message
            && self.failure == other.failure
            && self.packets_sent == other.packets_sent
            && self.packets_received == other.packets_received
    }
}
