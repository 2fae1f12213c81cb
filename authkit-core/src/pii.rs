//! PII classification and redaction for queued offline actions.
//!
//! Queued events are produced elsewhere; this module only decides whether an
//! event carries personally-identifying data and sanitizes it before it can
//! reach logs or unencrypted storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::platform::{OsFamily, PlatformCapabilities};

/// Payload fields treated as personally identifying. This list is closed:
/// classification and redaction look at exactly these names.
pub const PII_SENSITIVE_FIELDS: [&str; 6] =
    ["userId", "note", "latitude", "longitude", "filePath", "name"];

/// Redaction marker substituted for free-text content.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Queue size above which a retention-policy recommendation is raised.
const LARGE_QUEUE_THRESHOLD: usize = 1000;

/// Kind of queued offline action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueuedEventType {
    /// Personnel status change.
    PersonnelStatus,
    /// Unit status change.
    UnitStatus,
    /// Outgoing message.
    Message,
    /// Location update.
    LocationUpdate,
}

/// Processing state of a queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueuedEventStatus {
    /// Waiting to be sent.
    Pending,
    /// Currently being sent.
    Processing,
    /// Sent successfully.
    Completed,
    /// Exhausted its retries.
    Failed,
}

/// An action queued while offline. Consumed here, owned by the queue service.
///
/// The payload shape depends on `event_type`, so it stays a JSON map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEvent {
    /// Queue-unique identifier.
    pub id: String,
    /// Kind of action.
    #[serde(rename = "type")]
    pub event_type: QueuedEventType,
    /// Processing state.
    pub status: QueuedEventStatus,
    /// Attempts made so far.
    pub retry_count: u32,
    /// Attempt ceiling.
    pub max_retries: u32,
    /// Enqueue instant, epoch milliseconds.
    pub created_at: i64,
    /// Type-dependent payload.
    pub data: Map<String, Value>,
}

/// Whether `event` carries at least one non-empty sensitive field.
#[must_use]
pub fn contains_pii(event: &QueuedEvent) -> bool {
    PII_SENSITIVE_FIELDS
        .iter()
        .any(|field| has_content(event.data.get(*field)))
}

fn has_content(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Returns a sanitized copy of `event` safe for logging or non-secure
/// storage.
///
/// `userId`, `filePath` and `name` are removed entirely; `note` becomes
/// [`REDACTION_MARKER`] when it had content and stays empty otherwise;
/// coordinates are rounded to 2 decimal places (~1.1 km), with non-numeric
/// values passed through unchanged. Non-sensitive fields are preserved
/// verbatim.
#[must_use]
pub fn sanitize_event(event: &QueuedEvent) -> QueuedEvent {
    let mut data = event.data.clone();

    for field in PII_SENSITIVE_FIELDS {
        let Some(value) = data.get(field).cloned() else {
            continue;
        };
        match field {
            "latitude" | "longitude" => {
                if let Some(rounded) = round_coordinate(&value) {
                    data.insert(field.to_string(), rounded);
                }
            }
            "note" => {
                let marker = if has_content(Some(&value)) {
                    REDACTION_MARKER
                } else {
                    ""
                };
                data.insert(field.to_string(), Value::String(marker.to_string()));
            }
            _ => {
                data.remove(field);
            }
        }
    }

    QueuedEvent {
        data,
        ..event.clone()
    }
}

fn round_coordinate(value: &Value) -> Option<Value> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    // Ties round toward positive infinity: -74.005 becomes -74.0, not -74.01.
    let rounded = (parsed * 100.0 + 0.5).floor() / 100.0;
    serde_json::Number::from_f64(rounded).map(Value::Number)
}

/// Fleet-level PII exposure risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// PII fraction at or below 20%.
    Low,
    /// PII fraction above 20%.
    Medium,
    /// PII fraction above 50%.
    High,
}

/// Result of a PII exposure audit over a queue snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiiAudit {
    /// Events examined.
    pub total_events: usize,
    /// Events carrying at least one sensitive field.
    pub events_with_pii: usize,
    /// Overall risk classification.
    pub risk_level: RiskLevel,
    /// Deterministic, appended remediation guidance.
    pub recommendations: Vec<String>,
}

/// Audits `events` for PII exposure risk.
///
/// Risk is `high` above a 50% PII fraction, `medium` above 20%, else `low`.
/// Recommendations are appended deterministically by risk level, platform
/// (extra warnings on capability-limited platforms holding PII) and queue
/// size.
#[must_use]
pub fn audit_pii_exposure(
    events: &[QueuedEvent],
    probe: &dyn PlatformCapabilities,
) -> PiiAudit {
    let events_with_pii = events.iter().filter(|e| contains_pii(e)).count();
    #[allow(clippy::cast_precision_loss)]
    let pii_percentage = if events.is_empty() {
        0.0
    } else {
        events_with_pii as f64 / events.len() as f64 * 100.0
    };

    let mut recommendations = Vec::new();
    let risk_level = if pii_percentage > 50.0 {
        recommendations
            .push("Consider implementing field-level encryption for PII data".to_string());
        recommendations.push("Rotate encryption keys more frequently".to_string());
        recommendations.push("Implement automatic PII data expiration".to_string());
        RiskLevel::High
    } else if pii_percentage > 20.0 {
        recommendations.push("Monitor PII data retention policies".to_string());
        recommendations.push("Consider data minimization strategies".to_string());
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    if probe.os_family() == OsFamily::Web && events_with_pii > 0 {
        recommendations
            .push("Review web storage encryption implementation".to_string());
        recommendations
            .push("Consider disabling PII persistence on web builds".to_string());
    }

    if events.len() > LARGE_QUEUE_THRESHOLD {
        recommendations.push(
            "Implement automatic cleanup of old offline queue events".to_string(),
        );
    }

    PiiAudit {
        total_events: events.len(),
        events_with_pii,
        risk_level,
        recommendations,
    }
}

/// Baseline PII hardening guidance for the current platform configuration.
#[must_use]
pub fn protection_recommendations(probe: &dyn PlatformCapabilities) -> Vec<String> {
    let mut recommendations = Vec::new();

    if probe.os_family() == OsFamily::Web {
        recommendations.push(
            "Consider disabling offline queue persistence on web builds for maximum PII protection"
                .to_string(),
        );
        recommendations.push(
            "Implement session-only storage for PII-sensitive operations on web"
                .to_string(),
        );
    } else {
        recommendations.push(
            "Ensure encryption keys are stored in secure hardware when available"
                .to_string(),
        );
        recommendations.push(
            "Implement biometric authentication for accessing PII data".to_string(),
        );
    }

    recommendations.push("Regularly audit offline queue for PII exposure".to_string());
    recommendations
        .push("Implement automatic data expiration for old events".to_string());
    recommendations
        .push("Use data minimization - only store necessary PII fields".to_string());
    recommendations.push(
        "Consider field-level encryption for highly sensitive data".to_string(),
    );

    recommendations
}
