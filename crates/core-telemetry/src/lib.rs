//! Feature-usage telemetry: events, data classification, and sinks.
//!
//! A [`TelemetryEvent`] is a named record with flat string fields. Every
//! event a contribution publishes is declared up front by an
//! [`EventClassification`] naming the owner and, per field, the data class
//! and collection purpose; [`TelemetryEvent::classified`] checks the
//! declaration in debug builds. Delivery goes through a [`TelemetrySink`],
//! which is fire-and-forget by contract: publishing never blocks the caller
//! and never surfaces an error, so feature behavior can never depend on
//! telemetry succeeding.

use std::fmt::Write as _;
use std::sync::Mutex;
use tracing::info;

// -------------------------------------------------------------------------------------------------
// Classification
// -------------------------------------------------------------------------------------------------
// Declarative data-governance annotations, declared as `const` tables next to
// the events they describe. The wire strings keep the upstream spellings.

/// Data class of a single telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataClass {
    SystemMetadata,
    EndUserPseudonymizedInformation,
}

impl DataClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            DataClass::SystemMetadata => "SystemMetaData",
            DataClass::EndUserPseudonymizedInformation => "EndUserPseudonymizedInformation",
        }
    }
}

/// Why a field is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    FeatureInsight,
    PerformanceAndHealth,
}

impl Purpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            Purpose::FeatureInsight => "FeatureInsight",
            Purpose::PerformanceAndHealth => "PerformanceAndHealth",
        }
    }
}

/// Declaration of one field an event may carry.
#[derive(Debug, Clone, Copy)]
pub struct FieldClassification {
    pub name: &'static str,
    pub class: DataClass,
    pub purpose: Purpose,
    pub comment: &'static str,
}

/// Declaration of a whole event: its wire name, owning team, and fields.
#[derive(Debug, Clone, Copy)]
pub struct EventClassification {
    pub event: &'static str,
    pub owner: &'static str,
    pub comment: &'static str,
    pub fields: &'static [FieldClassification],
}

impl EventClassification {
    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }
}

// -------------------------------------------------------------------------------------------------
// Events
// -------------------------------------------------------------------------------------------------

/// An immutable usage record, constructed once per occurrence and handed to a
/// sink. Field keys are the published wire names (camelCase), values are
/// already rendered strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl TelemetryEvent {
    /// Build an event under its classification. Debug builds assert that
    /// every field carried is declared; release builds trust the caller.
    pub fn classified(
        classification: &EventClassification,
        fields: Vec<(&'static str, String)>,
    ) -> Self {
        for (name, _) in &fields {
            debug_assert!(
                classification.declares(name),
                "field '{name}' is not declared by the '{}' classification",
                classification.event
            );
        }
        Self {
            name: classification.event,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `key=value` pairs joined by spaces, for the log-backed sink.
    fn render_fields(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            if !out.is_empty() {
                out.push(' ');
            }
            // String formatting is infallible.
            let _ = write!(out, "{key}={value}");
        }
        out
    }
}

// -------------------------------------------------------------------------------------------------
// Sinks
// -------------------------------------------------------------------------------------------------

/// Destination for telemetry events. Implementations swallow their own
/// failures; `publish` has no error path.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: TelemetryEvent);
}

/// Default sink: events land in the structured log under the `telemetry`
/// target, so the log file doubles as the local usage ledger.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn publish(&self, event: TelemetryEvent) {
        info!(
            target: "telemetry",
            event = event.name,
            fields = %event.render_fields(),
            "publish"
        );
    }
}

/// Sink used when telemetry is disabled by configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&self, _event: TelemetryEvent) {}
}

/// Capturing sink for tests: records every published event for inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in publish order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&self, event: TelemetryEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
