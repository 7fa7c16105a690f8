// src/report.rs

use crate::aggregator::ViolationAggregate;
use crate::error::AuditError;
use crate::reasoner::Explainer;
use crate::types::{AggregatedViolation, SummaryRecord, ViolationKind};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

const NO_DETECTIONS_TEXT: &str = "The video was processed, but no valid worker detections \
     were found. Safety assessment could not be performed.";

const COMPLIANT_TEXT: &str = "All detected workers appear to be compliant with the \
     required personal protective equipment (PPE). \
     No safety violations were consistently observed.";

/// The three mutually exclusive outcomes of a video audit. Exactly one
/// variant applies per run; matching is exhaustive by construction.
#[derive(Debug, Clone)]
pub enum AuditOutcome {
    /// No sampled frame had a qualifying person.
    NoDetections,
    /// Persons were seen, never in violation.
    FullCompliance { event_count: usize },
    /// At least one violation kind was observed.
    Violations { entries: Vec<AggregatedViolation> },
}

impl AuditOutcome {
    pub fn classify(event_count: usize, aggregate: ViolationAggregate) -> Self {
        if event_count == 0 {
            Self::NoDetections
        } else if aggregate.is_empty() {
            Self::FullCompliance { event_count }
        } else {
            Self::Violations {
                entries: aggregate.into_entries(),
            }
        }
    }
}

/// Turns the outcome into the ordered summary record set. A failed
/// explanation for one kind degrades to a fixed placeholder and a warning;
/// it never aborts the report.
pub async fn assemble_summary(
    outcome: &AuditOutcome,
    explainer: &dyn Explainer,
) -> Vec<SummaryRecord> {
    match outcome {
        AuditOutcome::NoDetections => vec![SummaryRecord {
            violation: "Analysis Summary".to_string(),
            occurrences: 0,
            explanation: NO_DETECTIONS_TEXT.to_string(),
        }],

        AuditOutcome::FullCompliance { event_count } => vec![SummaryRecord {
            violation: "PPE Compliance".to_string(),
            occurrences: *event_count,
            explanation: COMPLIANT_TEXT.to_string(),
        }],

        AuditOutcome::Violations { entries } => {
            let mut records = Vec::with_capacity(entries.len());
            for entry in entries {
                let occurrences = entry.frames.len();
                let explanation = match explainer.explain_violation(entry.kind, occurrences).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            "Explanation for {} unavailable, using placeholder: {}",
                            entry.kind.label(),
                            e
                        );
                        placeholder_explanation(entry.kind, occurrences)
                    }
                };
                records.push(SummaryRecord {
                    violation: entry.kind.label().to_string(),
                    occurrences,
                    explanation,
                });
            }
            records
        }
    }
}

fn placeholder_explanation(kind: ViolationKind, occurrences: usize) -> String {
    format!(
        "{} was observed in {} sampled frame(s). An automated explanation \
         could not be generated for this violation; review the annotated \
         video for the affected frames.",
        kind.label(),
        occurrences
    )
}

/// Writes the summary as pretty JSON. The report file is one of the three
/// bundle artifacts.
pub fn write_report(path: &Path, records: &[SummaryRecord]) -> Result<(), AuditError> {
    // Not a PackagingError: packaging has not started yet, this is a
    // report-side failure.
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| AuditError::Io(std::io::Error::other(e)))?;
    fs::write(path, json)?;
    info!("💾 Report written to {}", path.display());
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
