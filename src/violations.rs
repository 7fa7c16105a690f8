// src/violations.rs
//
// Pure per-frame violation policy. Violations are inferred from the ABSENCE
// of a required PPE item among confident detections, never from a
// low-confidence detection of the item itself.

use crate::types::{
    Detection, DetectionConfig, DetectionLabel, FrameStatus, Violation, ViolationKind,
};
use std::collections::HashSet;

/// Compliance verdict for one frame's detections.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameVerdict {
    pub violations: Vec<Violation>,
    pub status: FrameStatus,
}

/// Evaluates one frame. Person presence uses the looser threshold so distant
/// or small workers still count; PPE absence uses the stricter threshold so
/// a noisy detection is never the basis of a "missing" claim.
pub fn evaluate_detections(detections: &[Detection], config: &DetectionConfig) -> FrameVerdict {
    let has_person = detections.iter().any(|d| {
        d.label == DetectionLabel::Person && d.confidence >= config.person_conf_threshold
    });

    if !has_person {
        return FrameVerdict {
            violations: Vec::new(),
            status: FrameStatus::NoPerson,
        };
    }

    let detected_ppe: HashSet<DetectionLabel> = detections
        .iter()
        .filter(|d| d.label != DetectionLabel::Person && d.confidence >= config.ppe_conf_threshold)
        .map(|d| d.label)
        .collect();

    // Fixed kind order keeps the output deterministic regardless of
    // detection order.
    let violations: Vec<Violation> = ViolationKind::ALL
        .iter()
        .filter(|kind| !detected_ppe.contains(&kind.required_item()))
        .map(|kind| Violation::of(*kind))
        .collect();

    let status = if violations.is_empty() {
        FrameStatus::Compliant
    } else {
        FrameStatus::ViolationDetected
    };

    FrameVerdict { violations, status }
}

/// Detected vs. missing required PPE for one frame, used to prompt the
/// text-generation capability for contextual explanations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyContext {
    pub detected_ppe: Vec<&'static str>,
    pub missing_ppe: Vec<&'static str>,
}

/// Splits the required PPE set by what was detected at all. Unlike
/// `evaluate_detections` this takes the labels as reported — the caller has
/// already decided which detections to trust.
pub fn build_safety_context(detections: &[Detection]) -> SafetyContext {
    let labels: HashSet<DetectionLabel> = detections.iter().map(|d| d.label).collect();

    let mut detected_ppe = Vec::new();
    let mut missing_ppe = Vec::new();
    for kind in ViolationKind::ALL {
        let item = kind.required_item();
        if labels.contains(&item) {
            detected_ppe.push(item.as_str());
        } else {
            missing_ppe.push(item.as_str());
        }
    }

    SafetyContext {
        detected_ppe,
        missing_ppe,
    }
}

// ============================================================================
// TESTS
// ============================================================================
