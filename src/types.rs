// src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub video: VideoConfig,
    pub reasoner: ReasonerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: usize,
    /// Raw confidence floor applied inside the detector; the safety policy
    /// thresholds in `DetectionConfig` are applied later, per frame.
    pub confidence_floor: f32,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Looser bound: missing a distant worker is worse than a false person.
    pub person_conf_threshold: f32,
    /// Stricter bound: absence inference must not trust noisy detections.
    pub ppe_conf_threshold: f32,
    pub frame_stride: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub output_dir: String,
    pub fallback_fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            person_conf_threshold: 0.3,
            ppe_conf_threshold: 0.5,
            frame_stride: 10,
        }
    }
}

// ============================================================================
// FRAMES & DETECTIONS
// ============================================================================

/// One decoded video frame as a packed RGB buffer. Handed to the detection
/// capability directly; frames never touch the filesystem.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

/// The six classes of the site-safety model, in class-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionLabel {
    Gloves,
    HardHat,
    Mask,
    Person,
    SafetyBoots,
    Vest,
}

impl DetectionLabel {
    pub fn from_class_id(class_id: usize) -> Option<Self> {
        match class_id {
            0 => Some(Self::Gloves),
            1 => Some(Self::HardHat),
            2 => Some(Self::Mask),
            3 => Some(Self::Person),
            4 => Some(Self::SafetyBoots),
            5 => Some(Self::Vest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gloves => "Gloves",
            Self::HardHat => "Hard_hat",
            Self::Mask => "Mask",
            Self::Person => "Person",
            Self::SafetyBoots => "Safety_boots",
            Self::Vest => "Vest",
        }
    }

    pub fn category(&self) -> DetectionCategory {
        match self {
            Self::Person => DetectionCategory::Person,
            _ => DetectionCategory::Ppe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionCategory {
    Person,
    Ppe,
}

#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub label: DetectionLabel,
    pub confidence: f32,
    pub category: DetectionCategory,
    /// [x1, y1, x2, y2] in source image coordinates.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(label: DetectionLabel, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            label,
            confidence,
            category: label.category(),
            bbox,
        }
    }
}

// ============================================================================
// VIOLATIONS & EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    High,
    Medium,
}

/// The three PPE kinds whose absence constitutes a violation, in the fixed
/// evaluation/reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViolationKind {
    NoHardHat,
    NoVest,
    NoMask,
}

impl ViolationKind {
    /// Severity is a static fact of the kind, never recomputed per frame.
    pub fn severity(&self) -> Severity {
        match self {
            Self::NoHardHat => Severity::High,
            Self::NoVest | Self::NoMask => Severity::Medium,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoHardHat => "No Hard Hat",
            Self::NoVest => "No Safety Vest",
            Self::NoMask => "No Mask",
        }
    }

    /// The PPE item whose absence this kind reports.
    pub fn required_item(&self) -> DetectionLabel {
        match self {
            Self::NoHardHat => DetectionLabel::HardHat,
            Self::NoVest => DetectionLabel::Vest,
            Self::NoMask => DetectionLabel::Mask,
        }
    }

    pub const ALL: [ViolationKind; 3] = [Self::NoHardHat, Self::NoVest, Self::NoMask];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
}

impl Violation {
    pub fn of(kind: ViolationKind) -> Self {
        Self {
            kind,
            severity: kind.severity(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameStatus {
    NoPerson,
    Compliant,
    ViolationDetected,
}

/// One sampled frame that carried a safety signal. NoPerson frames are
/// computed but never retained in the event stream.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    pub frame_index: u64,
    pub detections: Vec<Detection>,
    pub violations: Vec<Violation>,
    pub status: FrameStatus,
}

/// One violation kind folded across the whole video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedViolation {
    pub kind: ViolationKind,
    pub frames: BTreeSet<u64>,
}

// ============================================================================
// REPORT & BUNDLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub violation: String,
    pub occurrences: usize,
    pub explanation: String,
}

/// The three files a finished run must have produced before packaging.
#[derive(Debug, Clone)]
pub struct AuditArtifacts {
    pub source_video: PathBuf,
    pub annotated_video: PathBuf,
    pub report: PathBuf,
}

impl AuditArtifacts {
    pub fn paths(&self) -> [&PathBuf; 3] {
        [&self.annotated_video, &self.report, &self.source_video]
    }
}

/// Everything one successful run leaves behind.
#[derive(Debug, Clone)]
pub struct AuditBundle {
    pub archive: PathBuf,
    pub summary: Vec<SummaryRecord>,
    pub event_count: usize,
}
