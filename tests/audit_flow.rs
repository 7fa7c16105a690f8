// tests/audit_flow.rs
//
// End-to-end scenarios over the event pipeline with scripted detections:
// sampled detections -> evaluation -> aggregation -> summary assembly.

use async_trait::async_trait;
use ppe_audit::aggregator::ViolationAggregate;
use ppe_audit::detector::Detector;
use ppe_audit::error::AuditError;
use ppe_audit::pipeline::{collect_events, AuditPipeline};
use ppe_audit::reasoner::Explainer;
use ppe_audit::report::{assemble_summary, AuditOutcome};
use ppe_audit::types::{
    Config, Detection, DetectionConfig, DetectionLabel, Frame, LoggingConfig, ModelConfig,
    ReasonerConfig, SummaryRecord, VideoConfig, ViolationKind,
};
use ppe_audit::violations::SafetyContext;
use std::path::Path;

struct CannedExplainer;

#[async_trait]
impl Explainer for CannedExplainer {
    async fn explain_violation(
        &self,
        kind: ViolationKind,
        occurrences: usize,
    ) -> Result<String, AuditError> {
        Ok(format!("{}: {} occurrence(s)", kind.label(), occurrences))
    }

    async fn explain_context(&self, context: &SafetyContext) -> Result<String, AuditError> {
        Ok(format!("missing: {:?}", context.missing_ppe))
    }
}

struct NoopDetector;

impl Detector for NoopDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AuditError> {
        Ok(Vec::new())
    }
}

fn test_config(output_dir: &Path) -> Config {
    Config {
        model: ModelConfig {
            path: "models/best.onnx".to_string(),
            input_size: 640,
            confidence_floor: 0.25,
            num_threads: 1,
        },
        detection: DetectionConfig::default(),
        video: VideoConfig {
            output_dir: output_dir.to_string_lossy().into_owned(),
            fallback_fps: 25.0,
        },
        reasoner: ReasonerConfig {
            base_url: "http://localhost:11434".to_string(),
            model: "gemma:2b".to_string(),
            temperature: 0.2,
            timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

fn det(label: DetectionLabel, conf: f32) -> Detection {
    Detection::new(label, conf, [0.0, 0.0, 50.0, 50.0])
}

fn worker_with(ppe: &[DetectionLabel]) -> Vec<Detection> {
    let mut detections = vec![det(DetectionLabel::Person, 0.85)];
    detections.extend(ppe.iter().map(|label| det(*label, 0.75)));
    detections
}

async fn run_audit(
    frames: Vec<Result<(u64, Vec<Detection>), AuditError>>,
) -> (usize, Vec<SummaryRecord>) {
    let events = collect_events(frames, &DetectionConfig::default()).unwrap();
    let aggregate = ViolationAggregate::from_events(&events);
    let outcome = AuditOutcome::classify(events.len(), aggregate);
    let summary = assemble_summary(&outcome, &CannedExplainer).await;
    (events.len(), summary)
}

#[tokio::test]
async fn scenario_no_qualifying_person_frames() {
    // Machinery and loose PPE in view, but never a person.
    let frames = vec![
        Ok((10, vec![det(DetectionLabel::HardHat, 0.9)])),
        Ok((20, Vec::new())),
        Ok((30, vec![det(DetectionLabel::Person, 0.1)])),
    ];

    let (event_count, summary) = run_audit(frames).await;

    assert_eq!(event_count, 0);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].violation, "Analysis Summary");
    assert_eq!(summary[0].occurrences, 0);
}

#[tokio::test]
async fn scenario_five_compliant_person_frames() {
    let full_kit = [
        DetectionLabel::HardHat,
        DetectionLabel::Vest,
        DetectionLabel::Mask,
    ];
    let frames: Vec<_> = (1..=5)
        .map(|i| Ok((i * 10, worker_with(&full_kit))))
        .collect();

    let (event_count, summary) = run_audit(frames).await;

    assert_eq!(event_count, 5);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].violation, "PPE Compliance");
    assert_eq!(summary[0].occurrences, 5);
}

#[tokio::test]
async fn scenario_hard_hat_and_vest_violations() {
    // Frames 10/20/30 missing the hard hat; frame 20 also missing the vest.
    let frames = vec![
        Ok((
            10,
            worker_with(&[DetectionLabel::Vest, DetectionLabel::Mask]),
        )),
        Ok((20, worker_with(&[DetectionLabel::Mask]))),
        Ok((
            30,
            worker_with(&[DetectionLabel::Vest, DetectionLabel::Mask]),
        )),
    ];

    let events = collect_events(frames, &DetectionConfig::default()).unwrap();
    let aggregate = ViolationAggregate::from_events(&events);

    let hard_hat = aggregate
        .entries()
        .iter()
        .find(|e| e.kind == ViolationKind::NoHardHat)
        .unwrap();
    assert_eq!(
        hard_hat.frames.iter().copied().collect::<Vec<_>>(),
        vec![10, 20, 30]
    );
    let vest = aggregate
        .entries()
        .iter()
        .find(|e| e.kind == ViolationKind::NoVest)
        .unwrap();
    assert_eq!(vest.frames.iter().copied().collect::<Vec<_>>(), vec![20]);

    let outcome = AuditOutcome::classify(events.len(), aggregate);
    let summary = assemble_summary(&outcome, &CannedExplainer).await;

    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].violation, "No Hard Hat");
    assert_eq!(summary[0].occurrences, 3);
    assert_eq!(summary[1].violation, "No Safety Vest");
    assert_eq!(summary[1].occurrences, 1);
}

#[tokio::test]
async fn zero_byte_source_is_rejected_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.mp4");
    std::fs::write(&source, b"").unwrap();
    let out_dir = dir.path().join("outputs");

    let pipeline = AuditPipeline::new(test_config(&out_dir), CannedExplainer);
    let err = pipeline
        .run(&source, NoopDetector, NoopDetector)
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::EmptyInput(_)));
    // The run stops before any stage touches the output area.
    assert!(!out_dir.exists());
}

#[tokio::test]
async fn mixed_compliant_and_violation_frames() {
    let full_kit = [
        DetectionLabel::HardHat,
        DetectionLabel::Vest,
        DetectionLabel::Mask,
    ];
    let frames = vec![
        Ok((10, worker_with(&full_kit))),
        Ok((20, worker_with(&[DetectionLabel::Vest, DetectionLabel::Mask]))),
        Ok((30, vec![det(DetectionLabel::HardHat, 0.9)])), // nobody present
    ];

    let (event_count, summary) = run_audit(frames).await;

    // The no-person frame is excluded; one compliant and one violating
    // frame remain, so the violation branch wins.
    assert_eq!(event_count, 2);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].violation, "No Hard Hat");
    assert_eq!(summary[0].occurrences, 1);
    assert!(summary[0].explanation.contains("1 occurrence(s)"));
}
