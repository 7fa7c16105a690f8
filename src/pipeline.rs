// src/pipeline.rs
//
// Drives one audit run: sampled event analysis and full-stream annotation
// over the same immutable source, then aggregation, report assembly, and
// bundle packaging. Annotation and analysis write to disjoint outputs and
// share no mutable state, so they run on separate blocking workers.

use crate::aggregator::ViolationAggregate;
use crate::annotator::annotate_video;
use crate::detector::Detector;
use crate::error::AuditError;
use crate::export::export_bundle;
use crate::reasoner::Explainer;
use crate::report::{assemble_summary, write_report, AuditOutcome};
use crate::types::{
    AuditArtifacts, AuditBundle, Config, Detection, DetectionConfig, Frame, FrameEvent,
    FrameStatus,
};
use crate::video::VideoReader;
use crate::violations::{build_safety_context, evaluate_detections};
use opencv::{core::Mat, imgcodecs, imgproc, prelude::*};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ANNOTATED_VIDEO_NAME: &str = "annotated_video.mp4";
pub const REPORT_NAME: &str = "safety_report.json";
pub const ARCHIVE_NAME: &str = "safety_audit.zip";
pub const EVENT_LOG_NAME: &str = "frame_events.jsonl";

/// Folds per-frame detection results into the event stream. Frames without
/// a qualifying person carry no safety signal and are dropped here, so the
/// stream never contains a NoPerson entry.
pub fn collect_events<I>(
    detections_by_frame: I,
    config: &DetectionConfig,
) -> Result<Vec<FrameEvent>, AuditError>
where
    I: IntoIterator<Item = Result<(u64, Vec<Detection>), AuditError>>,
{
    let mut events = Vec::new();

    for item in detections_by_frame {
        let (frame_index, detections) = item?;
        let verdict = evaluate_detections(&detections, config);
        if verdict.status == FrameStatus::NoPerson {
            continue;
        }
        events.push(FrameEvent {
            frame_index,
            detections,
            violations: verdict.violations,
            status: verdict.status,
        });
    }

    Ok(events)
}

/// Sampled event pipeline: decode, stride-sample, detect, evaluate.
pub fn analyze_video(
    source: &Path,
    detector: &mut dyn Detector,
    config: &DetectionConfig,
    fallback_fps: f64,
) -> Result<Vec<FrameEvent>, AuditError> {
    let reader = VideoReader::open(source, fallback_fps)?;
    let sampler = reader.sample(config.frame_stride);

    let events = collect_events(
        sampler.map(|item| {
            item.and_then(|(index, frame)| detector.detect(&frame).map(|dets| (index, dets)))
        }),
        config,
    )?;

    info!("✓ Sampled analysis complete: {} event(s)", events.len());
    Ok(events)
}

/// One audit run over one video. Holds the injected configuration and
/// text-generation capability; detector handles are passed per run so the
/// two stages never share an inference session.
pub struct AuditPipeline<E: Explainer> {
    config: Config,
    explainer: E,
}

impl<E: Explainer> AuditPipeline<E> {
    pub fn new(config: Config, explainer: E) -> Self {
        Self { config, explainer }
    }

    pub async fn run<D1, D2>(
        &self,
        source: &Path,
        analysis_detector: D1,
        annotation_detector: D2,
    ) -> Result<AuditBundle, AuditError>
    where
        D1: Detector + 'static,
        D2: Detector + 'static,
    {
        let meta = fs::metadata(source)
            .map_err(|e| AuditError::SourceUnavailable(format!("{}: {e}", source.display())))?;
        if meta.len() == 0 {
            return Err(AuditError::EmptyInput(source.to_path_buf()));
        }

        let output_dir = PathBuf::from(&self.config.video.output_dir);
        fs::create_dir_all(&output_dir)?;

        let artifacts = AuditArtifacts {
            source_video: source.to_path_buf(),
            annotated_video: output_dir.join(ANNOTATED_VIDEO_NAME),
            report: output_dir.join(REPORT_NAME),
        };

        // ── Annotation and sampled analysis, concurrently ────────────────
        let annotate_source = artifacts.source_video.clone();
        let annotate_output = artifacts.annotated_video.clone();
        let fallback_fps = self.config.video.fallback_fps;
        let mut annotation_detector = annotation_detector;
        let annotate_task = tokio::task::spawn_blocking(move || {
            annotate_video(
                &annotate_source,
                &annotate_output,
                &mut annotation_detector,
                fallback_fps,
            )
        });

        let analyze_source = artifacts.source_video.clone();
        let detection_config = self.config.detection.clone();
        let mut analysis_detector = analysis_detector;
        let analyze_task = tokio::task::spawn_blocking(move || {
            analyze_video(
                &analyze_source,
                &mut analysis_detector,
                &detection_config,
                fallback_fps,
            )
        });

        let (annotate_result, analyze_result) = tokio::join!(annotate_task, analyze_task);
        annotate_result.map_err(|e| AuditError::Task(e.to_string()))??;
        let events = analyze_result.map_err(|e| AuditError::Task(e.to_string()))??;

        // ── Aggregate + report ───────────────────────────────────────────
        write_event_log(&output_dir.join(EVENT_LOG_NAME), &events)?;

        let event_count = events.len();
        let aggregate = ViolationAggregate::from_events(&events);
        for entry in aggregate.entries() {
            info!(
                "  {} in {} frame(s)",
                entry.kind.label(),
                entry.frames.len()
            );
        }

        let outcome = AuditOutcome::classify(event_count, aggregate);
        let summary = assemble_summary(&outcome, &self.explainer).await;
        write_report(&artifacts.report, &summary)?;

        // ── Package (terminal, all-or-nothing) ───────────────────────────
        let archive = export_bundle(&output_dir.join(ARCHIVE_NAME), &artifacts)?;

        Ok(AuditBundle {
            archive,
            summary,
            event_count,
        })
    }
}

/// Writes the raw event stream as one JSON object per line. A working file
/// for inspection alongside the bundle; not one of the three archive
/// artifacts.
pub fn write_event_log(path: &Path, events: &[FrameEvent]) -> Result<(), AuditError> {
    use std::io::Write;

    let mut file = fs::File::create(path)?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|e| AuditError::Io(std::io::Error::other(e)))?;
        writeln!(file, "{}", line)?;
    }
    file.flush()?;

    info!("💾 {} event(s) written to {}", events.len(), path.display());
    Ok(())
}

// ============================================================================
// SINGLE-IMAGE ANALYSIS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ImageAnalysis {
    pub detections: Vec<Detection>,
    pub detected_ppe: Vec<&'static str>,
    pub missing_ppe: Vec<&'static str>,
    pub explanation: String,
}

/// Audits a single still image: detect, split the required-PPE set, and ask
/// the reasoner for a contextual explanation.
pub async fn analyze_image(
    path: &Path,
    detector: &mut dyn Detector,
    explainer: &dyn Explainer,
) -> Result<ImageAnalysis, AuditError> {
    let frame = load_image(path)?;
    let detections = detector.detect(&frame)?;
    let context = build_safety_context(&detections);
    let explanation = explainer.explain_context(&context).await?;

    Ok(ImageAnalysis {
        detections,
        detected_ppe: context.detected_ppe,
        missing_ppe: context.missing_ppe,
        explanation,
    })
}

fn load_image(path: &Path) -> Result<Frame, AuditError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| AuditError::SourceUnavailable(format!("non-utf8 path: {:?}", path)))?;

    let mat = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)
        .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;
    if mat.empty() {
        return Err(AuditError::SourceUnavailable(format!(
            "image not found or invalid: {}",
            path.display()
        )));
    }

    let mut rgb_mat = Mat::default();
    imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)
        .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;

    let width = rgb_mat.cols() as usize;
    let height = rgb_mat.rows() as usize;
    let data = rgb_mat
        .data_bytes()
        .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?
        .to_vec();

    Ok(Frame {
        data,
        width,
        height,
        timestamp_ms: 0.0,
    })
}
