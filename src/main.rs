// src/main.rs

use anyhow::{bail, Context, Result};
use ppe_audit::detector::YoloDetector;
use ppe_audit::pipeline::{analyze_image, AuditPipeline};
use ppe_audit::reasoner::OllamaExplainer;
use ppe_audit::types::Config;
use std::path::Path;
use tracing::{info, warn};

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load("config.yaml").context("failed to load config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("ppe_audit={},ort=warn", config.logging.level))
        .init();

    info!("🦺 Worksite Safety Audit Starting");
    info!("✓ Configuration loaded");

    let Some(input) = std::env::args().nth(1) else {
        bail!("usage: ppe-audit <video-or-image>");
    };
    let input = Path::new(&input);

    let explainer = OllamaExplainer::new(&config.reasoner)?;

    let is_image = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    if is_image {
        let mut detector = YoloDetector::new(&config.model)?;
        let analysis = analyze_image(input, &mut detector, &explainer).await?;

        info!("Detections: {}", analysis.detections.len());
        info!("Detected PPE: {:?}", analysis.detected_ppe);
        info!("Missing PPE: {:?}", analysis.missing_ppe);
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    // One detector handle per stage; the annotator and the sampled pipeline
    // run on separate workers and never share a session.
    let analysis_detector = YoloDetector::new(&config.model)?;
    let annotation_detector = YoloDetector::new(&config.model)?;

    info!(
        "Detection thresholds: person={:.2}, ppe={:.2}, stride={}",
        config.detection.person_conf_threshold,
        config.detection.ppe_conf_threshold,
        config.detection.frame_stride
    );

    let pipeline = AuditPipeline::new(config, explainer);
    let bundle = pipeline
        .run(input, analysis_detector, annotation_detector)
        .await?;

    info!("\n📊 Audit complete");
    info!("  Frames with safety signal: {}", bundle.event_count);
    for record in &bundle.summary {
        if record.occurrences > 0 && record.violation != "PPE Compliance" {
            warn!("  🚨 {}: {} occurrence(s)", record.violation, record.occurrences);
        } else {
            info!("  {} ({})", record.violation, record.occurrences);
        }
    }
    info!("  📦 Bundle: {}", bundle.archive.display());

    Ok(())
}
