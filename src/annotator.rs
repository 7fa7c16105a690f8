// src/annotator.rs
//
// Full-stream annotated-video generation. Every frame of the source is
// decoded, overlaid with detection boxes, and re-encoded at the source
// resolution and frame rate. This stage shares no state with the sampled
// event pipeline; the two may run concurrently over the same source.

use crate::detector::Detector;
use crate::error::AuditError;
use crate::types::{Detection, Frame};
use crate::video::{self, VideoReader};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};
use std::path::Path;
use tracing::{debug, info};

pub fn annotate_video(
    source: &Path,
    output: &Path,
    detector: &mut dyn Detector,
    fallback_fps: f64,
) -> Result<(), AuditError> {
    let mut reader = VideoReader::open(source, fallback_fps)?;
    let mut writer = video::create_writer(output, reader.width, reader.height, reader.fps)?;

    let mut frame_count: u64 = 0;

    while let Some(frame) = reader.read_frame()? {
        frame_count += 1;

        let detections = detector.detect(&frame)?;
        let annotated = draw_detections(&frame, &detections)
            .map_err(|e| AuditError::SinkUnavailable(format!("annotation failed: {e}")))?;

        use opencv::videoio::VideoWriterTrait;
        writer
            .write(&annotated)
            .map_err(|e| AuditError::SinkUnavailable(e.to_string()))?;

        if frame_count % 50 == 0 {
            debug!(
                "Annotation progress: {:.1}% ({} frames)",
                reader.progress(),
                frame_count
            );
        }
    }

    info!(
        "✓ Annotated video written: {} ({} frames)",
        output.display(),
        frame_count
    );
    Ok(())
}

/// Draws a box and a `label conf` caption per detection onto a BGR copy of
/// the frame, ready for the encoder.
fn draw_detections(frame: &Frame, detections: &[Detection]) -> opencv::Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;

    let mut bgr_mat = Mat::default();
    imgproc::cvt_color(&mat, &mut bgr_mat, imgproc::COLOR_RGB2BGR, 0)?;
    let mut output = bgr_mat.try_clone()?;

    let green = core::Scalar::new(0.0, 255.0, 0.0, 0.0);

    for det in detections {
        let [x1, y1, x2, y2] = det.bbox;
        let x1 = x1.round() as i32;
        let y1 = y1.round() as i32;
        let x2 = x2.round() as i32;
        let y2 = y2.round() as i32;

        imgproc::rectangle(
            &mut output,
            core::Rect::new(x1, y1, (x2 - x1).max(1), (y2 - y1).max(1)),
            green,
            2,
            imgproc::LINE_8,
            0,
        )?;

        let caption = format!("{} {:.2}", det.label.as_str(), det.confidence);
        imgproc::put_text(
            &mut output,
            &caption,
            core::Point::new(x1, (y1 - 10).max(10)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            green,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    Ok(output)
}
