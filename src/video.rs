// src/video.rs

use crate::error::AuditError;
use crate::types::Frame;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::Path;
use tracing::info;

/// Owns the OpenCV capture handle for one video. The handle is released when
/// the reader is dropped, on every exit path.
#[derive(Debug)]
pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i32,
    pub current_frame: u64,
    pub width: i32,
    pub height: i32,
}

impl VideoReader {
    pub fn open(path: &Path, fallback_fps: f64) -> Result<Self, AuditError> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| AuditError::SourceUnavailable(format!("non-utf8 path: {:?}", path)))?;

        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;

        if !cap
            .is_opened()
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?
        {
            return Err(AuditError::SourceUnavailable(format!(
                "failed to open {}",
                path.display()
            )));
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;
        // Some containers report no frame rate at all.
        let fps = if fps > 0.0 { fps } else { fallback_fps };

        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))? as i32;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))? as i32;

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            width,
            height,
        })
    }

    /// Reads the next frame as packed RGB. Returns `None` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>, AuditError> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();

        let ok = VideoCaptureTrait::read(&mut self.cap, &mut mat)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;
        if !ok || mat.empty() {
            return Ok(None);
        }

        self.current_frame += 1;
        let timestamp_ms = (self.current_frame as f64 / self.fps) * 1000.0;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?;

        let data = rgb_mat
            .data_bytes()
            .map_err(|e| AuditError::SourceUnavailable(e.to_string()))?
            .to_vec();

        Ok(Some(Frame {
            data,
            width: self.width as usize,
            height: self.height as usize,
            timestamp_ms,
        }))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }

    /// Wraps the reader in a strided sampler. Consumes the reader: the
    /// sampler owns the decode handle for the lifetime of iteration.
    pub fn sample(self, stride: u64) -> FrameSampler {
        FrameSampler {
            reader: self,
            stride: stride.max(1),
        }
    }
}

/// Lazy, finite, non-restartable sequence of `(frame_index, frame)` pairs.
/// Frame indices are 1-based ordinals in the original stream; only indices
/// divisible by the stride are emitted.
pub struct FrameSampler {
    reader: VideoReader,
    stride: u64,
}

impl Iterator for FrameSampler {
    type Item = Result<(u64, Frame), AuditError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.read_frame() {
                Ok(Some(frame)) => {
                    let index = self.reader.current_frame;
                    if index % self.stride == 0 {
                        return Some(Ok((index, frame)));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Opens an `mp4v` encoder matching the source geometry and frame rate.
pub fn create_writer(
    output_path: &Path,
    width: i32,
    height: i32,
    fps: f64,
) -> Result<VideoWriter, AuditError> {
    info!("Output video: {}", output_path.display());

    let path_str = output_path
        .to_str()
        .ok_or_else(|| AuditError::SinkUnavailable(format!("non-utf8 path: {:?}", output_path)))?;

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')
        .map_err(|e| AuditError::SinkUnavailable(e.to_string()))?;
    let writer = VideoWriter::new(path_str, fourcc, fps, core::Size::new(width, height), true)
        .map_err(|e| AuditError::SinkUnavailable(e.to_string()))?;

    if !writer
        .is_opened()
        .map_err(|e| AuditError::SinkUnavailable(e.to_string()))?
    {
        return Err(AuditError::SinkUnavailable(format!(
            "encoder failed to open for {}",
            output_path.display()
        )));
    }

    Ok(writer)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;
    use opencv::videoio::VideoWriterTrait;

    fn write_test_video(path: &Path, frames: usize) {
        let mut writer = create_writer(path, 64, 48, 25.0).unwrap();
        for i in 0..frames {
            let mat = Mat::new_rows_cols_with_default(
                48,
                64,
                core::CV_8UC3,
                Scalar::all((i % 255) as f64),
            )
            .unwrap();
            writer.write(&mat).unwrap();
        }
        writer.release().unwrap();
    }

    #[test]
    fn test_sampler_emits_only_stride_multiples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 25);

        let reader = VideoReader::open(&path, 25.0).unwrap();
        let indices: Vec<u64> = reader
            .sample(10)
            .map(|item| item.unwrap().0)
            .collect();

        // 1-based ordinals; only multiples of the stride are emitted, so a
        // 25-frame clip yields frames 10 and 20.
        assert_eq!(indices, vec![10, 20]);
    }

    #[test]
    fn test_sampler_stride_zero_clamps_to_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 5);

        let reader = VideoReader::open(&path, 25.0).unwrap();
        let indices: Vec<u64> = reader
            .sample(0)
            .map(|item| item.unwrap().0)
            .collect();

        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_open_missing_video_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = VideoReader::open(&dir.path().join("nope.mp4"), 25.0).unwrap_err();
        assert!(matches!(err, AuditError::SourceUnavailable(_)));
    }
}
