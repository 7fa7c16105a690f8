// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for one audit run. Each variant maps to a distinct
/// failure site so callers can tell a bad source apart from a bad sink or
/// a missing artifact.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("video sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("input media is empty: {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("explanation unavailable: {0}")]
    ExplanationUnavailable(String),

    #[error("packaging failed: {0}")]
    PackagingError(String),

    #[error("pipeline worker failed: {0}")]
    Task(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
