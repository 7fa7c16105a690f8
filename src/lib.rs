//! Worksite PPE safety-audit pipeline.
//!
//! Turns a video of a worksite into a structured safety audit: per-frame
//! YOLO detections, rule-based PPE-violation inference, cross-frame
//! aggregation, an annotated video, and a packaged audit bundle.

pub mod aggregator;
pub mod annotator;
pub mod config;
pub mod detector;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reasoner;
pub mod report;
pub mod types;
pub mod video;
pub mod violations;

pub use error::AuditError;
pub use pipeline::AuditPipeline;
