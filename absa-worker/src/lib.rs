//! The analysis worker: turns queued posts into indexed documents.

pub mod assembler;
pub mod pipeline;
pub mod stage;
pub mod worker;

pub use assembler::{assemble, Analysis};
pub use pipeline::{AnalysisPipeline, PipelineSettings, StageFailure};
pub use stage::ProcessingStage;
pub use worker::{Worker, WorkerSettings};
