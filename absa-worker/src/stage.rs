use std::fmt;

/// Where a post is in the pipeline. `Failed` can follow any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Dequeued,
    Extracting,
    Filtering,
    Scoring,
    Assembling,
    Indexed,
    Failed,
}

impl ProcessingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStage::Dequeued => "dequeued",
            ProcessingStage::Extracting => "extracting",
            ProcessingStage::Filtering => "filtering",
            ProcessingStage::Scoring => "scoring",
            ProcessingStage::Assembling => "assembling",
            ProcessingStage::Indexed => "indexed",
            ProcessingStage::Failed => "failed",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
