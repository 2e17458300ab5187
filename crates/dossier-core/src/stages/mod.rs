//! Stage executors
//!
//! Each stage wraps one capability behind a timeout, validates what comes
//! back, and falls back to a degraded artifact instead of failing. The
//! outcome says whether the fallback was taken and which gaps to record.

use async_trait::async_trait;
use dossier_model::{Stage, StageGap};

pub mod analyze;
pub mod plan;
pub mod scout;
pub mod write;

pub use analyze::{AnalyzeInput, AnalyzeStage};
pub use plan::{PlanInput, PlanStage};
pub use scout::{ScoutInput, ScoutOutput, ScoutStage};
pub use write::WriteStage;

/// Stage result: always an artifact, plus any gaps
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    /// Produced or fallback artifact
    pub output: T,
    /// Gaps to record on the session
    pub gaps: Vec<StageGap>,
    /// Whether the stage as a whole fell back
    pub fell_back: bool,
}

impl<T> StageOutcome<T> {
    /// Clean success
    #[inline]
    #[must_use]
    pub fn ok(output: T) -> Self {
        Self {
            output,
            gaps: Vec::new(),
            fell_back: false,
        }
    }

    /// Success with scoped gaps (e.g. some sub-questions failed)
    #[inline]
    #[must_use]
    pub fn partial(output: T, gaps: Vec<StageGap>) -> Self {
        Self {
            output,
            gaps,
            fell_back: false,
        }
    }

    /// Whole-stage fallback
    #[inline]
    #[must_use]
    pub fn degraded(output: T, gap: StageGap) -> Self {
        Self {
            output,
            gaps: vec![gap],
            fell_back: true,
        }
    }
}

/// One pipeline stage
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Stage input
    type Input: Send;
    /// Stage artifact
    type Output: Send;

    /// Which stage this is
    fn stage(&self) -> Stage;

    /// Run the stage; never fails, degraded runs fall back
    async fn execute(&self, input: Self::Input) -> StageOutcome<Self::Output>;
}
