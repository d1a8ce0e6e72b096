//! Stage orchestration, lifecycle, and the aggregate result.

pub mod orchestrator;
pub mod stage;
pub mod state;
pub mod summary;

pub use orchestrator::Orchestrator;
pub use stage::{ErrorRecord, Stage, StageOutcome};
pub use state::{PipelineState, TransitionError};
pub use summary::{
    EnvironmentalImpact, FinancialBestCase, PipelineResult, PipelineStages, PipelineSummary,
    RiskProfile,
};
