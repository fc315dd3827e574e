//! Domain types shared across the pipeline

pub mod assessment;
pub mod cost;
pub mod session;
pub mod sizing;
pub mod vm;

pub use assessment::{
    AssessmentFailure, AssessmentResult, AssessmentSummary, AssessmentTotals, FailureStage,
    VmAssessment,
};
pub use cost::{CostBreakdown, CostComponent, CostLine};
pub use session::{
    Session, SessionError, SessionProgress, SessionState, SessionStatus, SessionSummary,
    StateTransition,
};
pub use sizing::{SizingRecommendation, VolumeRecommendation, VolumeTier};
pub use vm::{DiskAllocation, OsFamily, PowerState, VMRecord};
