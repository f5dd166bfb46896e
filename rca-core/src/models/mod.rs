pub mod analysis;
pub mod feedback;
pub mod record;

pub use analysis::{DetectedError, FixPlan, LogAnalysis, Solution};
pub use feedback::Feedback;
pub use record::{AnalysisRecord, NewRecord};
