//! Research orchestration: prompts, response schemas, stage tracking and the
//! pipeline that drives a question from plan to cited report.

pub mod citations;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod stages;

pub use pipeline::{validate_settings, ResearchPipeline, ResearchReport, StageProviders};
pub use stages::StageTracker;
