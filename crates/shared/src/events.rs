//! Stage records and the events a research run emits while it progresses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Plan,
    Search,
    Filter,
    Read,
    Synthesize,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Plan,
            Stage::Search,
            Stage::Filter,
            Stage::Read,
            Stage::Synthesize,
        ]
    }

    pub fn index(&self) -> usize {
        match self {
            Stage::Plan => 0,
            Stage::Search => 1,
            Stage::Filter => 2,
            Stage::Read => 3,
            Stage::Synthesize => 4,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Plan => "Analyze intent",
            Stage::Search => "Run searches",
            Stage::Filter => "Select sources",
            Stage::Read => "Deep read",
            Stage::Synthesize => "Write report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Error,
}

/// Status and human-readable detail for one stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub index: usize,
    pub stage: Stage,
    pub status: StageStatus,
    pub title: String,
    pub detail: String,
}

impl StageRecord {
    pub fn pending(stage: Stage) -> Self {
        Self {
            index: stage.index(),
            stage,
            status: StageStatus::Pending,
            title: stage.display_name().to_string(),
            detail: String::new(),
        }
    }
}

/// Real-time updates from a research run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A stage record changed status or detail
    StageChanged { run_id: Uuid, record: StageRecord },
    /// One streamed fragment of the final answer
    Delta { run_id: Uuid, text: String },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::StageChanged { run_id, .. } => *run_id,
            PipelineEvent::Delta { run_id, .. } => *run_id,
        }
    }
}
