//! Stage records for one research run.
//!
//! Records only move forward: pending → active → completed. A stage may also
//! jump straight to completed when it is skipped. `error` is terminal for the
//! whole run; nothing becomes active after it.

use parking_lot::RwLock;
use shared::events::{PipelineEvent, Stage, StageRecord, StageStatus};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

pub struct StageTracker {
    run_id: Uuid,
    records: Arc<RwLock<Vec<StageRecord>>>,
    events: Option<UnboundedSender<PipelineEvent>>,
}

impl StageTracker {
    pub fn new(run_id: Uuid, events: Option<UnboundedSender<PipelineEvent>>) -> Self {
        let records = Stage::all().iter().map(|s| StageRecord::pending(*s)).collect();
        Self {
            run_id,
            records: Arc::new(RwLock::new(records)),
            events,
        }
    }

    /// Handle observers can read while the run is in flight.
    pub fn shared(&self) -> Arc<RwLock<Vec<StageRecord>>> {
        self.records.clone()
    }

    pub fn snapshot(&self) -> Vec<StageRecord> {
        self.records.read().clone()
    }

    pub fn active(&self) -> Option<Stage> {
        self.records
            .read()
            .iter()
            .find(|r| r.status == StageStatus::Active)
            .map(|r| r.stage)
    }

    /// Make `stage` the active one. Refused (returns false) unless every
    /// earlier stage has completed and the run has not failed.
    pub fn activate(&self, stage: Stage, title: impl Into<String>, detail: impl Into<String>) -> bool {
        {
            let records = self.records.read();
            let ready = records[..stage.index()]
                .iter()
                .all(|r| r.status == StageStatus::Completed)
                && records[stage.index()].status == StageStatus::Pending;
            if !ready {
                tracing::error!(?stage, "stage activated out of order");
                return false;
            }
        }
        self.set(stage, StageStatus::Active, title.into(), detail.into());
        true
    }

    /// Mark `stage` completed, from active or straight from pending (skip).
    pub fn complete(&self, stage: Stage, title: impl Into<String>, detail: impl Into<String>) {
        let status = self.records.read()[stage.index()].status;
        if matches!(status, StageStatus::Completed | StageStatus::Error) {
            tracing::error!(?stage, ?status, "stage already finished");
            return;
        }
        self.set(stage, StageStatus::Completed, title.into(), detail.into());
    }

    /// Record a run-level failure on the active stage, or on the next stage
    /// that never started when the failure fell between two stages.
    pub fn fail(&self, message: &str) -> Option<Stage> {
        let target = {
            let records = self.records.read();
            if records.iter().any(|r| r.status == StageStatus::Error) {
                return None;
            }
            records
                .iter()
                .find(|r| r.status == StageStatus::Active)
                .or_else(|| records.iter().find(|r| r.status == StageStatus::Pending))
                .map(|r| r.stage)
        }?;
        self.set(target, StageStatus::Error, "Error".to_string(), message.to_string());
        Some(target)
    }

    fn set(&self, stage: Stage, status: StageStatus, title: String, detail: String) {
        let record = {
            let mut records = self.records.write();
            let record = &mut records[stage.index()];
            record.status = status;
            record.title = title;
            record.detail = detail;
            record.clone()
        };
        tracing::info!(run_id = %self.run_id, ?stage, ?status, "stage update");
        if let Some(tx) = &self.events {
            let _ = tx.send(PipelineEvent::StageChanged {
                run_id: self.run_id,
                record,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn statuses(tracker: &StageTracker) -> Vec<StageStatus> {
        tracker.snapshot().iter().map(|r| r.status).collect()
    }

    #[test]
    fn test_forward_progress() {
        let tracker = StageTracker::new(Uuid::new_v4(), None);
        assert!(tracker.activate(Stage::Plan, "Planning", ""));
        assert_eq!(tracker.active(), Some(Stage::Plan));

        // Search cannot start before Plan completes.
        assert!(!tracker.activate(Stage::Search, "Searching", ""));

        tracker.complete(Stage::Plan, "Planned", "3 queries");
        assert!(tracker.activate(Stage::Search, "Searching", ""));
        tracker.complete(Stage::Search, "Searched", "");
        assert!(tracker.activate(Stage::Filter, "Filtering", ""));
        tracker.complete(Stage::Filter, "Filtered", "");
        tracker.complete(Stage::Read, "Deep read skipped", "no reader key");
        assert!(tracker.activate(Stage::Synthesize, "Writing", ""));
        tracker.complete(Stage::Synthesize, "Done", "");

        assert!(statuses(&tracker).iter().all(|s| *s == StageStatus::Completed));
        assert_eq!(tracker.snapshot()[0].detail, "3 queries");
    }

    #[test]
    fn test_error_is_terminal() {
        let tracker = StageTracker::new(Uuid::new_v4(), None);
        tracker.activate(Stage::Plan, "", "");
        tracker.complete(Stage::Plan, "", "");
        tracker.activate(Stage::Search, "", "");
        tracker.complete(Stage::Search, "", "");
        tracker.activate(Stage::Filter, "", "");

        assert_eq!(tracker.fail("failed to parse source selection"), Some(Stage::Filter));
        assert_eq!(tracker.active(), None);
        assert!(!tracker.activate(Stage::Read, "", ""));
        assert!(!tracker.activate(Stage::Synthesize, "", ""));
        assert_eq!(tracker.fail("again"), None);

        let records = tracker.snapshot();
        let errors: Vec<_> = records
            .iter()
            .filter(|r| r.status == StageStatus::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail, "failed to parse source selection");
    }

    #[test]
    fn test_failure_between_stages_marks_next() {
        let tracker = StageTracker::new(Uuid::new_v4(), None);
        tracker.activate(Stage::Plan, "", "");
        tracker.complete(Stage::Plan, "", "");
        assert_eq!(tracker.fail("superseded"), Some(Stage::Search));
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run_id = Uuid::new_v4();
        let tracker = StageTracker::new(run_id, Some(tx));
        tracker.activate(Stage::Plan, "Planning", "q");
        tracker.complete(Stage::Plan, "Planned", "");

        match rx.recv().await {
            Some(PipelineEvent::StageChanged { run_id: id, record }) => {
                assert_eq!(id, run_id);
                assert_eq!(record.status, StageStatus::Active);
                assert_eq!(record.title, "Planning");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::StageChanged { record, .. }) if record.status == StageStatus::Completed
        ));
    }
}
