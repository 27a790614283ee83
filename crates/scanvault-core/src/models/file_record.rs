use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::scan::{ScanOutcome, ScanStatus};
use crate::error::AppError;

/// Persisted metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileRecord {
    pub file_id: Uuid,
    /// Original client-supplied name; untrusted
    pub filename: String,
    pub size: u64,
    /// Advisory only, as declared by the client
    pub content_type: String,
    /// Backend-specific handle to the stored bytes
    pub location: String,
    pub status: ScanStatus,
    pub scan_result: Option<ScanOutcome>,
    pub scan_timestamp: Option<DateTime<Utc>>,
    /// Handle of the scan task submitted for this file
    pub task_id: Option<Uuid>,
    pub download_count: u64,
    pub last_downloaded: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new_pending(
        file_id: Uuid,
        filename: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            file_id,
            filename: filename.into(),
            size,
            content_type: content_type.into(),
            location: location.into(),
            status: ScanStatus::Pending,
            scan_result: None,
            scan_timestamp: None,
            task_id: None,
            download_count: 0,
            last_downloaded: None,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, next: ScanStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                file_id: self.file_id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> scanning`.
    pub fn begin_scan(&mut self) -> Result<(), AppError> {
        self.transition(ScanStatus::Scanning)
    }

    /// `scanning -> clean | infected | error`, storing the outcome exactly once.
    pub fn complete_scan(
        &mut self,
        outcome: ScanOutcome,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.transition(outcome.status.into())?;
        self.scan_result = Some(outcome);
        self.scan_timestamp = Some(at);
        Ok(())
    }

    pub fn record_download(&mut self, at: DateTime<Utc>) {
        self.download_count = self.download_count.saturating_add(1);
        self.last_downloaded = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> FileRecord {
        FileRecord::new_pending(
            Uuid::new_v4(),
            "note.txt",
            40,
            "text/plain",
            "/data/uploads/x.txt",
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = pending();
        assert_eq!(record.status, ScanStatus::Pending);
        assert_eq!(record.download_count, 0);
        assert!(record.scan_result.is_none());
        assert!(record.scan_timestamp.is_none());
    }

    #[test]
    fn test_pending_cannot_jump_to_terminal() {
        let mut record = pending();
        let err = record
            .complete_scan(ScanOutcome::clean(), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: ScanStatus::Pending,
                to: ScanStatus::Clean,
                ..
            }
        ));
        assert_eq!(record.status, ScanStatus::Pending);
        assert!(record.scan_result.is_none());
    }

    #[test]
    fn test_full_lifecycle_sets_outcome_once() {
        let mut record = pending();
        record.begin_scan().unwrap();
        record
            .complete_scan(ScanOutcome::infected("EICAR-Test"), Utc::now())
            .unwrap();
        assert_eq!(record.status, ScanStatus::Infected);
        assert!(record.scan_timestamp.is_some());

        let second = record.complete_scan(ScanOutcome::clean(), Utc::now());
        assert!(second.is_err());
        assert_eq!(
            record.scan_result.as_ref().map(|o| o.threats.clone()),
            Some(vec!["EICAR-Test".to_string()])
        );
        assert!(record.begin_scan().is_err());
    }

    #[test]
    fn test_record_download_increments() {
        let mut record = pending();
        let now = Utc::now();
        record.record_download(now);
        record.record_download(now);
        assert_eq!(record.download_count, 2);
        assert_eq!(record.last_downloaded, Some(now));
    }

    #[test]
    fn test_record_json_round_trip_keeps_status() {
        let mut record = pending();
        record.begin_scan().unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: FileRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
