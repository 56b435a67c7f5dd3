//! The organization ledger: one row per source file
//!
//! Saves are suppressed when a non-success outcome repeats unchanged, so a
//! periodic scan re-presenting a failing file leaves its row (and its place
//! in the log) alone.

use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

use super::events::{EventSender, OrganizerEvent, emit};
use super::types::{FileSortingStatus, OrganizationResult, QueryResult, ResultQuery, now};
use crate::db::OrganizationResultRepository;

/// How a save treats the previous row's date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Move the row to the top of the log when it turns successful
    AdvanceOnSuccess,
    /// Keep the row where it is (manual corrections)
    Preserve,
}

#[derive(Clone)]
pub struct OrganizationLedger {
    repo: OrganizationResultRepository,
    events: EventSender,
}

impl OrganizationLedger {
    pub fn new(repo: OrganizationResultRepository, events: EventSender) -> Self {
        Self { repo, events }
    }

    pub async fn get_result(&self, id: Uuid) -> Result<Option<OrganizationResult>> {
        self.repo.get_by_id(id).await
    }

    pub async fn get_result_by_source_path(&self, path: &str) -> Result<Option<OrganizationResult>> {
        self.repo.get_by_source_path(path).await
    }

    pub async fn get_results(&self, query: ResultQuery) -> Result<QueryResult<OrganizationResult>> {
        let items = self
            .repo
            .list(query.start_index.unwrap_or(0), query.limit)
            .await?;
        let total_record_count = self.repo.count().await?;

        Ok(QueryResult {
            items,
            total_record_count,
        })
    }

    /// Persist `result`, one row per source path.
    ///
    /// When the previous row has the same non-success status and message,
    /// nothing is written and `result` is replaced by the stored row.
    /// Returns whether a write happened.
    pub async fn save(&self, result: &mut OrganizationResult, policy: DatePolicy) -> Result<bool> {
        if let Some(previous) = self.repo.get_by_id(result.id).await? {
            if result.status != FileSortingStatus::Success
                && previous.status == result.status
                && previous.status_message == result.status_message
            {
                debug!(result_id = %result.id, status = result.status.as_str(), "Outcome unchanged, not saving");
                *result = previous;
                return Ok(false);
            }

            let turned_successful =
                result.status == FileSortingStatus::Success && previous.status != FileSortingStatus::Success;
            result.date = if turned_successful && policy == DatePolicy::AdvanceOnSuccess {
                now().max(previous.date)
            } else {
                previous.date
            };
        }

        self.repo.upsert(result).await?;
        emit(&self.events, OrganizerEvent::ResultUpdated(Box::new(result.clone())));
        Ok(true)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let deleted = self.repo.delete(id).await?;
        if deleted {
            emit(&self.events, OrganizerEvent::ResultDeleted(id));
        }
        Ok(deleted)
    }

    pub async fn clear(&self) -> Result<u64> {
        let removed = self.repo.delete_all().await?;
        emit(&self.events, OrganizerEvent::LogCleared);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::services::organize::types::OrganizerType;
    use chrono::Duration;
    use tokio::sync::broadcast;

    async fn ledger() -> (OrganizationLedger, broadcast::Receiver<OrganizerEvent>) {
        let db = Database::connect_in_memory().await.unwrap();
        let (events, rx) = broadcast::channel(32);
        (OrganizationLedger::new(db.organization_results(), events), rx)
    }

    fn failed(path: &str, message: &str) -> OrganizationResult {
        let mut r = OrganizationResult::new(path, OrganizerType::Episode, 100);
        r.fail(message);
        r
    }

    #[tokio::test]
    async fn test_repeated_failure_is_not_rewritten() {
        let (ledger, _rx) = ledger().await;

        let mut first = failed("/downloads/a.mkv", "Unable to find series in library matching name A");
        first.date = now() - Duration::hours(1);
        assert!(ledger.save(&mut first, DatePolicy::AdvanceOnSuccess).await.unwrap());

        let mut again = failed("/downloads/a.mkv", "Unable to find series in library matching name A");
        assert!(!ledger.save(&mut again, DatePolicy::AdvanceOnSuccess).await.unwrap());
        assert_eq!(again.date, first.date);

        let stored = ledger.get_result(first.id).await.unwrap().unwrap();
        assert_eq!(stored.date, first.date);
        assert_eq!(ledger.get_results(ResultQuery::default()).await.unwrap().total_record_count, 1);
    }

    #[tokio::test]
    async fn test_changed_failure_keeps_date() {
        let (ledger, _rx) = ledger().await;

        let mut first = failed("/downloads/a.mkv", "one");
        first.date = now() - Duration::hours(1);
        ledger.save(&mut first, DatePolicy::AdvanceOnSuccess).await.unwrap();

        let mut second = failed("/downloads/a.mkv", "two");
        assert!(ledger.save(&mut second, DatePolicy::AdvanceOnSuccess).await.unwrap());
        assert_eq!(second.date, first.date);
        assert_eq!(ledger.get_result(first.id).await.unwrap().unwrap().status_message, "two");
    }

    #[tokio::test]
    async fn test_success_moves_row_to_top_unless_preserved() {
        let (ledger, _rx) = ledger().await;
        let hour_ago = now() - Duration::hours(1);

        let mut auto = failed("/downloads/a.mkv", "failed");
        auto.date = hour_ago;
        ledger.save(&mut auto, DatePolicy::AdvanceOnSuccess).await.unwrap();
        auto.succeed();
        ledger.save(&mut auto, DatePolicy::AdvanceOnSuccess).await.unwrap();
        assert!(auto.date > hour_ago);

        let mut corrected = failed("/downloads/b.mkv", "failed");
        corrected.date = hour_ago;
        ledger.save(&mut corrected, DatePolicy::Preserve).await.unwrap();
        corrected.succeed();
        ledger.save(&mut corrected, DatePolicy::Preserve).await.unwrap();
        assert_eq!(corrected.date, hour_ago);
    }

    #[tokio::test]
    async fn test_success_is_always_written() {
        let (ledger, mut rx) = ledger().await;

        let mut r = OrganizationResult::new("/downloads/a.mkv", OrganizerType::Episode, 1);
        r.succeed();
        assert!(ledger.save(&mut r, DatePolicy::AdvanceOnSuccess).await.unwrap());
        assert!(ledger.save(&mut r, DatePolicy::AdvanceOnSuccess).await.unwrap());

        assert!(matches!(rx.try_recv().unwrap(), OrganizerEvent::ResultUpdated(_)));
    }

    #[tokio::test]
    async fn test_delete_and_clear_emit_events() {
        let (ledger, mut rx) = ledger().await;

        let mut r = failed("/downloads/a.mkv", "x");
        ledger.save(&mut r, DatePolicy::AdvanceOnSuccess).await.unwrap();
        let _ = rx.try_recv();

        assert!(ledger.delete(r.id).await.unwrap());
        assert!(matches!(rx.try_recv().unwrap(), OrganizerEvent::ResultDeleted(id) if id == r.id));

        ledger.clear().await.unwrap();
        assert!(matches!(rx.try_recv().unwrap(), OrganizerEvent::LogCleared));
    }
}
