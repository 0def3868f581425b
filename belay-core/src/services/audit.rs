use std::sync::Arc;

use crate::{
    Error,
    account::AccountId,
    audit::{AuditEntry, AuditStatus, NewAuditEntry},
    repositories::AuditRepository,
};

/// Best-effort writer of audit entries.
///
/// A failed write is reported to the operational log and otherwise ignored;
/// it never changes the outcome of the operation being audited.
pub struct AuditLogger<R: AuditRepository> {
    repository: Arc<R>,
}

impl<R: AuditRepository> Clone for AuditLogger<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<R: AuditRepository> AuditLogger<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub async fn record(&self, entry: NewAuditEntry) {
        let action = entry.action;
        let status = entry.status;
        let affected = entry.affected_account_id;

        match status {
            AuditStatus::Success => tracing::info!(
                action = %action,
                status = %status,
                account_id = ?affected.map(|id| id.as_i64()),
                source_ip = ?entry.source_ip,
                "{}",
                entry.detail
            ),
            AuditStatus::Failed | AuditStatus::Blocked => tracing::warn!(
                action = %action,
                status = %status,
                account_id = ?affected.map(|id| id.as_i64()),
                source_ip = ?entry.source_ip,
                "{}",
                entry.detail
            ),
        }

        if let Err(e) = self.repository.append(entry).await {
            tracing::error!(
                error = %e,
                action = %action,
                status = %status,
                "Failed to write audit entry"
            );
        }
    }

    /// Entries affecting an account, newest first.
    pub async fn find_by_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error> {
        self.repository.find_by_account(account_id, limit).await
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        self.repository.recent(limit).await
    }
}
