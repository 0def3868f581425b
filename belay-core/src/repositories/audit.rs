use async_trait::async_trait;

use crate::{
    Error,
    account::AccountId,
    audit::{AuditEntry, NewAuditEntry},
};

/// Append-only storage for audit entries.
///
/// Entries are never updated or deleted once written.
#[async_trait]
pub trait AuditRepository: Send + Sync + 'static {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, Error>;

    /// Entries affecting an account, newest first.
    async fn find_by_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, Error>;
}
