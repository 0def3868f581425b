//! SQLite implementation of the audit repository.

use async_trait::async_trait;
use belay_core::{
    AccountId, AuditEntry, Error, NewAuditEntry, error::StorageError,
    repositories::AuditRepository,
};
use chrono::DateTime;
use sqlx::SqlitePool;

const AUDIT_COLUMNS: &str = "id, action, performer_id, performer_type, detail, source_ip, \
     status, affected_account_id, created_at";

pub struct SqliteAuditRepository {
    pool: SqlitePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteAuditEntry {
    id: i64,
    action: String,
    performer_id: Option<i64>,
    performer_type: String,
    detail: String,
    source_ip: Option<String>,
    status: String,
    affected_account_id: Option<i64>,
    created_at: i64,
}

impl TryFrom<SqliteAuditEntry> for AuditEntry {
    type Error = Error;

    fn try_from(row: SqliteAuditEntry) -> Result<Self, Self::Error> {
        let invalid = |e: belay_core::error::ValidationError| {
            tracing::error!(error = %e, audit_id = row.id, "Invalid value in audit_entries");
            Error::from(StorageError::Database("Invalid audit entry".to_string()))
        };

        Ok(AuditEntry {
            id: row.id,
            action: row.action.parse().map_err(invalid)?,
            performer_id: row.performer_id.map(AccountId::new),
            performer_type: row.performer_type.parse().map_err(invalid)?,
            detail: row.detail,
            source_ip: row.source_ip,
            status: row.status.parse().map_err(invalid)?,
            affected_account_id: row.affected_account_id.map(AccountId::new),
            created_at: DateTime::from_timestamp(row.created_at, 0)
                .ok_or_else(|| StorageError::Database("Invalid timestamp".to_string()))?,
        })
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditEntry, Error> {
        let row = sqlx::query_as::<_, SqliteAuditEntry>(&format!(
            r#"
            INSERT INTO audit_entries
                (action, performer_id, performer_type, detail, source_ip, status,
                 affected_account_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(entry.action.as_str())
        .bind(entry.performer_id.map(|id| id.as_i64()))
        .bind(entry.performer_type.as_str())
        .bind(&entry.detail)
        .bind(&entry.source_ip)
        .bind(entry.status.as_str())
        .bind(entry.affected_account_id.map(|id| id.as_i64()))
        .bind(entry.created_at.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to append audit entry");
            StorageError::Database("Failed to append audit entry".to_string())
        })?;

        row.try_into()
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteAuditEntry>(&format!(
            r#"
            SELECT {AUDIT_COLUMNS} FROM audit_entries
            WHERE affected_account_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#
        ))
        .bind(account_id.as_i64())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, account_id = %account_id, "Failed to list audit entries");
            StorageError::Database("Failed to list audit entries".to_string())
        })?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, Error> {
        let rows = sqlx::query_as::<_, SqliteAuditEntry>(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audit_entries ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list audit entries");
            StorageError::Database("Failed to list audit entries".to_string())
        })?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{SqliteMigrationManager, migrations};
    use belay_core::{AuditAction, AuditStatus, PerformerType};
    use belay_migration::MigrationManager;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        let manager = SqliteMigrationManager::new(pool.clone());
        manager
            .initialize()
            .await
            .expect("Failed to initialize migrations");
        manager
            .up(&migrations())
            .await
            .expect("Failed to run migrations");
        pool
    }

    #[tokio::test]
    async fn test_append_and_list() {
        let repo = SqliteAuditRepository::new(setup_test_db().await);

        let stored = repo
            .append(
                NewAuditEntry::new(AuditAction::Login, AuditStatus::Failed, "Login failed")
                    .affecting(AccountId::new(7))
                    .from_ip(Some("198.51.100.4")),
            )
            .await
            .unwrap();
        assert_eq!(stored.action, AuditAction::Login);
        assert_eq!(stored.status, AuditStatus::Failed);
        assert_eq!(stored.performer_type, PerformerType::Anonymous);
        assert_eq!(stored.source_ip.as_deref(), Some("198.51.100.4"));

        repo.append(
            NewAuditEntry::new(AuditAction::Login, AuditStatus::Success, "Login succeeded")
                .performed_by(AccountId::new(7))
                .affecting(AccountId::new(7)),
        )
        .await
        .unwrap();
        repo.append(NewAuditEntry::new(
            AuditAction::Login,
            AuditStatus::Failed,
            "Login failed: unknown login name",
        ))
        .await
        .unwrap();

        let for_account = repo.find_by_account(AccountId::new(7), 10).await.unwrap();
        assert_eq!(for_account.len(), 2);
        assert_eq!(for_account[0].status, AuditStatus::Success);
        assert_eq!(for_account[0].performer_id, Some(AccountId::new(7)));

        let recent = repo.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].affected_account_id, None);
    }
}
