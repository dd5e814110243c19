//! Database model for download logs.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use finlink_core::sync::{DownloadLog, DownloadOutcome, NewDownloadLog, SyncMode};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::download_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DownloadLogDB {
    pub id: String,
    pub account_id: String,
    pub mode: String,
    pub outcome: String,
    pub added: i32,
    pub modified: i32,
    pub removed: i32,
    pub downloaded: i32,
    pub pages: i32,
    pub cursor_before: Option<String>,
    pub cursor_after: Option<String>,
    pub error: Option<String>,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

impl From<DownloadLogDB> for DownloadLog {
    fn from(db: DownloadLogDB) -> Self {
        Self {
            mode: db.mode.parse().unwrap_or(SyncMode::Incremental),
            outcome: db.outcome.parse().unwrap_or(DownloadOutcome::Failed),
            id: db.id,
            account_id: db.account_id,
            added: db.added,
            modified: db.modified,
            removed: db.removed,
            downloaded: db.downloaded,
            pages: db.pages,
            cursor_before: db.cursor_before,
            cursor_after: db.cursor_after,
            error: db.error,
            started_at: db.started_at.and_utc(),
            finished_at: db.finished_at.and_utc(),
        }
    }
}

impl From<NewDownloadLog> for DownloadLogDB {
    fn from(domain: NewDownloadLog) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            account_id: domain.account_id,
            mode: domain.mode.as_str().to_string(),
            outcome: domain.outcome.as_str().to_string(),
            added: domain.added,
            modified: domain.modified,
            removed: domain.removed,
            downloaded: domain.downloaded,
            pages: domain.pages,
            cursor_before: domain.cursor_before,
            cursor_after: domain.cursor_after,
            error: domain.error,
            started_at: domain.started_at.naive_utc(),
            finished_at: domain.finished_at.naive_utc(),
        }
    }
}
