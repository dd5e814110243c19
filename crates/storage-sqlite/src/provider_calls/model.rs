//! Database model for provider call ledger rows.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use finlink_core::provider_calls::{CallStatus, NewProviderCall, ProviderCall};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::provider_calls)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProviderCallDB {
    pub id: String,
    pub endpoint: String,
    pub user_id: Option<String>,
    pub connection_id: Option<String>,
    pub institution_id: Option<String>,
    pub duration_ms: i64,
    pub status: String,
    pub error_type: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<ProviderCallDB> for ProviderCall {
    fn from(db: ProviderCallDB) -> Self {
        Self {
            status: db.status.parse().unwrap_or(CallStatus::Error),
            id: db.id,
            endpoint: db.endpoint,
            user_id: db.user_id,
            connection_id: db.connection_id,
            institution_id: db.institution_id,
            duration_ms: db.duration_ms,
            error_type: db.error_type,
            error_code: db.error_code,
            error_message: db.error_message,
            created_at: db.created_at,
        }
    }
}

impl From<NewProviderCall> for ProviderCallDB {
    fn from(domain: NewProviderCall) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            endpoint: domain.endpoint,
            user_id: domain.user_id,
            connection_id: domain.connection_id,
            institution_id: domain.institution_id,
            duration_ms: domain.duration_ms,
            status: domain.status.as_str().to_string(),
            error_type: domain.error_type,
            error_code: domain.error_code,
            error_message: domain.error_message,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
