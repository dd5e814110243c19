//! Database model for granted manual sync requests.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;

#[derive(Queryable, Insertable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::manual_sync_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ManualSyncEventDB {
    pub id: String,
    pub user_id: String,
    pub requested_at: NaiveDateTime,
}

impl ManualSyncEventDB {
    pub fn new(user_id: &str, requested_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            requested_at: requested_at.naive_utc(),
        }
    }
}
