//! Database model for accounts.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use finlink_core::accounts::{Account, NewAccount};

/// Database model for accounts
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AccountDB {
    pub id: String,
    pub connection_id: String,
    pub remote_account_id: String,
    pub name: String,
    pub official_name: Option<String>,
    pub account_type: String,
    pub subtype: Option<String>,
    pub mask: Option<String>,
    pub is_archived: bool,
    pub is_hidden: bool,
    pub sync_cursor: Option<String>,
    pub last_synced_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<AccountDB> for Account {
    fn from(db: AccountDB) -> Self {
        Self {
            id: db.id,
            connection_id: db.connection_id,
            remote_account_id: db.remote_account_id,
            name: db.name,
            official_name: db.official_name,
            account_type: db.account_type,
            subtype: db.subtype,
            mask: db.mask,
            is_archived: db.is_archived,
            is_hidden: db.is_hidden,
            sync_cursor: db.sync_cursor,
            last_synced_at: db.last_synced_at,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<NewAccount> for AccountDB {
    fn from(domain: NewAccount) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: domain
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            connection_id: domain.connection_id,
            remote_account_id: domain.remote_account_id,
            name: domain.name,
            official_name: domain.official_name,
            account_type: domain.account_type,
            subtype: domain.subtype,
            mask: domain.mask,
            is_archived: false,
            is_hidden: false,
            sync_cursor: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
