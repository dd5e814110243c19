//! Database model for institution connections.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use finlink_core::connections::{ConnectionStatus, InstitutionConnection, NewConnection};

#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::institution_connections)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ConnectionDB {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub access_token: String,
    pub institution_id: String,
    pub institution_name: Option<String>,
    pub institution_logo: Option<String>,
    pub provider: String,
    pub status: String,
    pub reauth_required: bool,
    pub reauth_requested_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<ConnectionDB> for InstitutionConnection {
    fn from(db: ConnectionDB) -> Self {
        Self {
            status: db
                .status
                .parse()
                .unwrap_or(ConnectionStatus::Disconnected),
            id: db.id,
            user_id: db.user_id,
            item_id: db.item_id,
            access_token: db.access_token,
            institution_id: db.institution_id,
            institution_name: db.institution_name,
            institution_logo: db.institution_logo,
            provider: db.provider,
            reauth_required: db.reauth_required,
            reauth_requested_at: db.reauth_requested_at,
            last_error: db.last_error,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<NewConnection> for ConnectionDB {
    fn from(domain: NewConnection) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: domain
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: domain.user_id,
            item_id: domain.item_id,
            access_token: domain.access_token,
            institution_id: domain.institution_id,
            institution_name: domain.institution_name,
            institution_logo: domain.institution_logo,
            provider: domain.provider,
            status: ConnectionStatus::Active.as_str().to_string(),
            reauth_required: false,
            reauth_requested_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
