use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use std::sync::Arc;

use finlink_core::connections::{
    ConnectionRepositoryTrait, ConnectionStatus, InstitutionConnection, NewConnection,
};
use finlink_core::errors::{Error, Result};

use super::model::ConnectionDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, OrNotFound};
use crate::schema::institution_connections;

pub struct ConnectionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ConnectionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn load(conn: &mut SqliteConnection, connection_id: &str) -> Result<ConnectionDB> {
    institution_connections::table
        .find(connection_id)
        .select(ConnectionDB::as_select())
        .first::<ConnectionDB>(conn)
        .or_not_found("Connection", connection_id)
}

#[async_trait]
impl ConnectionRepositoryTrait for ConnectionRepository {
    async fn create(&self, new_connection: NewConnection) -> Result<InstitutionConnection> {
        new_connection.validate()?;

        self.writer
            .exec(move |conn| {
                let row: ConnectionDB = new_connection.into();
                diesel::insert_into(institution_connections::table)
                    .values(&row)
                    .execute(conn)
                    .into_core()?;
                Ok(row.into())
            })
            .await
    }

    async fn update_credentials(
        &self,
        connection_id: &str,
        access_token: String,
    ) -> Result<InstitutionConnection> {
        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(institution_connections::table.find(&connection_id))
                    .set((
                        institution_connections::access_token.eq(access_token),
                        institution_connections::status.eq(ConnectionStatus::Active.as_str()),
                        institution_connections::reauth_required.eq(false),
                        institution_connections::reauth_requested_at.eq(None::<NaiveDateTime>),
                        institution_connections::last_error.eq(None::<String>),
                        institution_connections::updated_at.eq(chrono::Utc::now().naive_utc()),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(load(conn, &connection_id)?.into())
            })
            .await
    }

    async fn flag_reauth_required(&self, connection_id: &str, error: String) -> Result<()> {
        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                let now = chrono::Utc::now().naive_utc();
                let affected = diesel::update(institution_connections::table.find(&connection_id))
                    .set((
                        institution_connections::reauth_required.eq(true),
                        institution_connections::reauth_requested_at.eq(Some(now)),
                        institution_connections::last_error.eq(Some(error)),
                        institution_connections::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .into_core()?;
                if affected == 0 {
                    return Err(Error::not_found("Connection", connection_id));
                }
                Ok(())
            })
            .await
    }

    async fn mark_disconnected(&self, connection_id: &str) -> Result<InstitutionConnection> {
        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(institution_connections::table.find(&connection_id))
                    .set((
                        institution_connections::status
                            .eq(ConnectionStatus::Disconnected.as_str()),
                        institution_connections::access_token.eq(""),
                        institution_connections::updated_at.eq(chrono::Utc::now().naive_utc()),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(load(conn, &connection_id)?.into())
            })
            .await
    }

    async fn delete(&self, connection_id: &str) -> Result<usize> {
        let connection_id = connection_id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(institution_connections::table.find(connection_id))
                    .execute(conn)
                    .into_core()
            })
            .await
    }

    fn get_by_id(&self, connection_id: &str) -> Result<InstitutionConnection> {
        let mut conn = get_connection(&self.pool)?;
        Ok(load(&mut conn, connection_id)?.into())
    }

    fn get_by_item_id(&self, item_id: &str) -> Result<Option<InstitutionConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let row = institution_connections::table
            .filter(institution_connections::item_id.eq(item_id))
            .select(ConnectionDB::as_select())
            .first::<ConnectionDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(InstitutionConnection::from))
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<InstitutionConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = institution_connections::table
            .filter(institution_connections::user_id.eq(user_id))
            .order((
                institution_connections::created_at.asc(),
                institution_connections::id.asc(),
            ))
            .select(ConnectionDB::as_select())
            .load::<ConnectionDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(InstitutionConnection::from).collect())
    }

    fn list_for_institution(
        &self,
        user_id: &str,
        institution_id: &str,
    ) -> Result<Vec<InstitutionConnection>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = institution_connections::table
            .filter(institution_connections::user_id.eq(user_id))
            .filter(institution_connections::institution_id.eq(institution_id))
            .order((
                institution_connections::created_at.asc(),
                institution_connections::id.asc(),
            ))
            .select(ConnectionDB::as_select())
            .load::<ConnectionDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(InstitutionConnection::from).collect())
    }

    fn list_user_ids(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        institution_connections::table
            .filter(institution_connections::status.eq(ConnectionStatus::Active.as_str()))
            .select(institution_connections::user_id)
            .distinct()
            .order(institution_connections::user_id.asc())
            .load::<String>(&mut conn)
            .into_core()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountRepository;
    use crate::test_support::TestDb;
    use finlink_core::accounts::AccountRepositoryTrait;

    fn new_connection(item_id: &str) -> NewConnection {
        NewConnection {
            id: None,
            user_id: "user-1".to_string(),
            item_id: item_id.to_string(),
            access_token: "access-1".to_string(),
            institution_id: "ins_1".to_string(),
            institution_name: Some("First Bank".to_string()),
            institution_logo: None,
            provider: "plaid".to_string(),
        }
    }

    #[tokio::test]
    async fn item_ids_are_unique() {
        let db = TestDb::new();
        let repo = ConnectionRepository::new(db.pool.clone(), db.writer.clone());
        repo.create(new_connection("item-1")).await.unwrap();
        let err = repo.create(new_connection("item-1")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn new_credentials_clear_the_reauth_flag() {
        let db = TestDb::new();
        let repo = ConnectionRepository::new(db.pool.clone(), db.writer.clone());
        let created = repo.create(new_connection("item-1")).await.unwrap();

        repo.flag_reauth_required(&created.id, "ITEM_LOGIN_REQUIRED".to_string())
            .await
            .unwrap();
        let flagged = repo.get_by_id(&created.id).unwrap();
        assert!(flagged.reauth_required);
        assert!(flagged.reauth_requested_at.is_some());
        assert!(!flagged.is_usable());

        let refreshed = repo
            .update_credentials(&created.id, "access-2".to_string())
            .await
            .unwrap();
        assert!(!refreshed.reauth_required);
        assert_eq!(refreshed.access_token, "access-2");
        assert!(refreshed.last_error.is_none());
    }

    #[tokio::test]
    async fn disconnect_blanks_the_credential() {
        let db = TestDb::new();
        let repo = ConnectionRepository::new(db.pool.clone(), db.writer.clone());
        let created = repo.create(new_connection("item-1")).await.unwrap();

        let disconnected = repo.mark_disconnected(&created.id).await.unwrap();
        assert_eq!(disconnected.status, ConnectionStatus::Disconnected);
        assert!(disconnected.access_token.is_empty());
        assert!(repo.list_user_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_cascades_to_accounts() {
        let db = TestDb::new();
        let account_id = db.seed_account("remote-1").await;
        let accounts = AccountRepository::new(db.pool.clone(), db.writer.clone());
        let connection_id = accounts.get_by_id(&account_id).unwrap().connection_id;

        let repo = ConnectionRepository::new(db.pool.clone(), db.writer.clone());
        assert_eq!(repo.delete(&connection_id).await.unwrap(), 1);
        assert!(matches!(
            accounts.get_by_id(&account_id),
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_connection_is_not_found() {
        let db = TestDb::new();
        let repo = ConnectionRepository::new(db.pool.clone(), db.writer.clone());
        assert!(matches!(
            repo.flag_reauth_required("missing", "x".to_string()).await,
            Err(Error::NotFound { entity: "Connection", .. })
        ));
        assert!(repo.get_by_item_id("missing").unwrap().is_none());
    }
}
