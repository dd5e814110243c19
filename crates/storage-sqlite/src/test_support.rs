use std::sync::Arc;
use tempfile::TempDir;

use finlink_core::accounts::{AccountRepositoryTrait, NewAccount};
use finlink_core::connections::{ConnectionRepositoryTrait, NewConnection};

use crate::accounts::AccountRepository;
use crate::connections::ConnectionRepository;
use crate::db::{create_pool, init, run_migrations, spawn_writer, DbPool, WriteHandle};

/// Migrated database in a temp dir. Must be created inside a Tokio runtime.
pub struct TestDb {
    pub pool: Arc<DbPool>,
    pub writer: WriteHandle,
    _dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finlink-test.db");
        let db_path = init(path.to_str().unwrap()).unwrap();
        let pool = create_pool(&db_path).unwrap();
        run_migrations(&pool).unwrap();
        let writer = spawn_writer((*pool).clone());
        Self {
            pool,
            writer,
            _dir: dir,
        }
    }

    /// One connection with one depository account. Returns the account id.
    pub async fn seed_account(&self, remote_account_id: &str) -> String {
        let connection = ConnectionRepository::new(self.pool.clone(), self.writer.clone())
            .create(NewConnection {
                id: None,
                user_id: "user-1".to_string(),
                item_id: format!("item-{remote_account_id}"),
                access_token: "access-sandbox".to_string(),
                institution_id: "ins_1".to_string(),
                institution_name: None,
                institution_logo: None,
                provider: "plaid".to_string(),
            })
            .await
            .unwrap();
        AccountRepository::new(self.pool.clone(), self.writer.clone())
            .create(NewAccount {
                id: None,
                connection_id: connection.id,
                remote_account_id: remote_account_id.to_string(),
                name: "Checking".to_string(),
                official_name: None,
                account_type: "depository".to_string(),
                subtype: Some("checking".to_string()),
                mask: Some("0000".to_string()),
            })
            .await
            .unwrap()
            .id
    }
}
