use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::dsl::{count, min};
use diesel::prelude::*;
use std::sync::Arc;

use finlink_core::errors::Result;
use finlink_core::limits::{ManualSyncRepositoryTrait, WindowUsage};

use super::model::ManualSyncEventDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::manual_sync_events;

pub struct ManualSyncRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ManualSyncRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Requests strictly after `window_start`, with the oldest one.
fn window_usage(
    conn: &mut SqliteConnection,
    user_id: &str,
    window_start: NaiveDateTime,
) -> Result<(u32, Option<DateTime<Utc>>)> {
    let (used, oldest) = manual_sync_events::table
        .filter(manual_sync_events::user_id.eq(user_id))
        .filter(manual_sync_events::requested_at.gt(window_start))
        .select((
            count(manual_sync_events::id),
            min(manual_sync_events::requested_at),
        ))
        .first::<(i64, Option<NaiveDateTime>)>(conn)
        .into_core()?;
    Ok((
        u32::try_from(used).unwrap_or(u32::MAX),
        oldest.map(|o| o.and_utc()),
    ))
}

#[async_trait]
impl ManualSyncRepositoryTrait for ManualSyncRepository {
    async fn try_acquire(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        limit: u32,
    ) -> Result<WindowUsage> {
        let user_id = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let (used, oldest) = window_usage(conn, &user_id, window_start.naive_utc())?;
                if used >= limit {
                    return Ok(WindowUsage {
                        used,
                        oldest,
                        granted: false,
                    });
                }

                diesel::insert_into(manual_sync_events::table)
                    .values(ManualSyncEventDB::new(&user_id, now))
                    .execute(conn)
                    .into_core()?;
                Ok(WindowUsage {
                    used: used + 1,
                    oldest: Some(oldest.map_or(now, |o| o.min(now))),
                    granted: true,
                })
            })
            .await
    }

    fn usage(&self, user_id: &str, window_start: DateTime<Utc>) -> Result<WindowUsage> {
        let mut conn = get_connection(&self.pool)?;
        let (used, oldest) = window_usage(&mut conn, user_id, window_start.naive_utc())?;
        Ok(WindowUsage {
            used,
            oldest,
            granted: false,
        })
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                diesel::delete(
                    manual_sync_events::table
                        .filter(manual_sync_events::requested_at.lt(cutoff.naive_utc())),
                )
                .execute(conn)
                .into_core()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use chrono::{Duration, TimeZone};
    use finlink_core::errors::Error;
    use finlink_core::limits::{RateLimitConfig, RateLimitService, RateLimitServiceTrait};
    use finlink_core::UserContext;

    #[tokio::test]
    async fn sixth_request_in_a_day_is_refused_with_reset_time() {
        let db = TestDb::new();
        let repo = Arc::new(ManualSyncRepository::new(db.pool.clone(), db.writer.clone()));
        let service = RateLimitService::new(repo, RateLimitConfig::default());
        let ctx = UserContext::new("user-1");

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        for i in 0..5 {
            let status = service
                .acquire_at(&ctx, t0 + Duration::minutes(i * 10))
                .await
                .unwrap();
            assert_eq!(status.remaining, 4 - i as u32);
        }

        let err = service
            .acquire_at(&ctx, t0 + Duration::hours(2))
            .await
            .unwrap_err();
        match err {
            Error::RateLimited(status) => {
                assert_eq!(status.remaining, 0);
                assert_eq!(status.reset_time, t0 + Duration::hours(24));
                assert!(!status.allowed);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // The first slot frees up once it leaves the window.
        let later = t0 + Duration::hours(24) + Duration::seconds(1);
        assert!(service.acquire_at(&ctx, later).await.is_ok());
    }

    #[tokio::test]
    async fn windows_are_per_user_and_prunable() {
        let db = TestDb::new();
        let repo = ManualSyncRepository::new(db.pool.clone(), db.writer.clone());
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let start = t0 - Duration::hours(24);

        repo.try_acquire("user-1", t0, start, 5).await.unwrap();
        repo.try_acquire("user-2", t0, start, 5).await.unwrap();
        assert_eq!(repo.usage("user-1", start).unwrap().used, 1);

        let pruned = repo.prune_before(t0 + Duration::seconds(1)).await.unwrap();
        assert_eq!(pruned, 2);
        assert_eq!(repo.usage("user-1", start).unwrap().used, 0);
    }
}
