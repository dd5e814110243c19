use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::count;
use diesel::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use finlink_core::errors::Result;
use finlink_core::provider_calls::{
    CallStatus, NewProviderCall, ProviderCall, ProviderCallRepositoryTrait, ProviderCallSummary,
};

use super::model::ProviderCallDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::provider_calls;

pub struct ProviderCallRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProviderCallRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[derive(Default)]
struct Tally {
    total: i64,
    failures: i64,
    duration_ms: i64,
}

#[async_trait]
impl ProviderCallRepositoryTrait for ProviderCallRepository {
    async fn record(&self, call: NewProviderCall) -> Result<()> {
        self.writer
            .exec(move |conn| {
                diesel::insert_into(provider_calls::table)
                    .values(ProviderCallDB::from(call))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn count_failures_since(&self, institution_id: &str, since: NaiveDateTime) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        provider_calls::table
            .filter(provider_calls::institution_id.eq(institution_id))
            .filter(provider_calls::status.eq(CallStatus::Error.as_str()))
            .filter(provider_calls::created_at.ge(since))
            .select(count(provider_calls::id))
            .first::<i64>(&mut conn)
            .into_core()
    }

    fn summary_since(&self, since: NaiveDateTime) -> Result<Vec<ProviderCallSummary>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = provider_calls::table
            .filter(provider_calls::created_at.ge(since))
            .select((
                provider_calls::institution_id,
                provider_calls::endpoint,
                provider_calls::status,
                provider_calls::duration_ms,
            ))
            .load::<(Option<String>, String, String, i64)>(&mut conn)
            .into_core()?;

        let mut tallies: HashMap<(Option<String>, String), Tally> = HashMap::new();
        for (institution_id, endpoint, status, duration_ms) in rows {
            let tally = tallies.entry((institution_id, endpoint)).or_default();
            tally.total += 1;
            tally.duration_ms += duration_ms;
            if status == CallStatus::Error.as_str() {
                tally.failures += 1;
            }
        }

        let mut summary: Vec<ProviderCallSummary> = tallies
            .into_iter()
            .map(|((institution_id, endpoint), tally)| ProviderCallSummary {
                institution_id,
                endpoint,
                total: tally.total,
                failures: tally.failures,
                avg_duration_ms: tally.duration_ms as f64 / tally.total as f64,
            })
            .collect();
        summary.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.institution_id.cmp(&b.institution_id))
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        Ok(summary)
    }

    fn recent_for_institution(
        &self,
        institution_id: &str,
        limit: i64,
    ) -> Result<Vec<ProviderCall>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = provider_calls::table
            .filter(provider_calls::institution_id.eq(institution_id))
            .order((provider_calls::created_at.desc(), provider_calls::id.desc()))
            .limit(limit)
            .select(ProviderCallDB::as_select())
            .load::<ProviderCallDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(ProviderCall::from).collect())
    }
}
