// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job rows, their parameters and state history.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use stowage_core::{ensure_not_empty, JobData, JobId, NewJob, StateData, StowageError};

use crate::database::Database;
use crate::models::{duration_millis, from_millis, to_millis};
use crate::schema::Tables;

/// Insert a job with its parameters; it expires `expire_in` after `created_at`.
pub async fn create_expired_job(
    db: &Database,
    tables: &Tables,
    job: &NewJob,
    parameters: &HashMap<String, String>,
    created_at: DateTime<Utc>,
    expire_in: Duration,
) -> Result<JobId, StowageError> {
    for name in parameters.keys() {
        ensure_not_empty("parameter name", name)?;
    }

    let insert_job = format!(
        "INSERT INTO {} (invocation_data, arguments, created_at, expire_at) \
         VALUES (?1, ?2, ?3, ?4)",
        tables.job
    );
    let insert_parameter = format!(
        "INSERT INTO {} (job_id, name, value) VALUES (?1, ?2, ?3)",
        tables.job_parameter
    );
    let job = job.clone();
    let parameters: Vec<(String, String)> = parameters
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let created_at = to_millis(created_at);
    let expire_at = created_at.saturating_add(duration_millis(expire_in));

    db.call_with_retry(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            &insert_job,
            params![job.invocation_data, job.arguments, created_at, expire_at],
        )?;
        let job_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(&insert_parameter)?;
            for (name, value) in &parameters {
                stmt.execute(params![job_id, name, value])?;
            }
        }
        tx.commit()?;
        Ok(job_id)
    })
    .await
}

pub async fn get_job_data(
    db: &Database,
    tables: &Tables,
    job_id: JobId,
) -> Result<Option<JobData>, StowageError> {
    let sql = format!(
        "SELECT state_name, invocation_data, arguments, created_at FROM {} WHERE id = ?1",
        tables.job
    );
    db.call_with_retry(move |conn| {
        conn.query_row(&sql, params![job_id], |row| {
            Ok(JobData {
                id: job_id,
                state_name: row.get(0)?,
                invocation_data: row.get(1)?,
                arguments: row.get(2)?,
                created_at: from_millis(row.get(3)?),
            })
        })
        .optional()
    })
    .await
}

/// Set a named parameter, replacing any previous value.
pub async fn set_job_parameter(
    db: &Database,
    tables: &Tables,
    job_id: JobId,
    name: &str,
    value: &str,
) -> Result<(), StowageError> {
    ensure_not_empty("name", name)?;
    let sql = format!(
        "INSERT INTO {} (job_id, name, value) VALUES (?1, ?2, ?3) \
         ON CONFLICT (job_id, name) DO UPDATE SET value = excluded.value",
        tables.job_parameter
    );
    let name = name.to_string();
    let value = value.to_string();
    db.call_with_retry(move |conn| conn.execute(&sql, params![job_id, name, value]))
        .await?;
    Ok(())
}

pub async fn get_job_parameter(
    db: &Database,
    tables: &Tables,
    job_id: JobId,
    name: &str,
) -> Result<Option<String>, StowageError> {
    ensure_not_empty("name", name)?;
    let sql = format!(
        "SELECT value FROM {} WHERE job_id = ?1 AND name = ?2",
        tables.job_parameter
    );
    let name = name.to_string();
    let value = db
        .call_with_retry(move |conn| {
            conn.query_row(&sql, params![job_id, name], |row| row.get::<_, Option<String>>(0))
                .optional()
        })
        .await?;
    Ok(value.flatten())
}

/// The job's current state, `None` for an unknown job or one without state.
pub async fn get_state_data(
    db: &Database,
    tables: &Tables,
    job_id: JobId,
) -> Result<Option<StateData>, StowageError> {
    let sql = format!(
        "SELECT s.name, s.reason, s.data FROM {state} s \
         JOIN {job} j ON j.state_id = s.id WHERE j.id = ?1",
        state = tables.state,
        job = tables.job,
    );
    let row = db
        .call_with_retry(move |conn| {
            conn.query_row(&sql, params![job_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .optional()
        })
        .await?;

    let Some((name, reason, data)) = row else {
        return Ok(None);
    };
    let data: HashMap<String, String> = match data {
        Some(json) => serde_json::from_str(&json)?,
        None => HashMap::new(),
    };
    Ok(Some(StateData { name, reason, data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    fn new_job() -> NewJob {
        NewJob {
            invocation_data: r#"{"type":"Mailer","method":"Send"}"#.into(),
            arguments: r#"["hello"]"#.into(),
        }
    }

    #[tokio::test]
    async fn created_job_reads_back_with_parameters() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        let created_at = from_millis(1_700_000_000_000);
        let parameters = HashMap::from([("CurrentCulture".to_string(), "en-US".to_string())]);

        let id = create_expired_job(&db, &ctx.tables, &new_job(), &parameters, created_at, Duration::from_secs(3600))
            .await
            .unwrap();

        let data = get_job_data(&db, &ctx.tables, id).await.unwrap().unwrap();
        assert_eq!(data.id, id);
        assert_eq!(data.state_name, None);
        assert_eq!(data.invocation_data, new_job().invocation_data);
        assert_eq!(data.created_at, created_at);

        assert_eq!(
            get_job_parameter(&db, &ctx.tables, id, "CurrentCulture").await.unwrap().as_deref(),
            Some("en-US")
        );
    }

    #[tokio::test]
    async fn job_parameter_is_overwritten() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        let id = create_expired_job(&db, &ctx.tables, &new_job(), &HashMap::new(), Utc::now(), Duration::from_secs(60))
            .await
            .unwrap();

        set_job_parameter(&db, &ctx.tables, id, "RetryCount", "1").await.unwrap();
        set_job_parameter(&db, &ctx.tables, id, "RetryCount", "2").await.unwrap();
        assert_eq!(
            get_job_parameter(&db, &ctx.tables, id, "RetryCount").await.unwrap().as_deref(),
            Some("2")
        );
        assert_eq!(get_job_parameter(&db, &ctx.tables, id, "Missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_job_reads_as_none() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(get_job_data(&db, &ctx.tables, 999).await.unwrap(), None);
        assert_eq!(get_state_data(&db, &ctx.tables, 999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_parameter_name_is_rejected() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        let err = set_job_parameter(&db, &ctx.tables, 1, "", "x").await.unwrap_err();
        assert!(matches!(err, StowageError::Argument { name: "name", .. }));
    }
}
