use std::future::Future;

use anyhow::{bail, Result};
use chrono::SecondsFormat;
use rusqlite::{params, OptionalExtension, Row, Rows};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{
        parse_datetime, parse_pass_fail, parse_tier, parse_verdict, parse_yes_no, to_score,
    },
};
use crate::models::{ResultRecord, StoredResult};

const SELECT_COLUMNS: &str = "id, user_id, left_eye_score, right_eye_score, left_eye_result,
     right_eye_result, overall_result, left_eye_answer, right_eye_answer, glaring_answer,
     headache_answer, astigmatism_result, schedule_follow_up, created_at";

/// Durable store for finished screenings.
pub trait ResultStore: Send + Sync + 'static {
    /// Persist a record for `user_id` and return its generated id.
    fn save_result(
        &self,
        user_id: &str,
        record: &ResultRecord,
    ) -> impl Future<Output = Result<String>> + Send;

    /// All results for a user, most recent first.
    fn list_results(&self, user_id: &str) -> impl Future<Output = Result<Vec<StoredResult>>> + Send;

    fn list_results_paginated(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<StoredResult>>> + Send;

    fn get_result(&self, id: &str) -> impl Future<Output = Result<Option<StoredResult>>> + Send;
}

fn row_to_result(row: &Row) -> Result<StoredResult> {
    let left_eye_score: i64 = row.get("left_eye_score")?;
    let right_eye_score: i64 = row.get("right_eye_score")?;
    let left_eye_result: String = row.get("left_eye_result")?;
    let right_eye_result: String = row.get("right_eye_result")?;
    let overall_result: String = row.get("overall_result")?;
    let left_eye_answer: String = row.get("left_eye_answer")?;
    let right_eye_answer: String = row.get("right_eye_answer")?;
    let glaring_answer: String = row.get("glaring_answer")?;
    let headache_answer: String = row.get("headache_answer")?;
    let astigmatism_result: String = row.get("astigmatism_result")?;
    let schedule_follow_up: i64 = row.get("schedule_follow_up")?;
    let created_at: String = row.get("created_at")?;

    Ok(StoredResult {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        record: ResultRecord {
            left_eye_score: to_score(left_eye_score, "left_eye_score")?,
            right_eye_score: to_score(right_eye_score, "right_eye_score")?,
            left_eye_result: parse_pass_fail(&left_eye_result, "left_eye_result")?,
            right_eye_result: parse_pass_fail(&right_eye_result, "right_eye_result")?,
            overall_result: parse_tier(&overall_result)?,
            left_eye_answer: parse_yes_no(&left_eye_answer, "left_eye_answer")?,
            right_eye_answer: parse_yes_no(&right_eye_answer, "right_eye_answer")?,
            glaring_answer: parse_yes_no(&glaring_answer, "glaring_answer")?,
            headache_answer: parse_yes_no(&headache_answer, "headache_answer")?,
            astigmatism_result: parse_verdict(&astigmatism_result)?,
            schedule_follow_up: schedule_follow_up != 0,
            created_at: parse_datetime(&created_at, "created_at")?,
        },
    })
}

fn collect_rows(mut rows: Rows<'_>) -> Result<Vec<StoredResult>> {
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        results.push(row_to_result(row)?);
    }
    Ok(results)
}

impl ResultStore for Database {
    async fn save_result(&self, user_id: &str, record: &ResultRecord) -> Result<String> {
        if user_id.trim().is_empty() {
            bail!("user id must not be empty");
        }

        let id = Uuid::new_v4().to_string();
        let user_id = user_id.to_string();
        let record = record.clone();
        let row_id = id.clone();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO results (id, user_id, left_eye_score, right_eye_score, left_eye_result,
                     right_eye_result, overall_result, left_eye_answer, right_eye_answer,
                     glaring_answer, headache_answer, astigmatism_result, schedule_follow_up,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    row_id,
                    user_id,
                    i64::from(record.left_eye_score),
                    i64::from(record.right_eye_score),
                    record.left_eye_result.as_str(),
                    record.right_eye_result.as_str(),
                    record.overall_result.as_str(),
                    record.left_eye_answer.as_str(),
                    record.right_eye_answer.as_str(),
                    record.glaring_answer.as_str(),
                    record.headache_answer.as_str(),
                    record.astigmatism_result.message(),
                    record.schedule_follow_up,
                    record
                        .created_at
                        .to_rfc3339_opts(SecondsFormat::Micros, true),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(id)
    }

    async fn list_results(&self, user_id: &str) -> Result<Vec<StoredResult>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM results
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query(params![user_id])?;
            collect_rows(rows)
        })
        .await
    }

    async fn list_results_paginated(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<StoredResult>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM results
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query(params![user_id, i64::from(limit), i64::from(offset)])?;
            collect_rows(rows)
        })
        .await
    }

    async fn get_result(&self, id: &str) -> Result<Option<StoredResult>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM results WHERE id = ?1"))?;
            let result = stmt
                .query_row(params![id], |row| Ok(row_to_result(row)))
                .optional()?;
            result.transpose()
        })
        .await
    }
}
