//! C5 — time-series insert layer.
//!
//! Pure append, no conflict resolution. Verifies the destination partition
//! exists before inserting; a missing partition fails the whole call with
//! `PartitionNotFoundError` rather than partially inserting (spec.md §4.5,
//! §8 "no row is written").

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::db::partitions::{self, MONEY_FLOW_HISTORY_TABLE, ODDS_HISTORY_TABLE};
use crate::db::WriteResult;
use crate::error::WriteLayerError;
use crate::odds::OddsRecord;
use crate::transform::MoneyFlowRecord;

pub async fn insert_money_flow_history(
    pool: &PgPool,
    records: &[MoneyFlowRecord],
) -> Result<WriteResult, WriteLayerError> {
    if records.is_empty() {
        return Ok(WriteResult { row_count: 0, duration_ms: 0 });
    }
    let start = Instant::now();

    ensure_partitions_exist(pool, MONEY_FLOW_HISTORY_TABLE, records.iter().map(|r| r.polling_timestamp)).await?;

    let entrant_ids: Vec<&str> = records.iter().map(|r| r.entrant_id.as_str()).collect();
    let race_ids: Vec<&str> = records.iter().map(|r| r.race_id.as_str()).collect();
    let polling_timestamps: Vec<_> = records.iter().map(|r| r.polling_timestamp).collect();
    let time_to_starts: Vec<Option<f64>> = records.iter().map(|r| r.time_to_start).collect();
    let time_intervals: Vec<f64> = records.iter().map(|r| r.time_interval).collect();
    let interval_types: Vec<&str> = records.iter().map(|r| r.interval_type.as_str()).collect();
    let hold_pct: Vec<Option<f64>> = records.iter().map(|r| r.hold_percentage).collect();
    let bet_pct: Vec<Option<f64>> = records.iter().map(|r| r.bet_percentage).collect();
    let win_pct: Vec<Option<f64>> = records.iter().map(|r| r.win_percentage).collect();
    let place_pct: Vec<Option<f64>> = records.iter().map(|r| r.place_percentage).collect();
    let win_pool_amount: Vec<Option<i64>> = records.iter().map(|r| r.win_pool_amount).collect();
    let place_pool_amount: Vec<Option<i64>> = records.iter().map(|r| r.place_pool_amount).collect();
    let total_pool_amount: Vec<Option<i64>> = records.iter().map(|r| r.total_pool_amount).collect();
    let incremental_win: Vec<i64> = records.iter().map(|r| r.incremental_win_amount).collect();
    let incremental_place: Vec<i64> = records.iter().map(|r| r.incremental_place_amount).collect();
    let fixed_win_odds: Vec<Option<f64>> = records.iter().map(|r| r.fixed_win_odds).collect();
    let fixed_place_odds: Vec<Option<f64>> = records.iter().map(|r| r.fixed_place_odds).collect();
    let pool_win_odds: Vec<Option<f64>> = records.iter().map(|r| r.pool_win_odds).collect();
    let pool_place_odds: Vec<Option<f64>> = records.iter().map(|r| r.pool_place_odds).collect();
    let is_bucketed: Vec<bool> = records.iter().map(|r| r.is_bucketed_aggregation).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO money_flow_history (
            entrant_id, race_id, polling_timestamp, time_to_start, time_interval, interval_type,
            hold_percentage, bet_percentage, win_percentage, place_percentage,
            win_pool_amount, place_pool_amount, total_pool_amount,
            incremental_win_amount, incremental_place_amount,
            fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds,
            is_bucketed_aggregation, created_at
        )
        SELECT *, now() FROM UNNEST(
            $1::text[], $2::text[], $3::timestamptz[], $4::float8[], $5::float8[], $6::text[],
            $7::float8[], $8::float8[], $9::float8[], $10::float8[],
            $11::bigint[], $12::bigint[], $13::bigint[],
            $14::bigint[], $15::bigint[],
            $16::float8[], $17::float8[], $18::float8[], $19::float8[], $20::bool[]
        )
        "#,
    )
    .bind(&entrant_ids)
    .bind(&race_ids)
    .bind(&polling_timestamps)
    .bind(&time_to_starts)
    .bind(&time_intervals)
    .bind(&interval_types)
    .bind(&hold_pct)
    .bind(&bet_pct)
    .bind(&win_pct)
    .bind(&place_pct)
    .bind(&win_pool_amount)
    .bind(&place_pool_amount)
    .bind(&total_pool_amount)
    .bind(&incremental_win)
    .bind(&incremental_place)
    .bind(&fixed_win_odds)
    .bind(&fixed_place_odds)
    .bind(&pool_win_odds)
    .bind(&pool_place_odds)
    .bind(&is_bucketed)
    .execute(pool)
    .await
    .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;

    Ok(WriteResult {
        row_count: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

pub async fn insert_odds_history(pool: &PgPool, records: &[OddsRecord]) -> Result<WriteResult, WriteLayerError> {
    if records.is_empty() {
        return Ok(WriteResult { row_count: 0, duration_ms: 0 });
    }
    let start = Instant::now();

    ensure_partitions_exist(pool, ODDS_HISTORY_TABLE, records.iter().map(|r| r.event_timestamp)).await?;

    let entrant_ids: Vec<&str> = records.iter().map(|r| r.entrant_id.as_str()).collect();
    let race_ids: Vec<&str> = records.iter().map(|r| r.race_id.as_str()).collect();
    let odds: Vec<f64> = records.iter().map(|r| r.odds).collect();
    let odds_types: Vec<&str> = records.iter().map(|r| r.odds_type.as_str()).collect();
    let event_timestamps: Vec<_> = records.iter().map(|r| r.event_timestamp).collect();

    let result = sqlx::query(
        r#"
        INSERT INTO odds_history (entrant_id, race_id, odds, odds_type, event_timestamp, created_at)
        SELECT *, now() FROM UNNEST($1::text[], $2::text[], $3::float8[], $4::text[], $5::timestamptz[])
        "#,
    )
    .bind(&entrant_ids)
    .bind(&race_ids)
    .bind(&odds)
    .bind(&odds_types)
    .bind(&event_timestamps)
    .execute(pool)
    .await
    .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;

    Ok(WriteResult {
        row_count: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Verify every distinct partition date among `timestamps` already exists;
/// fails fast on the first missing one rather than inserting anything. The
/// error reports the actual record timestamp that required the missing
/// partition, not a synthesized midnight (spec.md §8 scenario 4).
async fn ensure_partitions_exist(
    pool: &PgPool,
    table: &str,
    timestamps: impl Iterator<Item = chrono::DateTime<chrono::Utc>>,
) -> Result<(), WriteLayerError> {
    let mut by_date: BTreeMap<NaiveDate, chrono::DateTime<chrono::Utc>> = BTreeMap::new();
    for ts in timestamps {
        by_date.entry(partitions::partition_date_for(ts)).or_insert(ts);
    }

    for (date, timestamp) in by_date {
        let exists = partitions::partition_exists(pool, table, date)
            .await
            .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;
        if !exists {
            let partition_name = partitions::partition_name(table, date);
            return Err(WriteLayerError::PartitionNotFound {
                table: table.to_string(),
                partition_name,
                timestamp,
            });
        }
    }

    Ok(())
}
