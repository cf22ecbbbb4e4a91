//! C4 — bulk upsert layer.
//!
//! One transaction per call, one multi-row `INSERT ... ON CONFLICT DO
//! UPDATE` built from `UNNEST` arrays (the bulk-upsert idiom used
//! elsewhere in this pack, e.g. the weather-bingo forecast queries).
//! Modeled structurally on the teacher's `store_snapshots` (single
//! transaction, per-row conflict target, row-count + duration metrics).

use std::time::Instant;

use sqlx::PgPool;

use crate::db::WriteResult;
use crate::error::WriteLayerError;
use crate::transform::{EntrantRow, MeetingRow, RaceRow};

/// Conflict target: `meeting_id`. Updates all non-key columns plus
/// `updated_at = now()` (spec.md §4.4 "Conflict resolution policy").
pub async fn bulk_upsert_meetings(pool: &PgPool, rows: &[MeetingRow]) -> Result<WriteResult, WriteLayerError> {
    if rows.is_empty() {
        return Ok(WriteResult { row_count: 0, duration_ms: 0 });
    }
    let start = Instant::now();

    let meeting_ids: Vec<&str> = rows.iter().map(|r| r.meeting_id.as_str()).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let dates: Vec<Option<chrono::NaiveDate>> = rows.iter().map(|r| r.date).collect();
    let countries: Vec<Option<&str>> = rows.iter().map(|r| r.country.as_deref()).collect();
    let categories: Vec<Option<&str>> = rows.iter().map(|r| r.category.as_deref()).collect();
    let track_conditions: Vec<Option<&str>> = rows.iter().map(|r| r.track_condition.as_deref()).collect();
    let tote_statuses: Vec<Option<&str>> = rows.iter().map(|r| r.tote_status.as_deref()).collect();

    let mut tx = pool.begin().await.map_err(tx_err)?;

    let result = sqlx::query(
        r#"
        INSERT INTO meetings (meeting_id, name, date, country, category, track_condition, tote_status, created_at, updated_at)
        SELECT * , now(), now() FROM UNNEST($1::text[], $2::text[], $3::date[], $4::text[], $5::text[], $6::text[], $7::text[])
        ON CONFLICT (meeting_id) DO UPDATE SET
            name = EXCLUDED.name,
            date = EXCLUDED.date,
            country = EXCLUDED.country,
            category = EXCLUDED.category,
            track_condition = EXCLUDED.track_condition,
            tote_status = EXCLUDED.tote_status,
            updated_at = now()
        "#,
    )
    .bind(&meeting_ids)
    .bind(&names)
    .bind(&dates)
    .bind(&countries)
    .bind(&categories)
    .bind(&track_conditions)
    .bind(&tote_statuses)
    .execute(&mut *tx)
    .await
    .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;

    tx.commit().await.map_err(tx_err)?;

    Ok(WriteResult {
        row_count: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Conflict target: `race_id`.
pub async fn bulk_upsert_races(pool: &PgPool, rows: &[RaceRow]) -> Result<WriteResult, WriteLayerError> {
    if rows.is_empty() {
        return Ok(WriteResult { row_count: 0, duration_ms: 0 });
    }
    let start = Instant::now();

    let race_ids: Vec<&str> = rows.iter().map(|r| r.race_id.as_str()).collect();
    let meeting_ids: Vec<&str> = rows.iter().map(|r| r.meeting_id.as_str()).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    let statuses: Vec<&str> = rows.iter().map(|r| r.status.as_str()).collect();
    let race_numbers: Vec<Option<i32>> = rows.iter().map(|r| r.race_number).collect();
    let race_dates: Vec<Option<chrono::NaiveDate>> = rows.iter().map(|r| r.race_date_nz).collect();
    let start_times: Vec<Option<chrono::NaiveTime>> = rows.iter().map(|r| r.start_time_nz).collect();

    let mut tx = pool.begin().await.map_err(tx_err)?;

    let result = sqlx::query(
        r#"
        INSERT INTO races (race_id, meeting_id, name, status, race_number, race_date_nz, start_time_nz, created_at, updated_at)
        SELECT * , now(), now() FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::int[], $6::date[], $7::time[])
        ON CONFLICT (race_id) DO UPDATE SET
            meeting_id = EXCLUDED.meeting_id,
            name = EXCLUDED.name,
            status = EXCLUDED.status,
            race_number = EXCLUDED.race_number,
            race_date_nz = EXCLUDED.race_date_nz,
            start_time_nz = EXCLUDED.start_time_nz,
            updated_at = now()
        "#,
    )
    .bind(&race_ids)
    .bind(&meeting_ids)
    .bind(&names)
    .bind(&statuses)
    .bind(&race_numbers)
    .bind(&race_dates)
    .bind(&start_times)
    .execute(&mut *tx)
    .await
    .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;

    tx.commit().await.map_err(tx_err)?;

    Ok(WriteResult {
        row_count: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Conflict target: `entrant_id`. Overwritten in full on every ingest of
/// the owning race (spec.md §3 "Entrant" lifecycle).
pub async fn bulk_upsert_entrants(pool: &PgPool, rows: &[EntrantRow]) -> Result<WriteResult, WriteLayerError> {
    if rows.is_empty() {
        return Ok(WriteResult { row_count: 0, duration_ms: 0 });
    }
    let start = Instant::now();

    let entrant_ids: Vec<&str> = rows.iter().map(|r| r.entrant_id.as_str()).collect();
    let race_ids: Vec<&str> = rows.iter().map(|r| r.race_id.as_str()).collect();
    let runner_numbers: Vec<Option<i32>> = rows.iter().map(|r| r.runner_number).collect();
    let names: Vec<Option<&str>> = rows.iter().map(|r| r.name.as_deref()).collect();
    let barriers: Vec<Option<i32>> = rows.iter().map(|r| r.barrier).collect();
    let scratched: Vec<bool> = rows.iter().map(|r| r.is_scratched).collect();
    let late_scratched: Vec<bool> = rows.iter().map(|r| r.is_late_scratched).collect();
    let fixed_win: Vec<Option<f64>> = rows.iter().map(|r| r.fixed_win_odds).collect();
    let fixed_place: Vec<Option<f64>> = rows.iter().map(|r| r.fixed_place_odds).collect();
    let pool_win: Vec<Option<f64>> = rows.iter().map(|r| r.pool_win_odds).collect();
    let pool_place: Vec<Option<f64>> = rows.iter().map(|r| r.pool_place_odds).collect();
    let hold_pct: Vec<Option<f64>> = rows.iter().map(|r| r.hold_percentage).collect();
    let bet_pct: Vec<Option<f64>> = rows.iter().map(|r| r.bet_percentage).collect();
    let win_pct: Vec<Option<f64>> = rows.iter().map(|r| r.win_percentage).collect();
    let place_pct: Vec<Option<f64>> = rows.iter().map(|r| r.place_percentage).collect();
    let win_pool_amount: Vec<Option<i64>> = rows.iter().map(|r| r.win_pool_amount).collect();
    let place_pool_amount: Vec<Option<i64>> = rows.iter().map(|r| r.place_pool_amount).collect();
    let jockeys: Vec<Option<&str>> = rows.iter().map(|r| r.jockey.as_deref()).collect();
    let trainers: Vec<Option<&str>> = rows.iter().map(|r| r.trainer.as_deref()).collect();
    let silks: Vec<Option<&str>> = rows.iter().map(|r| r.silk_colours.as_deref()).collect();
    let favourites: Vec<Option<bool>> = rows.iter().map(|r| r.favourite).collect();
    let movers: Vec<Option<bool>> = rows.iter().map(|r| r.mover).collect();

    let mut tx = pool.begin().await.map_err(tx_err)?;

    let result = sqlx::query(
        r#"
        INSERT INTO entrants (
            entrant_id, race_id, runner_number, name, barrier, is_scratched, is_late_scratched,
            fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds,
            hold_percentage, bet_percentage, win_percentage, place_percentage,
            win_pool_amount, place_pool_amount, jockey, trainer, silk_colours, favourite, mover,
            created_at, updated_at
        )
        SELECT *, now(), now() FROM UNNEST(
            $1::text[], $2::text[], $3::int[], $4::text[], $5::int[], $6::bool[], $7::bool[],
            $8::float8[], $9::float8[], $10::float8[], $11::float8[],
            $12::float8[], $13::float8[], $14::float8[], $15::float8[],
            $16::bigint[], $17::bigint[], $18::text[], $19::text[], $20::text[], $21::bool[], $22::bool[]
        )
        ON CONFLICT (entrant_id) DO UPDATE SET
            race_id = EXCLUDED.race_id,
            runner_number = EXCLUDED.runner_number,
            name = EXCLUDED.name,
            barrier = EXCLUDED.barrier,
            is_scratched = EXCLUDED.is_scratched,
            is_late_scratched = EXCLUDED.is_late_scratched,
            fixed_win_odds = EXCLUDED.fixed_win_odds,
            fixed_place_odds = EXCLUDED.fixed_place_odds,
            pool_win_odds = EXCLUDED.pool_win_odds,
            pool_place_odds = EXCLUDED.pool_place_odds,
            hold_percentage = EXCLUDED.hold_percentage,
            bet_percentage = EXCLUDED.bet_percentage,
            win_percentage = EXCLUDED.win_percentage,
            place_percentage = EXCLUDED.place_percentage,
            win_pool_amount = EXCLUDED.win_pool_amount,
            place_pool_amount = EXCLUDED.place_pool_amount,
            jockey = EXCLUDED.jockey,
            trainer = EXCLUDED.trainer,
            silk_colours = EXCLUDED.silk_colours,
            favourite = EXCLUDED.favourite,
            mover = EXCLUDED.mover,
            updated_at = now()
        "#,
    )
    .bind(&entrant_ids)
    .bind(&race_ids)
    .bind(&runner_numbers)
    .bind(&names)
    .bind(&barriers)
    .bind(&scratched)
    .bind(&late_scratched)
    .bind(&fixed_win)
    .bind(&fixed_place)
    .bind(&pool_win)
    .bind(&pool_place)
    .bind(&hold_pct)
    .bind(&bet_pct)
    .bind(&win_pct)
    .bind(&place_pct)
    .bind(&win_pool_amount)
    .bind(&place_pool_amount)
    .bind(&jockeys)
    .bind(&trainers)
    .bind(&silks)
    .bind(&favourites)
    .bind(&movers)
    .execute(&mut *tx)
    .await
    .map_err(|e| WriteLayerError::from_sqlx(&e, None))?;

    tx.commit().await.map_err(tx_err)?;

    Ok(WriteResult {
        row_count: result.rows_affected(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// `BEGIN`/`COMMIT` failures are always non-retryable at this layer
/// (spec.md §4.4): the processor above may still choose to retry the
/// whole race.
fn tx_err(err: sqlx::Error) -> WriteLayerError {
    WriteLayerError::Transaction { message: err.to_string() }
}
