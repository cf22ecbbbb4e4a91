//! Daily partition naming, existence checks and creation for the two
//! time-series tables (spec.md §3 "Partition", §4.8, §4.5).
//!
//! Each partition is a declarative-Postgres range partition bound to
//! `[day 00:00 UTC, next_day 00:00 UTC)`, named `<table>_YYYY_MM_DD`. This
//! is the standard Postgres partitioning idiom; there's no teacher
//! precedent for it (the teacher has no time-series partitioning), so it's
//! grounded directly in spec.md §3/§4.8 rather than a pack example.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

pub const MONEY_FLOW_HISTORY_TABLE: &str = "money_flow_history";
pub const ODDS_HISTORY_TABLE: &str = "odds_history";

/// All time-series tables the scheduler must keep partitioned.
pub const TIME_SERIES_TABLES: [&str; 2] = [MONEY_FLOW_HISTORY_TABLE, ODDS_HISTORY_TABLE];

pub fn partition_name(table: &str, date: NaiveDate) -> String {
    format!("{table}_{}", date.format("%Y_%m_%d"))
}

/// Which daily partition a timestamp belongs to.
pub fn partition_date_for(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}

pub async fn partition_exists(pool: &PgPool, table: &str, date: NaiveDate) -> Result<bool, sqlx::Error> {
    let name = partition_name(table, date);
    let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
        .bind(&name)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Create the partition for `table`/`date` if it doesn't already exist.
/// Returns `true` when a new partition was created, `false` when it was
/// already present (idempotent, per spec.md §4.8).
pub async fn create_partition_if_missing(
    pool: &PgPool,
    table: &str,
    date: NaiveDate,
) -> Result<(bool, String), sqlx::Error> {
    let name = partition_name(table, date);

    if partition_exists(pool, table, date).await? {
        return Ok((false, name));
    }

    let next_day = date.succ_opt().expect("date arithmetic does not overflow in practice");
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF {table} \
         FOR VALUES FROM ('{date} 00:00:00+00') TO ('{next_day} 00:00:00+00')"
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok((true, name))
}

/// Create tomorrow's partition (relative to `today`) for every time-series
/// table, returning the names of the ones actually created.
pub async fn create_tomorrow_partitions(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<Vec<String>, sqlx::Error> {
    let tomorrow = today.succ_opt().expect("date arithmetic does not overflow in practice");
    let mut created = Vec::new();

    for table in TIME_SERIES_TABLES {
        let (was_created, name) = create_partition_if_missing(pool, table, tomorrow).await?;
        if was_created {
            created.push(name);
        }
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_name_follows_table_yyyy_mm_dd() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 13).unwrap();
        assert_eq!(partition_name(MONEY_FLOW_HISTORY_TABLE, date), "money_flow_history_2025_10_13");
        assert_eq!(partition_name(ODDS_HISTORY_TABLE, date), "odds_history_2025_10_13");
    }

    #[test]
    fn partition_date_uses_utc_calendar_day() {
        let ts: DateTime<Utc> = "2025-10-13T23:59:59Z".parse().unwrap();
        assert_eq!(partition_date_for(ts), NaiveDate::from_ymd_opt(2025, 10, 13).unwrap());
    }
}
