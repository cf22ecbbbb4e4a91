//! C9 — read-surface row and response shapes.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MeetingRow {
    pub meeting_id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub track_condition: Option<String>,
    pub tote_status: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RaceRow {
    pub race_id: String,
    pub meeting_id: String,
    pub name: String,
    pub status: String,
    pub race_number: Option<i32>,
    pub race_date_nz: Option<NaiveDate>,
    pub start_time_nz: Option<NaiveTime>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntrantRow {
    pub entrant_id: String,
    pub race_id: String,
    pub runner_number: Option<i32>,
    pub name: Option<String>,
    pub barrier: Option<i32>,
    pub is_scratched: bool,
    pub is_late_scratched: bool,
    pub fixed_win_odds: Option<f64>,
    pub fixed_place_odds: Option<f64>,
    pub pool_win_odds: Option<f64>,
    pub pool_place_odds: Option<f64>,
    pub hold_percentage: Option<f64>,
    pub bet_percentage: Option<f64>,
    pub win_percentage: Option<f64>,
    pub place_percentage: Option<f64>,
    pub win_pool_amount: Option<i64>,
    pub place_pool_amount: Option<i64>,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
    pub silk_colours: Option<String>,
    pub favourite: Option<bool>,
    pub mover: Option<bool>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationData {
    pub previous_race_id: Option<String>,
    pub next_race_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataFreshness {
    pub last_updated: Option<DateTime<Utc>>,
    pub entrants_data_age_seconds: Option<i64>,
    /// Deprecated: always zero (spec.md §4.9 — odds surfaced via money-flow now).
    pub odds_history_count: u64,
    pub money_flow_history_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingView {
    pub meeting_id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub track_condition: Option<String>,
    pub tote_status: Option<String>,
}

impl From<MeetingRow> for MeetingView {
    fn from(row: MeetingRow) -> Self {
        Self {
            meeting_id: row.meeting_id,
            name: row.name,
            date: row.date,
            country: row.country,
            category: row.category,
            track_condition: row.track_condition,
            tote_status: row.tote_status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceView {
    pub race_id: String,
    pub meeting_id: String,
    pub name: String,
    pub status: String,
    pub race_number: Option<i32>,
    pub race_date_nz: Option<NaiveDate>,
    pub start_time_nz: Option<NaiveTime>,
}

impl From<&RaceRow> for RaceView {
    fn from(row: &RaceRow) -> Self {
        Self {
            race_id: row.race_id.clone(),
            meeting_id: row.meeting_id.clone(),
            name: row.name.clone(),
            status: row.status.clone(),
            race_number: row.race_number,
            race_date_nz: row.race_date_nz,
            start_time_nz: row.start_time_nz,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceResponse {
    pub race: RaceView,
    pub meeting: Option<MeetingView>,
    pub entrants: Vec<EntrantRow>,
    pub navigation_data: NavigationData,
    pub data_freshness: DataFreshness,
}

#[derive(Debug, Clone, FromRow)]
pub struct MoneyFlowDocumentRow {
    pub id: i64,
    pub entrant_id: String,
    pub race_id: String,
    pub polling_timestamp: DateTime<Utc>,
    pub time_to_start: Option<f64>,
    pub time_interval: Option<f64>,
    pub interval_type: Option<String>,
    pub hold_percentage: Option<f64>,
    pub bet_percentage: Option<f64>,
    pub win_percentage: Option<f64>,
    pub place_percentage: Option<f64>,
    pub win_pool_amount: Option<i64>,
    pub place_pool_amount: Option<i64>,
    pub total_pool_amount: Option<i64>,
    pub incremental_win_amount: i64,
    pub incremental_place_amount: i64,
    pub fixed_win_odds: Option<f64>,
    pub fixed_place_odds: Option<f64>,
    pub pool_win_odds: Option<f64>,
    pub pool_place_odds: Option<f64>,
    pub is_bucketed_aggregation: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoneyFlowDocument {
    pub id: i64,
    pub entrant_id: String,
    pub race_id: String,
    pub polling_timestamp: DateTime<Utc>,
    pub time_to_start: Option<f64>,
    pub time_interval: Option<f64>,
    pub interval_type: Option<String>,
    pub hold_percentage: Option<f64>,
    pub bet_percentage: Option<f64>,
    pub win_percentage: Option<f64>,
    pub place_percentage: Option<f64>,
    pub win_pool_amount: Option<i64>,
    pub place_pool_amount: Option<i64>,
    pub total_pool_amount: Option<i64>,
    pub incremental_win_amount: i64,
    pub incremental_place_amount: i64,
    pub fixed_win_odds: Option<f64>,
    pub fixed_place_odds: Option<f64>,
    pub pool_win_odds: Option<f64>,
    pub pool_place_odds: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<MoneyFlowDocumentRow> for MoneyFlowDocument {
    fn from(row: MoneyFlowDocumentRow) -> Self {
        Self {
            id: row.id,
            entrant_id: row.entrant_id,
            race_id: row.race_id,
            polling_timestamp: row.polling_timestamp,
            time_to_start: row.time_to_start,
            time_interval: row.time_interval,
            interval_type: row.interval_type,
            hold_percentage: row.hold_percentage,
            bet_percentage: row.bet_percentage,
            win_percentage: row.win_percentage,
            place_percentage: row.place_percentage,
            win_pool_amount: row.win_pool_amount,
            place_pool_amount: row.place_pool_amount,
            total_pool_amount: row.total_pool_amount,
            incremental_win_amount: row.incremental_win_amount,
            incremental_place_amount: row.incremental_place_amount,
            fixed_win_odds: row.fixed_win_odds,
            fixed_place_odds: row.fixed_place_odds,
            pool_win_odds: row.pool_win_odds,
            pool_place_odds: row.pool_place_odds,
            created_at: row.created_at,
        }
    }
}

/// Per-entrant missing-interval diagnostics within the `[0,5]` critical
/// sub-window (spec.md §4.9 "interval-coverage diagnostics").
#[derive(Debug, Clone, Serialize)]
pub struct EntrantIntervalCoverage {
    pub entrant_id: String,
    pub missing_intervals: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoneyFlowTimelineResponse {
    pub success: bool,
    pub documents: Vec<MoneyFlowDocument>,
    pub total: usize,
    pub race_id: String,
    pub entrant_ids: Vec<String>,
    pub pool_type: String,
    pub bucketed_data: bool,
    pub next_cursor: Option<i64>,
    pub next_created_at: Option<DateTime<Utc>>,
    pub limit: i64,
    pub created_after: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_coverage: Option<Vec<EntrantIntervalCoverage>>,
    pub query_optimizations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
    pub context: serde_json::Value,
}
