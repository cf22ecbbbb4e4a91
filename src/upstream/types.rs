//! Raw upstream payload shapes, as returned by the racing affiliate API.
//!
//! These mirror the teacher's `OddsApiEvent`/`Bookmaker`/`Market`/`Outcome`
//! structs: every field is `Option`/defaulted so a partial or evolving
//! upstream shape never fails deserialization. Raw field-fishing against
//! these types is only allowed inside `crate::transform` (spec.md §4.2,
//! §9 "Dynamic/loosely-typed payloads... pinned at the transformer
//! boundary").

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct MeetingsResponse {
    pub meetings: Vec<RawMeeting>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawMeeting {
    pub meeting_id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub track_condition: Option<String>,
    pub tote_status: Option<String>,
    pub races: Vec<RawRaceSummary>,
}

/// A race as listed under a meeting (no entrants, no money-flow detail;
/// just enough to enumerate per-race fetch work for C7).
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawRaceSummary {
    pub race_id: String,
    pub race_number: Option<i32>,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Full single-race payload, as returned by the race-by-id endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawRaceData {
    pub race_id: String,
    pub meeting_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub race_number: Option<i32>,
    pub race_date_nz: Option<NaiveDate>,
    pub start_time_nz: Option<NaiveTime>,
    pub meeting: Option<RawMeeting>,
    #[serde(alias = "runners")]
    pub entrants: Vec<RawEntrant>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawEntrant {
    pub entrant_id: String,
    pub runner_number: Option<i32>,
    pub name: Option<String>,
    pub barrier: Option<i32>,
    pub is_scratched: Option<bool>,
    pub is_late_scratched: Option<bool>,
    pub jockey: Option<String>,
    pub trainer: Option<String>,
    pub silk_colours: Option<String>,
    pub favourite: Option<bool>,
    pub mover: Option<bool>,
    pub odds: RawOdds,
    /// One entry per polling snapshot the upstream has recorded for this
    /// entrant. Ordered ascending by `polling_time` when the upstream
    /// provides ordering; the transformer re-sorts defensively.
    pub money_tracker: Vec<RawMoneyTrackerPoint>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawOdds {
    pub fixed_win: Option<f64>,
    pub fixed_place: Option<f64>,
    pub pool_win: Option<f64>,
    pub pool_place: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct RawMoneyTrackerPoint {
    pub polling_time: Option<chrono::DateTime<chrono::Utc>>,
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
    /// Pre-calculated incremental amounts, present when the upstream
    /// already computed them (`bucketed_aggregation` documents).
    pub incremental_win_amount: Option<i64>,
    pub incremental_place_amount: Option<i64>,
    pub fixed_win_odds: Option<f64>,
    pub fixed_place_odds: Option<f64>,
    pub pool_win_odds: Option<f64>,
    pub pool_place_odds: Option<f64>,
}
