//! C2 — race transformer.
//!
//! Pure, deterministic, I/O-free: `transform()` turns one raw race payload
//! into a closed, schema-typed `TransformedRace` bundle. This is the only
//! place in the codebase allowed to fish fields out of the raw upstream
//! shape (spec.md §9). Safe to run on a worker thread (C3).

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::upstream::types::{RawEntrant, RawMeeting, RawMoneyTrackerPoint, RawRaceData};

/// Racing calendar timezone used to resolve local race-day wall-clock times
/// to UTC instants (spec.md §3 "calendar date in racing timezone").
pub const RACING_TIMEZONE: chrono_tz::Tz = chrono_tz::Pacific::Auckland;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    Open,
    Closed,
    Interim,
    Final,
    Abandoned,
    Postponed,
}

impl RaceStatus {
    /// Case-normalize and clamp to the known enum; unknown values fall back
    /// to `Open` per spec.md §4.2, with a debug-level note of the original.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("open") => RaceStatus::Open,
            Some("closed") => RaceStatus::Closed,
            Some("interim") => RaceStatus::Interim,
            Some("final") => RaceStatus::Final,
            Some("abandoned") => RaceStatus::Abandoned,
            Some("postponed") => RaceStatus::Postponed,
            other => {
                tracing::debug!(original_status = ?other, "unknown race status, normalizing to open");
                RaceStatus::Open
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RaceStatus::Open => "open",
            RaceStatus::Closed => "closed",
            RaceStatus::Interim => "interim",
            RaceStatus::Final => "final",
            RaceStatus::Abandoned => "abandoned",
            RaceStatus::Postponed => "postponed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRow {
    pub meeting_id: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub track_condition: Option<String>,
    pub tote_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceRow {
    pub race_id: String,
    pub meeting_id: String,
    pub name: String,
    pub status: RaceStatus,
    pub race_number: Option<i32>,
    pub race_date_nz: Option<NaiveDate>,
    pub start_time_nz: Option<NaiveTime>,
}

impl RaceRow {
    /// Resolve the scheduled local start to a UTC instant, when both the
    /// calendar date and time-of-day are known (spec.md §4.10 step 1).
    pub fn start_time_utc(&self) -> Option<DateTime<Utc>> {
        let date = self.race_date_nz?;
        let time = self.start_time_nz?;
        let local = RACING_TIMEZONE
            .from_local_datetime(&date.and_time(time))
            .single()?;
        Some(local.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Serialize)]
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
}

#[derive(Debug, Clone, Serialize)]
pub struct MoneyFlowRecord {
    pub entrant_id: String,
    pub race_id: String,
    pub polling_timestamp: DateTime<Utc>,
    pub time_to_start: Option<f64>,
    pub time_interval: f64,
    pub interval_type: String,
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
    /// Always `true` for transformer output (spec.md §3 "Type marker").
    /// Legacy rows already resident in the store may carry `false`.
    pub is_bucketed_aggregation: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformMetrics {
    pub entrant_count: usize,
    pub populated_pool_field_count: usize,
    pub money_flow_record_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformedRace {
    pub meeting: Option<MeetingRow>,
    pub race: RaceRow,
    pub entrants: Vec<EntrantRow>,
    pub money_flow_records: Vec<MoneyFlowRecord>,
    pub metrics: TransformMetrics,
    pub original_payload: serde_json::Value,
}

/// Transform one raw race payload into a normalized, closed bundle. Pure
/// and infallible: malformed/missing fields degrade to `None`/defaults
/// rather than erroring, matching the raw types' own `#[serde(default)]`
/// posture. Parse/deserialize failures happen upstream of this call, in
/// `upstream::client`.
pub fn transform(raw: RawRaceData) -> TransformedRace {
    let original_payload = serde_json::to_value(&raw).unwrap_or(serde_json::Value::Null);

    let meeting = raw.meeting.as_ref().map(normalize_meeting);
    let meeting_id = raw
        .meeting_id
        .clone()
        .or_else(|| raw.meeting.as_ref().map(|m| m.meeting_id.clone()))
        .unwrap_or_default();

    let race = RaceRow {
        race_id: raw.race_id.clone(),
        meeting_id,
        name: raw.name.clone().unwrap_or_default(),
        status: RaceStatus::normalize(raw.status.as_deref()),
        race_number: raw.race_number,
        race_date_nz: raw.race_date_nz,
        start_time_nz: raw.start_time_nz,
    };

    let mut entrants = Vec::with_capacity(raw.entrants.len());
    let mut money_flow_records = Vec::new();
    let mut populated_pool_field_count = 0usize;

    for entrant in &raw.entrants {
        entrants.push(normalize_entrant(entrant, &raw.race_id, &mut populated_pool_field_count));
        money_flow_records.extend(derive_money_flow_records(entrant, &raw.race_id));
    }

    let metrics = TransformMetrics {
        entrant_count: entrants.len(),
        populated_pool_field_count,
        money_flow_record_count: money_flow_records.len(),
    };

    TransformedRace {
        meeting,
        race,
        entrants,
        money_flow_records,
        metrics,
        original_payload,
    }
}

pub(crate) fn normalize_meeting(raw: &RawMeeting) -> MeetingRow {
    MeetingRow {
        meeting_id: raw.meeting_id.clone(),
        name: raw.name.clone(),
        date: raw.date,
        country: raw.country.clone(),
        category: raw.category.clone(),
        track_condition: raw.track_condition.clone(),
        tote_status: raw.tote_status.clone(),
    }
}

fn normalize_entrant(raw: &RawEntrant, race_id: &str, populated_pool_field_count: &mut usize) -> EntrantRow {
    let latest = raw
        .money_tracker
        .iter()
        .max_by_key(|p| p.polling_time.unwrap_or(DateTime::<Utc>::MIN_UTC));

    for field in [
        raw.odds.fixed_win,
        raw.odds.fixed_place,
        raw.odds.pool_win,
        raw.odds.pool_place,
    ] {
        if field.is_some() {
            *populated_pool_field_count += 1;
        }
    }

    EntrantRow {
        entrant_id: raw.entrant_id.clone(),
        race_id: race_id.to_string(),
        runner_number: raw.runner_number,
        name: raw.name.clone(),
        barrier: raw.barrier,
        is_scratched: raw.is_scratched.unwrap_or(false),
        is_late_scratched: raw.is_late_scratched.unwrap_or(false),
        fixed_win_odds: raw.odds.fixed_win,
        fixed_place_odds: raw.odds.fixed_place,
        pool_win_odds: raw.odds.pool_win,
        pool_place_odds: raw.odds.pool_place,
        hold_percentage: latest.and_then(|p| p.hold_percentage),
        bet_percentage: latest.and_then(|p| p.bet_percentage),
        win_percentage: latest.and_then(|p| p.win_percentage),
        place_percentage: latest.and_then(|p| p.place_percentage),
        win_pool_amount: latest.and_then(|p| p.win_pool_amount),
        place_pool_amount: latest.and_then(|p| p.place_pool_amount),
        jockey: raw.jockey.clone(),
        trainer: raw.trainer.clone(),
        silk_colours: raw.silk_colours.clone(),
        favourite: raw.favourite,
        mover: raw.mover,
    }
}

/// One bucketed money-flow record per polling snapshot for this entrant,
/// ordered ascending by `polling_timestamp`, with incremental win/place
/// amounts computed as deltas when the upstream didn't pre-calculate them.
fn derive_money_flow_records(raw: &RawEntrant, race_id: &str) -> Vec<MoneyFlowRecord> {
    let mut points = raw.money_tracker.clone();
    points.sort_by_key(|p| p.polling_time.unwrap_or(DateTime::<Utc>::MIN_UTC));

    let mut records = Vec::with_capacity(points.len());
    let mut prev_win_amount = 0i64;
    let mut prev_place_amount = 0i64;

    for point in &points {
        let (time_interval, interval_type) = resolve_bucket(point);

        let current_win = point.win_pool_amount.unwrap_or(prev_win_amount);
        let current_place = point.place_pool_amount.unwrap_or(prev_place_amount);

        let incremental_win_amount = point
            .incremental_win_amount
            .unwrap_or(current_win - prev_win_amount);
        let incremental_place_amount = point
            .incremental_place_amount
            .unwrap_or(current_place - prev_place_amount);

        records.push(MoneyFlowRecord {
            entrant_id: raw.entrant_id.clone(),
            race_id: race_id.to_string(),
            polling_timestamp: point.polling_time.unwrap_or_else(Utc::now),
            time_to_start: point.time_to_start,
            time_interval,
            interval_type,
            hold_percentage: point.hold_percentage,
            bet_percentage: point.bet_percentage,
            win_percentage: point.win_percentage,
            place_percentage: point.place_percentage,
            win_pool_amount: point.win_pool_amount,
            place_pool_amount: point.place_pool_amount,
            total_pool_amount: point.total_pool_amount,
            incremental_win_amount,
            incremental_place_amount,
            fixed_win_odds: point.fixed_win_odds,
            fixed_place_odds: point.fixed_place_odds,
            pool_win_odds: point.pool_win_odds,
            pool_place_odds: point.pool_place_odds,
            is_bucketed_aggregation: true,
        });

        prev_win_amount = current_win;
        prev_place_amount = current_place;
    }

    records
}

/// Use the upstream's own `time_interval`/`interval_type` when present;
/// otherwise derive a bucket from `time_to_start` using the standard
/// 5-minute / 1-minute / 30-second bands (spec.md Glossary "Bucketed
/// aggregation"; band thresholds are this codebase's own choice, not a
/// ported constant).
fn resolve_bucket(point: &RawMoneyTrackerPoint) -> (f64, String) {
    if let (Some(interval), Some(interval_type)) = (point.time_interval, point.interval_type.clone()) {
        return (interval, interval_type);
    }

    let minutes = point.time_to_start.unwrap_or(0.0);
    if minutes > 10.0 {
        ((minutes / 5.0).round() * 5.0, "5m".to_string())
    } else if minutes > 2.0 {
        (minutes.round(), "1m".to_string())
    } else {
        ((minutes * 2.0).round() / 2.0, "30s".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::types::RawOdds;

    fn point(polling_time: &str, time_to_start: f64, win_pool: i64) -> RawMoneyTrackerPoint {
        RawMoneyTrackerPoint {
            polling_time: Some(polling_time.parse().unwrap()),
            time_to_start: Some(time_to_start),
            win_pool_amount: Some(win_pool),
            ..Default::default()
        }
    }

    #[test]
    fn unknown_status_normalizes_to_open() {
        assert_eq!(RaceStatus::normalize(Some("weird")), RaceStatus::Open);
        assert_eq!(RaceStatus::normalize(None), RaceStatus::Open);
    }

    #[test]
    fn known_status_is_case_normalized() {
        assert_eq!(RaceStatus::normalize(Some("FINAL")), RaceStatus::Final);
        assert_eq!(RaceStatus::normalize(Some(" Abandoned ")), RaceStatus::Abandoned);
    }

    #[test]
    fn runners_alias_populates_entrants() {
        let json = r#"{
            "race_id": "r1",
            "runners": [{"entrant_id": "e1"}]
        }"#;
        let raw: RawRaceData = serde_json::from_str(json).unwrap();
        assert_eq!(raw.entrants.len(), 1);
        assert_eq!(raw.entrants[0].entrant_id, "e1");
    }

    #[test]
    fn money_flow_records_compute_deltas_against_prior_bucket() {
        let entrant = RawEntrant {
            entrant_id: "e1".into(),
            odds: RawOdds::default(),
            money_tracker: vec![
                point("2025-10-13T11:00:00Z", 50.0, 1000),
                point("2025-10-13T11:30:00Z", 20.0, 1500),
            ],
            ..Default::default()
        };

        let records = derive_money_flow_records(&entrant, "race-1");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].incremental_win_amount, 1000);
        assert_eq!(records[1].incremental_win_amount, 500);
        assert!(records.iter().all(|r| r.is_bucketed_aggregation));
    }

    #[test]
    fn bucket_resolution_uses_upstream_values_when_present() {
        let mut p = point("2025-10-13T11:00:00Z", 50.0, 1000);
        p.time_interval = Some(45.0);
        p.interval_type = Some("5m".to_string());
        let (interval, kind) = resolve_bucket(&p);
        assert_eq!(interval, 45.0);
        assert_eq!(kind, "5m");
    }

    #[test]
    fn bucket_resolution_derives_from_time_to_start_when_absent() {
        let (interval, kind) = resolve_bucket(&point("2025-10-13T11:00:00Z", 1.2, 0));
        assert_eq!(kind, "30s");
        assert!((interval - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn entrants_metrics_count_populated_pool_fields() {
        let raw = RawRaceData {
            race_id: "r1".into(),
            entrants: vec![RawEntrant {
                entrant_id: "e1".into(),
                odds: RawOdds {
                    fixed_win: Some(2.5),
                    pool_win: Some(3.1),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        let transformed = transform(raw);
        assert_eq!(transformed.metrics.entrant_count, 1);
        assert_eq!(transformed.metrics.populated_pool_field_count, 2);
    }
}
