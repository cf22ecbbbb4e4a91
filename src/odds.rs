//! C10 — odds-record derivation.
//!
//! From a transformed race, emit zero-or-more `(entrant, odds_type, odds,
//! event_timestamp)` rows from non-null fixed/pool odds fields (spec.md
//! §4.10). Pure, like the transform it consumes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::transform::TransformedRace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsType {
    FixedWin,
    FixedPlace,
    PoolWin,
    PoolPlace,
}

impl OddsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OddsType::FixedWin => "fixed_win",
            OddsType::FixedPlace => "fixed_place",
            OddsType::PoolWin => "pool_win",
            OddsType::PoolPlace => "pool_place",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OddsRecord {
    pub entrant_id: String,
    pub race_id: String,
    pub odds: f64,
    pub odds_type: OddsType,
    pub event_timestamp: DateTime<Utc>,
}

/// Derive odds records for every entrant in the race. One record per
/// non-null field among `{fixed_win, fixed_place, pool_win, pool_place}`
/// (spec.md §4.10, §8 "a record is emitted iff the corresponding entrant
/// field is non-null").
pub fn derive_odds_records(transformed: &TransformedRace) -> Vec<OddsRecord> {
    let event_timestamp = resolve_event_timestamp(transformed);

    transformed
        .entrants
        .iter()
        .flat_map(|entrant| {
            let race_id = transformed.race.race_id.clone();
            let entrant_id = entrant.entrant_id.clone();
            [
                (entrant.fixed_win_odds, OddsType::FixedWin),
                (entrant.fixed_place_odds, OddsType::FixedPlace),
                (entrant.pool_win_odds, OddsType::PoolWin),
                (entrant.pool_place_odds, OddsType::PoolPlace),
            ]
            .into_iter()
            .filter_map(move |(value, odds_type)| {
                value
                    .filter(|v| *v > 0.0)
                    .map(|odds| OddsRecord {
                        entrant_id: entrant_id.clone(),
                        race_id: race_id.clone(),
                        odds,
                        odds_type,
                        event_timestamp,
                    })
            })
        })
        .collect()
}

/// Resolve the timestamp shared by every odds record derived from one
/// race, per spec.md §4.10's three-step fallback.
fn resolve_event_timestamp(transformed: &TransformedRace) -> DateTime<Utc> {
    if let Some(ts) = transformed.race.start_time_utc() {
        return ts;
    }
    if let Some(first) = transformed.money_flow_records.first() {
        return first.polling_timestamp;
    }
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{EntrantRow, MoneyFlowRecord, RaceRow, RaceStatus, TransformMetrics, TransformedRace};

    fn base_race() -> RaceRow {
        RaceRow {
            race_id: "race-1".into(),
            meeting_id: "meeting-1".into(),
            name: "Race 1".into(),
            status: RaceStatus::Open,
            race_number: Some(1),
            race_date_nz: "2025-10-13".parse().ok(),
            start_time_nz: "14:30:00".parse().ok(),
        }
    }

    fn entrant(id: &str) -> EntrantRow {
        EntrantRow {
            entrant_id: id.into(),
            race_id: "race-1".into(),
            runner_number: Some(1),
            name: Some("Horse".into()),
            barrier: Some(3),
            is_scratched: false,
            is_late_scratched: false,
            fixed_win_odds: Some(2.5),
            fixed_place_odds: None,
            pool_win_odds: Some(3.1),
            pool_place_odds: None,
            hold_percentage: None,
            bet_percentage: None,
            win_percentage: None,
            place_percentage: None,
            win_pool_amount: None,
            place_pool_amount: None,
            jockey: None,
            trainer: None,
            silk_colours: None,
            favourite: None,
            mover: None,
        }
    }

    #[test]
    fn emits_one_record_per_non_null_field() {
        let transformed = TransformedRace {
            meeting: None,
            race: base_race(),
            entrants: vec![entrant("e1")],
            money_flow_records: vec![],
            metrics: TransformMetrics::default(),
            original_payload: serde_json::Value::Null,
        };

        let records = derive_odds_records(&transformed);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.odds > 0.0));
        let kinds: Vec<_> = records.iter().map(|r| r.odds_type).collect();
        assert!(kinds.contains(&OddsType::FixedWin));
        assert!(kinds.contains(&OddsType::PoolWin));
    }

    #[test]
    fn event_timestamp_falls_back_to_first_money_flow_point_when_no_schedule() {
        let mut race = base_race();
        race.race_date_nz = None;
        race.start_time_nz = None;

        let ts: DateTime<Utc> = "2025-10-13T11:50:00Z".parse().unwrap();
        let transformed = TransformedRace {
            meeting: None,
            race,
            entrants: vec![entrant("e1")],
            money_flow_records: vec![MoneyFlowRecord {
                entrant_id: "e1".into(),
                race_id: "race-1".into(),
                polling_timestamp: ts,
                time_to_start: Some(5.0),
                time_interval: 5.0,
                interval_type: "5m".into(),
                hold_percentage: None,
                bet_percentage: None,
                win_percentage: None,
                place_percentage: None,
                win_pool_amount: None,
                place_pool_amount: None,
                total_pool_amount: None,
                incremental_win_amount: 0,
                incremental_place_amount: 0,
                fixed_win_odds: None,
                fixed_place_odds: None,
                pool_win_odds: None,
                pool_place_odds: None,
                is_bucketed_aggregation: true,
            }],
            metrics: TransformMetrics::default(),
            original_payload: serde_json::Value::Null,
        };

        let records = derive_odds_records(&transformed);
        assert!(records.iter().all(|r| r.event_timestamp == ts));
    }
}
