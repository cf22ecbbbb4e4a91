//! C9 — HTTP read-surface handlers.

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::ReadSurfaceError;
use crate::read_surface::models::{
    DataFreshness, EntrantIntervalCoverage, EntrantRow, ErrorBody, MeetingRow, MeetingView, MoneyFlowDocument,
    MoneyFlowDocumentRow, MoneyFlowTimelineResponse, NavigationData, RaceResponse, RaceRow, RaceView,
};
use crate::read_surface::AppState;

/// The timeline's fixed pre/post-race window (spec.md §9 Open Question:
/// left hard-coded, not made configurable, to preserve observed behavior).
const INTERVAL_LOWER_BOUND: f64 = -65.0;
const INTERVAL_UPPER_BOUND: f64 = 66.0;

/// Critical intervals tracked for coverage diagnostics, and the `[0,5]`
/// sub-window reported per entrant (spec.md §4.9).
const CRITICAL_INTERVALS: [i64; 17] = [60, 55, 50, 45, 40, 35, 30, 25, 20, 15, 10, 5, 4, 3, 2, 1, 0];
const COVERAGE_SUB_WINDOW: [i64; 6] = [5, 4, 3, 2, 1, 0];

pub async fn get_race(
    State(state): State<AppState>,
    Path(race_id): Path<String>,
) -> Result<Json<RaceResponse>, (StatusCode, Json<ErrorBody>)> {
    if race_id.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, ReadSurfaceError::MalformedId, &race_id));
    }

    let race = sqlx::query_as::<_, RaceRow>(
        "SELECT race_id, meeting_id, name, status, race_number, race_date_nz, start_time_nz, updated_at \
         FROM races WHERE race_id = $1",
    )
    .bind(&race_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let Some(race) = race else {
        return Err(error_response(StatusCode::NOT_FOUND, ReadSurfaceError::NotFound, &race_id));
    };

    let meeting = sqlx::query_as::<_, MeetingRow>(
        "SELECT meeting_id, name, date, country, category, track_condition, tote_status, updated_at \
         FROM meetings WHERE meeting_id = $1",
    )
    .bind(&race.meeting_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let entrants = sqlx::query_as::<_, EntrantRow>(
        "SELECT entrant_id, race_id, runner_number, name, barrier, is_scratched, is_late_scratched, \
                fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds, \
                hold_percentage, bet_percentage, win_percentage, place_percentage, \
                win_pool_amount, place_pool_amount, jockey, trainer, silk_colours, favourite, mover, updated_at \
         FROM entrants WHERE race_id = $1 ORDER BY runner_number NULLS LAST",
    )
    .bind(&race_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let navigation_data = fetch_navigation(&state, &race)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let money_flow_history_count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM money_flow_history WHERE race_id = $1")
            .bind(&race_id)
            .fetch_one(&state.db)
            .await
            .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let last_updated = [race.updated_at]
        .into_iter()
        .chain(entrants.iter().map(|e| e.updated_at))
        .max();

    let data_freshness = DataFreshness {
        last_updated,
        entrants_data_age_seconds: last_updated.map(|ts| (Utc::now() - ts).num_seconds()),
        odds_history_count: 0,
        money_flow_history_count,
    };

    Ok(Json(RaceResponse {
        race: RaceView::from(&race),
        meeting: meeting.map(MeetingView::from),
        entrants,
        navigation_data,
        data_freshness,
    }))
}

async fn fetch_navigation(state: &AppState, race: &RaceRow) -> Result<NavigationData, sqlx::Error> {
    let previous_race_id: Option<String> = sqlx::query_scalar(
        "SELECT race_id FROM races WHERE meeting_id = $1 AND race_number < $2 \
         ORDER BY race_number DESC LIMIT 1",
    )
    .bind(&race.meeting_id)
    .bind(race.race_number.unwrap_or(0))
    .fetch_optional(&state.db)
    .await?;

    let next_race_id: Option<String> = sqlx::query_scalar(
        "SELECT race_id FROM races WHERE meeting_id = $1 AND race_number > $2 \
         ORDER BY race_number ASC LIMIT 1",
    )
    .bind(&race.meeting_id)
    .bind(race.race_number.unwrap_or(0))
    .fetch_optional(&state.db)
    .await?;

    Ok(NavigationData { previous_race_id, next_race_id })
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub entrants: String,
    #[serde(rename = "poolType")]
    pub pool_type: Option<String>,
    #[serde(rename = "cursorAfter")]
    pub cursor_after: Option<i64>,
    #[serde(rename = "createdAfter")]
    pub created_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

pub async fn get_money_flow_timeline(
    State(state): State<AppState>,
    Path(race_id): Path<String>,
    Query(params): Query<TimelineQuery>,
) -> Result<Json<MoneyFlowTimelineResponse>, (StatusCode, Json<ErrorBody>)> {
    let entrant_ids: Vec<String> = params
        .entrants
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if entrant_ids.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, ReadSurfaceError::MalformedId, &race_id));
    }

    let pool_type = params.pool_type.unwrap_or_else(|| "win".to_string());
    if !matches!(pool_type.as_str(), "win" | "place" | "odds") {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            ReadSurfaceError::InvalidPoolType(pool_type.clone()),
            &race_id,
        ));
    }

    let limit = params.limit.unwrap_or(200).clamp(1, 2000);

    let bucketed_rows = query_bucketed(&state, &race_id, &entrant_ids, params.cursor_after, params.created_after, limit)
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;

    let (rows, bucketed_data, mut query_optimizations) = if !bucketed_rows.is_empty() {
        (bucketed_rows, true, vec!["bucketed_query".to_string()])
    } else {
        let legacy_rows = query_legacy(&state, &race_id, &entrant_ids, params.cursor_after, params.created_after, limit)
            .await
            .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, ReadSurfaceError::classify(&e), &race_id))?;
        (legacy_rows, false, vec!["legacy_fallback".to_string()])
    };

    if rows.is_empty() {
        query_optimizations.push("no_data".to_string());
    }

    let next_cursor = rows.last().map(|r| r.id);
    let next_created_at = rows.last().map(|r| r.created_at);

    let interval_coverage = Some(compute_interval_coverage(&entrant_ids, &rows));

    let mut documents: Vec<MoneyFlowDocument> = rows.into_iter().map(MoneyFlowDocument::from).collect();
    sort_documents(&mut documents);

    Ok(Json(MoneyFlowTimelineResponse {
        success: true,
        total: documents.len(),
        documents,
        race_id,
        entrant_ids,
        pool_type,
        bucketed_data,
        next_cursor,
        next_created_at,
        limit,
        created_after: params.created_after,
        interval_coverage,
        query_optimizations,
    }))
}

async fn query_bucketed(
    state: &AppState,
    race_id: &str,
    entrant_ids: &[String],
    cursor_after: Option<i64>,
    created_after: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<MoneyFlowDocumentRow>, sqlx::Error> {
    sqlx::query_as::<_, MoneyFlowDocumentRow>(
        "SELECT id, entrant_id, race_id, polling_timestamp, time_to_start, time_interval, interval_type, \
                hold_percentage, bet_percentage, win_percentage, place_percentage, \
                win_pool_amount, place_pool_amount, total_pool_amount, \
                incremental_win_amount, incremental_place_amount, \
                fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds, \
                is_bucketed_aggregation, created_at \
         FROM money_flow_history \
         WHERE race_id = $1 AND entrant_id = ANY($2) \
           AND is_bucketed_aggregation = true \
           AND time_interval IS NOT NULL AND time_interval > $3 AND time_interval < $4 \
           AND ($5::bigint IS NULL OR id > $5) \
           AND ($6::timestamptz IS NULL OR created_at > $6) \
         ORDER BY created_at ASC, id ASC \
         LIMIT $7",
    )
    .bind(race_id)
    .bind(entrant_ids)
    .bind(INTERVAL_LOWER_BOUND)
    .bind(INTERVAL_UPPER_BOUND)
    .bind(cursor_after)
    .bind(created_after)
    .bind(limit)
    .fetch_all(&state.db)
    .await
}

async fn query_legacy(
    state: &AppState,
    race_id: &str,
    entrant_ids: &[String],
    cursor_after: Option<i64>,
    created_after: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<MoneyFlowDocumentRow>, sqlx::Error> {
    sqlx::query_as::<_, MoneyFlowDocumentRow>(
        "SELECT id, entrant_id, race_id, polling_timestamp, time_to_start, time_interval, interval_type, \
                hold_percentage, bet_percentage, win_percentage, place_percentage, \
                win_pool_amount, place_pool_amount, total_pool_amount, \
                incremental_win_amount, incremental_place_amount, \
                fixed_win_odds, fixed_place_odds, pool_win_odds, pool_place_odds, \
                is_bucketed_aggregation, created_at \
         FROM money_flow_history \
         WHERE race_id = $1 AND entrant_id = ANY($2) \
           AND time_to_start IS NOT NULL AND time_to_start > $3 AND time_to_start < $4 \
           AND ($5::bigint IS NULL OR id > $5) \
           AND ($6::timestamptz IS NULL OR created_at > $6) \
         ORDER BY created_at ASC, id ASC \
         LIMIT $7",
    )
    .bind(race_id)
    .bind(entrant_ids)
    .bind(INTERVAL_LOWER_BOUND)
    .bind(INTERVAL_UPPER_BOUND)
    .bind(cursor_after)
    .bind(created_after)
    .bind(limit)
    .fetch_all(&state.db)
    .await
}

/// Sort contract (spec.md §8): by interval ascending (falling back to
/// `time_to_start` when `time_interval` is absent), ties by creation time.
fn sort_documents(documents: &mut [MoneyFlowDocument]) {
    documents.sort_by(|a, b| {
        let key_a = a.time_interval.or(a.time_to_start).unwrap_or(f64::MAX);
        let key_b = b.time_interval.or(b.time_to_start).unwrap_or(f64::MAX);
        key_a
            .partial_cmp(&key_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.created_at.cmp(&b.created_at))
    });
}

fn compute_interval_coverage(entrant_ids: &[String], rows: &[MoneyFlowDocumentRow]) -> Vec<EntrantIntervalCoverage> {
    entrant_ids
        .iter()
        .map(|entrant_id| {
            let present: BTreeSet<i64> = rows
                .iter()
                .filter(|r| &r.entrant_id == entrant_id)
                .filter_map(|r| r.time_interval.or(r.time_to_start))
                .map(|v| v.round() as i64)
                .filter(|v| CRITICAL_INTERVALS.contains(v))
                .collect();

            let missing_intervals = COVERAGE_SUB_WINDOW
                .into_iter()
                .filter(|interval| !present.contains(interval))
                .collect();

            EntrantIntervalCoverage { entrant_id: entrant_id.clone(), missing_intervals }
        })
        .collect()
}

fn error_response(status: StatusCode, error: ReadSurfaceError, race_id: &str) -> (StatusCode, Json<ErrorBody>) {
    let body = ErrorBody {
        error: error.to_string(),
        details: error.to_string(),
        context: json!({ "raceId": race_id }),
    };
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_surface::models::MoneyFlowDocument;

    fn doc(interval: Option<f64>, created_at: &str) -> MoneyFlowDocument {
        MoneyFlowDocument {
            id: 0,
            entrant_id: "e1".into(),
            race_id: "r1".into(),
            polling_timestamp: created_at.parse().unwrap(),
            time_to_start: None,
            time_interval: interval,
            interval_type: None,
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
            created_at: created_at.parse().unwrap(),
        }
    }

    #[test]
    fn sort_documents_orders_by_interval_then_created_at() {
        let mut docs = vec![
            doc(Some(10.0), "2025-10-13T10:00:02Z"),
            doc(Some(5.0), "2025-10-13T10:00:01Z"),
            doc(Some(5.0), "2025-10-13T10:00:00Z"),
        ];
        sort_documents(&mut docs);
        assert_eq!(docs[0].time_interval, Some(5.0));
        assert!(docs[0].created_at < docs[1].created_at);
        assert_eq!(docs[2].time_interval, Some(10.0));
    }

    #[test]
    fn interval_coverage_reports_missing_subwindow_values() {
        let rows = vec![];
        let coverage = compute_interval_coverage(&["e1".to_string()], &rows);
        assert_eq!(coverage.len(), 1);
        assert_eq!(coverage[0].missing_intervals, vec![5, 4, 3, 2, 1, 0]);
    }
}
