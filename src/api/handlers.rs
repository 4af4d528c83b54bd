//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{ErrorResponse, MeterSummaryRecord, ReadingRecord, ReadingsQuery};

/// Returns billed readings, optionally filtered by meter identity.
///
/// `GET /readings` → 200 + `Vec<ReadingRecord>` JSON
/// `GET /readings?account=A` → readings of every meter on account `A`
/// `GET /readings?account=A&meter=M` → readings of one meter
/// `GET /readings?meter=M` → 400 + `ErrorResponse`
pub async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReadingsQuery>,
) -> impl IntoResponse {
    if query.meter.is_some() && query.account.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "`meter` requires `account`; meter numbers are only unique per account"
                    .to_string(),
            }),
        ));
    }

    let records: Vec<ReadingRecord> = state
        .readings
        .iter()
        .filter(|r| query.account.as_deref().is_none_or(|a| r.account == a))
        .filter(|r| query.meter.as_deref().is_none_or(|m| r.meter == m))
        .map(ReadingRecord::from)
        .collect();

    Ok(Json(records))
}

/// Returns the plan comparison for every meter.
///
/// `GET /summary` → 200 + `Vec<MeterSummaryRecord>` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<Vec<MeterSummaryRecord>> {
    Json(
        state
            .summary
            .meters
            .iter()
            .map(MeterSummaryRecord::from)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use chrono_tz::America::Detroit;
    use rust_decimal_macros::dec;
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::billing::{BillSummary, BillingEngine};
    use crate::reading::Reading;
    use crate::tariff::{RateTier, Tariff};

    fn make_test_state() -> Arc<AppState> {
        let tariffs = vec![
            Tariff::new(
                "Flat",
                dec!(5),
                vec![RateTier::new("All hours", dec!(10), dec!(0), dec!(0))],
            )
            .unwrap(),
        ];
        let readings: Vec<Reading> = [("1", "a"), ("1", "b"), ("2", "a")]
            .into_iter()
            .flat_map(|(account, meter)| {
                (0..24).map(move |h| {
                    let ts = Detroit.with_ymd_and_hms(2024, 7, 1, h, 0, 0).unwrap();
                    Reading::new(account, meter, ts, dec!(1), "kWh")
                })
            })
            .collect();
        let engine = BillingEngine::new(tariffs.clone()).unwrap();
        let readings = engine.run(readings).unwrap();
        let summary = BillSummary::from_readings(&readings, &tariffs).unwrap();
        Arc::new(AppState { readings, summary })
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = router(make_test_state());
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn readings_returns_all() {
        let (status, json) = get_json("/readings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(72));
        assert_eq!(json[0]["charges"][0]["tier"], "All hours");
        assert_eq!(json[0]["charges"][0]["cost"], "0.1");
        assert_eq!(json[23]["daily_cumulative"], "24");
    }

    #[tokio::test]
    async fn readings_filter_by_account_and_meter() {
        let (status, json) = get_json("/readings?account=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(48));

        let (status, json) = get_json("/readings?account=1&meter=b").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(24));
        assert_eq!(json[0]["meter"], "b");
    }

    #[tokio::test]
    async fn meter_without_account_returns_400() {
        let (status, json) = get_json("/readings?meter=a").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn summary_lists_meters() {
        let (status, json) = get_json("/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().map(Vec::len), Some(3));
        let plan = &json[0]["plans"][0];
        assert_eq!(plan["tariff"], "Flat");
        assert_eq!(plan["energy_cost"], "2.4");
        assert_eq!(plan["total_cost"], "7.4");
        assert_eq!(plan["cheapest"], true);
    }
}
