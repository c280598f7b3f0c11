use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::AppState;
use crate::api::models::{IngestResponse, Reading, ReadingListResponse};
use crate::error::{AppError, Result};
use crate::services::HistoryParams;

/// POST /api/data
/// Ingest one reading from the sensor device
pub async fn ingest(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let (temperature, timestamp) = parse_ingest_body(&body)?;

    let outcome = state.readings.ingest(temperature, timestamp).await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /api/data/latest
pub async fn get_latest(State(state): State<AppState>) -> Result<Json<Reading>> {
    let reading = state.readings.latest().await?;
    Ok(Json(reading))
}

/// GET /api/data?page=&limit=
/// Reverse-chronological reading history
pub async fn list(
    State(state): State<AppState>,
    params: std::result::Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<ReadingListResponse>> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    let data = state.readings.history(params).await?;
    Ok(Json(ReadingListResponse { data }))
}

/// Pull the temperature (and optional timestamp) out of an ingestion body.
/// Only a finite JSON number is accepted as a temperature.
fn parse_ingest_body(body: &Value) -> Result<(f64, Option<DateTime<Utc>>)> {
    let temperature = match body.get("temperature") {
        None | Some(Value::Null) => {
            return Err(AppError::Validation("temperature is required".to_string()))
        }
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|t| t.is_finite())
            .ok_or_else(|| AppError::Validation("temperature must be a valid number".to_string()))?,
        Some(_) => {
            return Err(AppError::Validation(
                "temperature must be a valid number".to_string(),
            ))
        }
    };

    let timestamp = match body.get("timestamp") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| AppError::Validation(format!("Invalid timestamp format: {}", raw)))?
                .with_timezone(&Utc),
        ),
        Some(_) => {
            return Err(AppError::Validation(
                "timestamp must be an RFC 3339 string".to_string(),
            ))
        }
    };

    Ok((temperature, timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_plain_temperature() {
        let (t, ts) = parse_ingest_body(&json!({ "temperature": 21.5 })).unwrap();
        assert_eq!(t, 21.5);
        assert_eq!(ts, None);
    }

    #[test]
    fn test_parse_integer_temperature() {
        let (t, _) = parse_ingest_body(&json!({ "temperature": 31 })).unwrap();
        assert_eq!(t, 31.0);
    }

    #[test]
    fn test_parse_with_timestamp() {
        let (_, ts) = parse_ingest_body(&json!({
            "temperature": 20,
            "timestamp": "2024-03-01T10:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(ts, Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_rejects_missing_and_non_numeric() {
        for body in [
            json!({}),
            json!({ "temperature": null }),
            json!({ "temperature": "25.0" }),
            json!({ "temperature": true }),
            json!({ "temperature": [25.0] }),
            json!([25.0]),
            json!({ "temp": 25.0 }),
        ] {
            assert!(
                matches!(parse_ingest_body(&body), Err(AppError::Validation(_))),
                "accepted {body}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let result = parse_ingest_body(&json!({ "temperature": 20, "timestamp": "yesterday" }));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
